//! kiroku - HTTP exchange snapshots for test debugging
//!
//! Captures one request/response exchange (method, URI, parameters, headers,
//! status, content, cookies, timing) and writes it to an indented JSON file.
//!
//! ```no_run
//! use kiroku::{RestClient, RestRequest};
//!
//! # async fn run() -> kiroku::Result<()> {
//! let client = RestClient::new("https://api.example.com")?;
//! let request = RestRequest::get("/users/{id}").add_url_segment("id", 1i64);
//! let response = client.execute_logged(&request, "users-1.json").await?;
//! assert!(response.is_successful());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod cookie;
pub mod error;
pub mod logger;
pub mod parameter;
pub mod request;
pub mod response;
pub mod snapshot;

pub use client::{ClientConfig, HttpClient, RestClient};
pub use cookie::{Cookie, CookieJar};
pub use error::{Error, Result};
pub use logger::ExchangeLogger;
pub use parameter::{Parameter, ParameterKind, ParameterValue};
pub use request::RestRequest;
pub use response::RestResponse;
pub use snapshot::{
    load_snapshot, save_snapshot, DurationData, ExchangeSnapshot, RequestData, ResponseData,
};
