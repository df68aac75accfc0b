//! Exchange logger
//!
//! Builds a fresh [`ExchangeSnapshot`] from whatever request, response and
//! timing are currently set, then writes it as indented JSON.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::client::HttpClient;
use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::request::RestRequest;
use crate::response::RestResponse;
use crate::snapshot::{save_snapshot, DurationData, ExchangeSnapshot, RequestData, ResponseData};

/// Logs one request/response exchange to a JSON file
///
/// Every field is public so the exchange can be filled in after
/// construction, for example once the response has arrived.
///
/// ```no_run
/// use kiroku::{ExchangeLogger, RestClient, RestRequest};
///
/// # fn main() -> kiroku::Result<()> {
/// let client = RestClient::new("https://api.example.com")?;
/// let request = RestRequest::get("/users/1");
///
/// ExchangeLogger::new("exchange.json", &client)
///     .with_request(&request)
///     .log()?;
/// # Ok(())
/// # }
/// ```
pub struct ExchangeLogger<'a, C: HttpClient + ?Sized> {
    /// Output file, created or overwritten by [`log`](Self::log)
    pub path: PathBuf,
    pub client: &'a C,
    pub request: Option<&'a RestRequest>,
    pub response: Option<&'a RestResponse>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl<'a, C: HttpClient + ?Sized> ExchangeLogger<'a, C> {
    pub fn new(path: impl Into<PathBuf>, client: &'a C) -> Self {
        Self {
            path: path.into(),
            client,
            request: None,
            response: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn with_request(mut self, request: &'a RestRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: &'a RestResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn with_end_time(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    pub fn with_timing(self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.with_start_time(start).with_end_time(end)
    }

    /// Build the snapshot without writing it
    ///
    /// Fails with [`Error::MissingBaseUrl`] when the client has no base URL,
    /// since cookies are scoped to it.
    pub fn snapshot(&self) -> Result<ExchangeSnapshot> {
        let snapshot = ExchangeSnapshot {
            duration: DurationData::new(self.start_time, self.end_time),
            request: self.request_data()?,
            response: self.response_data(),
            cookies: self.cookies()?,
        };

        debug!(
            has_request = snapshot.request.is_some(),
            has_response = snapshot.response.is_some(),
            cookies = snapshot.cookies.len(),
            "Built exchange snapshot"
        );
        Ok(snapshot)
    }

    /// Build the snapshot and write it to [`path`](Self::path)
    pub fn log(&self) -> Result<()> {
        let snapshot = self.snapshot()?;
        save_snapshot(&snapshot, &self.path)?;
        info!(path = %self.path.display(), "Wrote exchange log");
        Ok(())
    }

    fn request_data(&self) -> Result<Option<RequestData>> {
        let Some(request) = self.request else {
            return Ok(None);
        };

        Ok(Some(RequestData {
            method: request.method.to_string(),
            uri: self.client.build_uri(request)?,
            resource: request.resource.clone(),
            parameters: request.parameters.clone(),
        }))
    }

    fn response_data(&self) -> Option<ResponseData> {
        self.response.map(|response| ResponseData {
            uri: response.response_uri.clone(),
            status_code: response.status_code,
            error_message: response.error_message.clone(),
            content: response.content.clone(),
            headers: response.headers.clone(),
        })
    }

    fn cookies(&self) -> Result<Vec<Cookie>> {
        let base_url = self.client.base_url().ok_or(Error::MissingBaseUrl)?;
        self.client.cookies_for(base_url)
    }
}
