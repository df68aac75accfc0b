//! HTTP client abstraction
//!
//! [`HttpClient`] is the capability the logger needs: a base URL, URI
//! resolution, and a cookie store scoped by URL. [`RestClient`] implements it
//! on top of reqwest and can also execute requests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use tracing::{debug, warn};
use url::Url;

use crate::cookie::{Cookie, CookieJar};
use crate::error::{Error, Result};
use crate::logger::ExchangeLogger;
use crate::parameter::{Parameter, ParameterKind};
use crate::request::RestRequest;
use crate::response::RestResponse;

/// What the exchange logger needs from an HTTP client
pub trait HttpClient {
    /// The URL requests are resolved against, if one is configured
    fn base_url(&self) -> Option<&Url>;

    /// Resolve the absolute URI `request` would be sent to
    fn build_uri(&self, request: &RestRequest) -> Result<Url> {
        build_uri(self.base_url(), request)
    }

    /// Cookies the client would send to `url`, in store order
    fn cookies_for(&self, url: &Url) -> Result<Vec<Cookie>>;
}

/// Resolve a request against a base URL
///
/// `{name}` placeholders in the resource are replaced by `UrlSegment`
/// parameters, the resource is joined to the base with a single `/`, and
/// query parameters are appended in order. `GetOrPost` parameters join the
/// query unless they are sent as a form body.
pub fn build_uri(base_url: Option<&Url>, request: &RestRequest) -> Result<Url> {
    let mut resource = request.resource.clone();
    for segment in request.parameters_of(ParameterKind::UrlSegment) {
        let placeholder = format!("{{{}}}", segment.name);
        let value = encode_segment(&segment.value.to_wire_string());
        resource = resource.replace(&placeholder, &value);
    }

    let mut url = match Url::parse(&resource) {
        Ok(absolute) if absolute.has_host() => absolute,
        _ => {
            let base = base_url.ok_or(Error::MissingBaseUrl)?;
            if resource.is_empty() {
                base.clone()
            } else {
                let joined = format!(
                    "{}/{}",
                    base.as_str().trim_end_matches('/'),
                    resource.trim_start_matches('/')
                );
                Url::parse(&joined)?
            }
        }
    };

    let encoded: Vec<&Parameter> = request
        .parameters
        .iter()
        .filter(|p| match p.kind {
            ParameterKind::QueryString => true,
            ParameterKind::GetOrPost => !request.sends_form_body(),
            _ => false,
        })
        .collect();
    if !encoded.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for param in encoded {
            pairs.append_pair(&param.name, &param.value.to_wire_string());
        }
    }

    let raw: Vec<String> = request
        .parameters_of(ParameterKind::QueryStringWithoutEncode)
        .map(|p| format!("{}={}", p.name, p.value.to_wire_string()))
        .collect();
    if !raw.is_empty() {
        let query = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, raw.join("&")),
            _ => raw.join("&"),
        };
        url.set_query(Some(&query));
    }

    Ok(url)
}

fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Configuration for [`RestClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("kiroku/", env!("CARGO_PKG_VERSION")).to_string(),
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// A reqwest client bound to a base URL and a shared cookie jar
#[derive(Debug, Clone)]
pub struct RestClient {
    base_url: Option<Url>,
    config: ClientConfig,
    cookie_jar: Arc<CookieJar>,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, ClientConfig::default())
    }

    pub fn with_config(base_url: &str, config: ClientConfig) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        Self::build(Some(base_url), config)
    }

    /// A client that only accepts absolute request resources
    pub fn without_base_url(config: ClientConfig) -> Result<Self> {
        Self::build(None, config)
    }

    fn build(base_url: Option<Url>, config: ClientConfig) -> Result<Self> {
        let cookie_jar = Arc::new(CookieJar::new());

        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(redirect)
            .cookie_provider(Arc::clone(&cookie_jar))
            .build()?;

        Ok(Self {
            base_url,
            config,
            cookie_jar,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The store that receives `Set-Cookie` headers from executed requests
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.cookie_jar
    }

    /// Send a request and capture the response
    ///
    /// Transport failures come back as a response with status `0` and an
    /// error message. Only a request that cannot be built returns `Err`.
    pub async fn execute(&self, request: &RestRequest) -> Result<RestResponse> {
        let url = self.build_uri(request)?;
        let headers = build_header_map(request)?;

        let mut req = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers);

        if let Some(body) = request.body() {
            let content_type =
                HeaderValue::from_str(&body.name).map_err(|_| Error::InvalidHeader {
                    name: CONTENT_TYPE.to_string(),
                })?;
            req = req
                .header(CONTENT_TYPE, content_type)
                .body(body.value.to_wire_string());
        } else if request.sends_form_body() {
            let form: Vec<(String, String)> = request
                .parameters_of(ParameterKind::GetOrPost)
                .map(|p| (p.name.clone(), p.value.to_wire_string()))
                .collect();
            if !form.is_empty() {
                req = req.form(&form);
            }
        }

        debug!(method = %request.method, %url, "Executing request");
        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %request.method, %url, error = %e, "Request failed");
                return Ok(RestResponse::transport_error(url, e.to_string()));
            }
        };

        let response_uri = response.url().clone();
        let status_code = response.status().as_u16();
        let headers: Vec<Parameter> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                Parameter::header(k.as_str(), String::from_utf8_lossy(v.as_bytes()).into_owned())
            })
            .collect();

        let mut captured = RestResponse {
            response_uri,
            status_code,
            error_message: None,
            content: String::new(),
            headers,
        };
        match response.text().await {
            Ok(content) => captured.content = content,
            Err(e) => {
                warn!(%url, error = %e, "Failed to read response body");
                captured.error_message = Some(e.to_string());
            }
        }

        debug!(%url, status = status_code, bytes = captured.content.len(), "Received response");
        Ok(captured)
    }

    /// Execute a request and write the exchange to `path`
    pub async fn execute_logged(
        &self,
        request: &RestRequest,
        path: impl AsRef<Path>,
    ) -> Result<RestResponse> {
        let start = Utc::now();
        let response = self.execute(request).await?;
        let end = Utc::now();

        ExchangeLogger::new(path.as_ref(), self)
            .with_request(request)
            .with_response(&response)
            .with_timing(start, end)
            .log()?;

        Ok(response)
    }
}

impl HttpClient for RestClient {
    fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn cookies_for(&self, url: &Url) -> Result<Vec<Cookie>> {
        Ok(self.cookie_jar.cookies_for(url))
    }
}

/// Build the header map for a request's `HttpHeader` and `Cookie` parameters
fn build_header_map(request: &RestRequest) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();

    for param in request.parameters_of(ParameterKind::HttpHeader) {
        let invalid = || Error::InvalidHeader {
            name: param.name.clone(),
        };
        let name = HeaderName::from_bytes(param.name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(&param.value.to_wire_string()).map_err(|_| invalid())?;
        map.append(name, value);
    }

    let cookies: Vec<String> = request
        .parameters_of(ParameterKind::Cookie)
        .map(|p| format!("{}={}", p.name, p.value.to_wire_string()))
        .collect();
    if !cookies.is_empty() {
        let value = HeaderValue::from_str(&cookies.join("; ")).map_err(|_| Error::InvalidHeader {
            name: COOKIE.to_string(),
        })?;
        map.insert(COOKIE, value);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn base() -> Url {
        Url::parse("https://api.example.com/v1/").unwrap()
    }

    #[test]
    fn test_build_uri_joins_with_single_slash() {
        let uri = build_uri(Some(&base()), &RestRequest::get("/users/1")).unwrap();
        assert_eq!(uri.as_str(), "https://api.example.com/v1/users/1");

        let uri = build_uri(Some(&base()), &RestRequest::get("users")).unwrap();
        assert_eq!(uri.as_str(), "https://api.example.com/v1/users");
    }

    #[test]
    fn test_build_uri_empty_resource_is_base() {
        let uri = build_uri(Some(&base()), &RestRequest::get("")).unwrap();
        assert_eq!(uri, base());
    }

    #[test]
    fn test_build_uri_segments_and_query() {
        let request = RestRequest::get("/users/{id}/posts")
            .add_url_segment("id", "a b")
            .add_query_parameter("q", "x&y")
            .add_query_parameter("page", 2i64)
            .add_parameter(Parameter::new(
                "raw",
                "1,2",
                ParameterKind::QueryStringWithoutEncode,
            ));

        let uri = build_uri(Some(&base()), &request).unwrap();
        assert_eq!(
            uri.as_str(),
            "https://api.example.com/v1/users/a%20b/posts?q=x%26y&page=2&raw=1,2"
        );
    }

    #[test]
    fn test_build_uri_get_or_post_depends_on_method() {
        let get = RestRequest::get("/search").add_form_parameter("term", "rust");
        assert_eq!(
            build_uri(Some(&base()), &get).unwrap().query(),
            Some("term=rust")
        );

        let post = RestRequest::post("/search").add_form_parameter("term", "rust");
        assert_eq!(build_uri(Some(&base()), &post).unwrap().query(), None);
    }

    #[test]
    fn test_build_uri_form_parameters_move_to_query_with_body() {
        let request = RestRequest::post("/orders")
            .add_form_parameter("qty", 3i64)
            .add_json_body(&serde_json::json!({"sku": "X1"}))
            .unwrap();
        let uri = build_uri(Some(&base()), &request).unwrap();
        assert_eq!(uri.query(), Some("qty=3"));
    }

    #[test]
    fn test_build_uri_absolute_resource_ignores_base() {
        let request = RestRequest::get("https://other.example.org/health");
        let uri = build_uri(None, &request).unwrap();
        assert_eq!(uri.as_str(), "https://other.example.org/health");
    }

    #[test]
    fn test_build_uri_missing_base_url() {
        let result = build_uri(None, &RestRequest::get("/users"));
        assert!(matches!(result, Err(Error::MissingBaseUrl)));
    }

    #[test]
    fn test_header_map_from_parameters() {
        let request = RestRequest::new(Method::PUT, "/")
            .add_header("X-Trace", "abc")
            .add_header("X-Trace", "def")
            .add_cookie("session", "s1")
            .add_cookie("theme", "dark");

        let map = build_header_map(&request).unwrap();
        let traces: Vec<_> = map.get_all("x-trace").iter().collect();
        assert_eq!(traces, vec!["abc", "def"]);
        assert_eq!(map.get(COOKIE).unwrap(), "session=s1; theme=dark");
    }

    #[test]
    fn test_header_map_rejects_invalid_name() {
        let request = RestRequest::get("/").add_header("bad header", "x");
        let result = build_header_map(&request);
        assert!(matches!(result, Err(Error::InvalidHeader { name }) if name == "bad header"));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.follow_redirects);
        assert!(config.user_agent.starts_with("kiroku/"));

        let config = config.without_redirects().with_timeout(Duration::from_secs(5));
        assert!(!config.follow_redirects);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_client_without_base_url() {
        let config = ClientConfig::default().with_user_agent("kiroku-test/1");
        let client = RestClient::without_base_url(config).unwrap();
        assert!(client.base_url().is_none());
        assert_eq!(client.config().user_agent, "kiroku-test/1");

        let absolute = RestRequest::get("https://status.example.com/health");
        assert!(client.build_uri(&absolute).is_ok());
        assert!(matches!(
            client.build_uri(&RestRequest::get("/health")),
            Err(Error::MissingBaseUrl)
        ));
    }

    #[test]
    fn test_client_reports_jar_cookies() {
        let client = RestClient::new("https://api.example.com").unwrap();
        client
            .cookie_jar()
            .add(Cookie::new("session", "abc", "api.example.com", "/"));

        let base = client.base_url().unwrap().clone();
        let cookies = client.cookies_for(&base).unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "session");
    }
}
