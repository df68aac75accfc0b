//! Incoming response description

use url::Url;

use crate::parameter::Parameter;

/// A received response, or the failure to receive one
#[derive(Debug, Clone)]
pub struct RestResponse {
    /// Final URI after redirects
    pub response_uri: Url,
    /// HTTP status, `0` when no response arrived
    pub status_code: u16,
    pub error_message: Option<String>,
    pub content: String,
    /// Response headers in the order they were received
    pub headers: Vec<Parameter>,
}

impl RestResponse {
    pub fn new(response_uri: Url, status_code: u16) -> Self {
        Self {
            response_uri,
            status_code,
            error_message: None,
            content: String::new(),
            headers: Vec::new(),
        }
    }

    /// A response standing in for a transport failure
    pub fn transport_error(response_uri: Url, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(response_uri, 0)
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Parameter::header(name, value.into()));
        self
    }

    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// First header with the given name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&Parameter> {
        self.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name))
    }
}
