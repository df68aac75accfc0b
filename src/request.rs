//! Outgoing request description

use http::Method;
use serde::Serialize;

use crate::parameter::{Parameter, ParameterKind, ParameterValue};

/// A request to be resolved against a client's base URL
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    /// Resource path relative to the base URL, may contain `{segment}` placeholders
    pub resource: String,
    /// Parameters in insertion order
    pub parameters: Vec<Parameter>,
}

impl RestRequest {
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
            parameters: Vec::new(),
        }
    }

    pub fn get(resource: impl Into<String>) -> Self {
        Self::new(Method::GET, resource)
    }

    pub fn post(resource: impl Into<String>) -> Self {
        Self::new(Method::POST, resource)
    }

    pub fn add_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn add_header(self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.add_parameter(Parameter::new(name, value, ParameterKind::HttpHeader))
    }

    pub fn add_query_parameter(
        self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Self {
        self.add_parameter(Parameter::new(name, value, ParameterKind::QueryString))
    }

    pub fn add_url_segment(
        self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Self {
        self.add_parameter(Parameter::new(name, value, ParameterKind::UrlSegment))
    }

    pub fn add_cookie(self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.add_parameter(Parameter::new(name, value, ParameterKind::Cookie))
    }

    /// Form field when `sends_form_body`, query parameter otherwise
    pub fn add_form_parameter(
        self,
        name: impl Into<String>,
        value: impl Into<ParameterValue>,
    ) -> Self {
        self.add_parameter(Parameter::new(name, value, ParameterKind::GetOrPost))
    }

    /// Serialize `body` as the JSON request body
    pub fn add_json_body<T: Serialize>(self, body: &T) -> crate::Result<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.add_parameter(Parameter::new(
            "application/json",
            ParameterValue::Structured(value),
            ParameterKind::RequestBody,
        )))
    }

    /// Parameters of one kind, in insertion order
    pub fn parameters_of(&self, kind: ParameterKind) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.kind == kind)
    }

    /// The explicit request body, if one was added
    pub fn body(&self) -> Option<&Parameter> {
        self.parameters_of(ParameterKind::RequestBody).next()
    }

    /// Whether `GetOrPost` parameters travel in the body rather than the query
    ///
    /// Only for methods that carry a body, and only when no explicit body was
    /// added. Otherwise they go in the query so they are still sent.
    pub fn sends_form_body(&self) -> bool {
        self.body().is_none()
            && !matches!(
                self.method,
                Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS | Method::TRACE
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_order() {
        let request = RestRequest::get("/users/{id}")
            .add_url_segment("id", 7i64)
            .add_header("Accept", "application/json")
            .add_query_parameter("expand", "roles");

        let names: Vec<_> = request.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "Accept", "expand"]);
        assert_eq!(request.parameters_of(ParameterKind::HttpHeader).count(), 1);
    }

    #[test]
    fn test_json_body_parameter() {
        let request = RestRequest::post("/users")
            .add_json_body(&serde_json::json!({"name": "ada"}))
            .unwrap();
        let body = &request.parameters[0];
        assert_eq!(body.kind, ParameterKind::RequestBody);
        assert_eq!(body.name, "application/json");
    }

    #[test]
    fn test_form_body_depends_on_method() {
        assert!(!RestRequest::get("/").sends_form_body());
        assert!(!RestRequest::new(Method::DELETE, "/").sends_form_body());
        assert!(RestRequest::post("/").sends_form_body());
        assert!(RestRequest::new(Method::PATCH, "/").sends_form_body());
    }

    #[test]
    fn test_explicit_body_disables_form_body() {
        let request = RestRequest::post("/orders")
            .add_form_parameter("qty", 3i64)
            .add_json_body(&serde_json::json!({"sku": "X1"}))
            .unwrap();
        assert!(request.body().is_some());
        assert!(!request.sends_form_body());
    }
}
