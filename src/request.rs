//! The slice of an inbound request that nonces care about.
//!
//! A `Request` carries the visitor identity (user id and session token), the request
//! uri, the `Referer` header and the merged query/form parameters. Web layers build
//! one per request and hand it to a [`RequestHost`](crate::host::RequestHost).
use std::collections::HashMap;

use tracing::error;

use crate::{error::Error, session_token::SessionToken};

/// Parameter a rendered form uses to carry the page it was submitted from.
pub const REFERER_PARAM: &str = "_wp_http_referer";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    user_id: u64,
    session_token: SessionToken,
    request_uri: String,
    referer: Option<String>,
    params: HashMap<String, String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a request from an absolute url, reading its query parameters.
    pub fn from_url(request_url: &str) -> Result<Self, Error> {
        let url = url::Url::parse(request_url).map_err(|e| {
            error!("Failed to parse request url: {}", e);
            Error::URL
        })?;
        let request_uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        Ok(Self {
            request_uri,
            params: url.query_pairs().into_owned().collect(),
            ..Self::default()
        })
    }

    /// Sets the logged-in user. `0` means logged out.
    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_session_token(mut self, session_token: SessionToken) -> Self {
        self.session_token = session_token;
        self
    }

    /// Sets the path and query of the current request.
    pub fn with_request_uri(mut self, request_uri: &str) -> Self {
        self.request_uri = request_uri.to_string();
        self
    }

    /// Sets the `Referer` header.
    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    /// Merges an `application/x-www-form-urlencoded` body. Body values win over query values.
    pub fn with_form_body(mut self, body: &str) -> Self {
        self.params
            .extend(url::form_urlencoded::parse(body.as_bytes()).into_owned());
        self
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn session_token(&self) -> &SessionToken {
        &self.session_token
    }

    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Page the visitor came from.
    ///
    /// Prefers the referer carried by a rendered form over the header, and ignores a
    /// referer that points back at the current request.
    pub fn referer(&self) -> Option<&str> {
        let referer = self.param(REFERER_PARAM).or(self.referer.as_deref())?;
        (referer != self.request_uri).then_some(referer)
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use crate::{error::Error, session_token::SessionToken};

    use super::Request;

    #[test]
    fn test_request_from_url() {
        let request =
            Request::from_url("https://example.com/posts/edit?post=5&_wpnonce=abc").unwrap();

        assert_eq!(request.request_uri(), "/posts/edit?post=5&_wpnonce=abc");
        assert_eq!(request.param("post"), Some("5"));
        assert_eq!(request.param("_wpnonce"), Some("abc"));
        assert_eq!(request.param("missing"), None);
        assert_eq!(request.user_id(), 0);
    }

    #[test]
    fn test_request_from_invalid_url() {
        assert!(matches!(Request::from_url("/relative"), Err(Error::URL)));
    }

    #[test]
    fn test_request_form_body_overrides_query() {
        let request = Request::from_url("https://example.com/save?post=5")
            .unwrap()
            .with_form_body("post=6&title=hello+world");

        assert_eq!(request.param("post"), Some("6"));
        assert_eq!(request.param("title"), Some("hello world"));
    }

    #[test]
    fn test_request_identity() {
        let request = Request::new()
            .with_user_id(3)
            .with_session_token(SessionToken::from("session"));

        assert_eq!(request.user_id(), 3);
        assert_eq!(request.session_token().value(), "session");
    }

    #[test]
    fn test_request_referer() {
        let request = Request::new()
            .with_request_uri("/save")
            .with_referer("https://example.com/form");
        assert_eq!(request.referer(), Some("https://example.com/form"));

        let request = request.with_param("_wp_http_referer", "/admin/form");
        assert_eq!(request.referer(), Some("/admin/form"));

        let request = Request::new()
            .with_request_uri("/save")
            .with_referer("/save");
        assert_eq!(request.referer(), None);
    }
}
