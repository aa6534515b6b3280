use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, Response, StatusCode};
use http_body_util::Full;

const ALLOWED_METHODS: &str = "GET,POST,OPTIONS";

#[derive(Debug, Clone, PartialEq)]
pub enum CorsDecision {
    /// No `Origin` header: same-origin or non-browser caller.
    NoOrigin,
    Allowed(HeaderValue),
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    /// `allowed_origins` must already be in `scheme://host[:port]` form.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        CorsPolicy { allowed_origins }
    }

    pub fn evaluate(&self, headers: &HeaderMap) -> CorsDecision {
        let Some(origin) = headers.get(header::ORIGIN) else {
            return CorsDecision::NoOrigin;
        };
        match origin.to_str() {
            Ok(value) if self.allowed_origins.iter().any(|o| o == value) => {
                CorsDecision::Allowed(origin.clone())
            }
            Ok(value) => CorsDecision::Rejected(value.to_string()),
            Err(_) => CorsDecision::Rejected(String::from_utf8_lossy(origin.as_bytes()).into_owned()),
        }
    }
}

pub fn is_preflight(method: &Method) -> bool {
    *method == Method::OPTIONS
}

impl CorsDecision {
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        if let CorsDecision::Allowed(origin) = self {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }

    /// 204 answer to an `OPTIONS` request from an admitted origin.
    pub fn preflight_response(&self, request_headers: &HeaderMap) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;
        let headers = response.headers_mut();
        self.apply_headers(headers);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) = request_headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            headers.append(
                header::VARY,
                HeaderValue::from_static("Access-Control-Request-Headers"),
            );
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    }
}
