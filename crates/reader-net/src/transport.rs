use crate::error::{ApiError, ApiResult, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_form<K, V>(url: Url, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            body: Some(RequestBody::Form(fields)),
            ..Self::new(Method::POST, url)
        }
    }

    pub fn post_json(url: Url, value: serde_json::Value) -> Self {
        Self {
            body: Some(RequestBody::Json(value)),
            ..Self::new(Method::POST, url)
        }
    }

    /// Sets `name`, replacing any earlier value. Invalid names or values are
    /// ignored.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(ToString::to_string)
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body).map_err(|err| ApiError::decode(err.to_string()))
    }
}

pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + Send + 'a>>;

/// Executes one HTTP exchange. Implementations never interpret the status.
pub trait Transport: Send + Sync {
    fn execute<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub allow_insecure_tls: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            allow_insecure_tls: false,
        }
    }
}

/// `reqwest`-backed transport; one client, one connection pool, shared by
/// every call.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> anyhow::Result<Self> {
        // reqwest has no per-write timeout; the write budget extends the
        // whole-request deadline instead.
        let total = settings.connect_timeout + settings.read_timeout + settings.write_timeout;
        let mut builder = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .timeout(total);
        if settings.allow_insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        builder = match &request.body {
            Some(RequestBody::Form(fields)) => builder.form(fields),
            Some(RequestBody::Json(value)) => builder.json(value),
            None => builder,
        };
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
        Box::pin(self.send(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn reqwest_transport_returns_status_headers_and_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/user/login")
                .header("x-client", "reader")
                .body_includes("username=alice");
            then.status(200)
                .header("content-type", "application/json")
                .header("set-cookie", "loginUserName=alice; Path=/")
                .json_body(json!({"errorCode": 0, "errorMsg": "", "data": null}));
        });

        let transport = ReqwestTransport::new(&TransportSettings::default()).unwrap();
        let url = Url::parse(&server.url("/user/login")).unwrap();
        let mut request = ApiRequest::post_form(url, [("username", "alice"), ("password", "pw")]);
        request.set_header("x-client", "reader");

        let response = transport.execute(&request).await.unwrap();
        mock.assert();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.set_cookies(), vec!["loginUserName=alice; Path=/".to_string()]);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["errorCode"], 0);
    }

    #[tokio::test]
    async fn non_success_status_is_not_an_error_at_transport_level() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/banner/json");
            then.status(503).body("maintenance");
        });
        let transport = ReqwestTransport::new(&TransportSettings::default()).unwrap();
        let request = ApiRequest::get(Url::parse(&server.url("/banner/json")).unwrap());
        let response = transport.execute(&request).await.unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.text(), "maintenance");
    }

    #[tokio::test]
    async fn slow_server_surfaces_timeout() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });
        let transport = ReqwestTransport::new(&TransportSettings {
            connect_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_millis(100),
            allow_insecure_tls: false,
        })
        .unwrap();
        let request = ApiRequest::get(Url::parse(&server.url("/slow")).unwrap());
        let err = transport.execute(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "{err:?}");
    }

    #[test]
    fn invalid_header_values_are_ignored() {
        let mut request = ApiRequest::get(Url::parse("https://example.com/").unwrap());
        request.set_header("x-ok", "1");
        request.set_header("x-bad", "line\nbreak");
        assert_eq!(request.header("x-ok"), Some("1"));
        assert_eq!(request.header("x-bad"), None);
    }
}
