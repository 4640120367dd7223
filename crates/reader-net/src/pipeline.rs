use crate::config::PipelineConfig;
use crate::envelope::ApiEnvelope;
use crate::error::{ApiError, ApiResult};
use crate::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
use reader_core::cookies::{cookie_header, with_store};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

pub type RefreshFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Renews the session after an unauthorized response.
pub trait RefreshHandler: Send + Sync {
    fn can_refresh(&self) -> RefreshFuture<'_, bool>;
    /// `Ok(true)` when the session was renewed and the request is worth
    /// retrying.
    fn refresh(&self) -> RefreshFuture<'_, anyhow::Result<bool>>;
}

/// Clears the refreshing flag when the refresh attempt ends, however it ends.
struct RefreshFlag<'a>(&'a AtomicBool);

impl Drop for RefreshFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Executes calls through the fixed chain: header injection, transport,
/// cookie capture, unauthorized recovery and error normalization.
///
/// At most one refresh runs at a time. A call that hits an unauthorized
/// response while another call is refreshing does not wait; it reports
/// the failure to the unauthorized listener straight away.
pub struct RequestPipeline {
    config: PipelineConfig,
    transport: Arc<dyn Transport>,
    refreshing: AtomicBool,
    refresh_lock: Mutex<()>,
}

impl RequestPipeline {
    pub fn new(config: PipelineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            refreshing: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_reqwest(config: PipelineConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(&config.transport_settings())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn crash_report_endpoint(&self) -> Option<&Url> {
        self.config.crash_report_endpoint.as_ref()
    }

    /// Resolves `path` against the configured base URL.
    pub fn url(&self, path: &str) -> ApiResult<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|err| ApiError::Request {
                message: format!("{path}: {err}"),
            })
    }

    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let response = self.send(&request).await?;
        let response = if self.is_unauthorized(response.status) {
            self.recover(&request, response).await?
        } else {
            response
        };
        self.normalize(response)
    }

    /// Executes `request` and unwraps the `{errorCode, errorMsg, data}`
    /// envelope, treating a missing `data` as a decode failure.
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        self.call_optional(request)
            .await?
            .ok_or_else(|| ApiError::decode("response carried no data"))
    }

    /// Like [`call`](Self::call) for endpoints whose payload is irrelevant.
    pub async fn call_empty(&self, request: ApiRequest) -> ApiResult<()> {
        self.call_optional::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn call_optional<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<Option<T>> {
        let response = self.execute(request).await?;
        let envelope: ApiEnvelope<T> = response.json()?;
        let result = envelope.into_result(&self.config.business_unauthorized_codes);
        if matches!(result, Err(ApiError::Unauthorized { .. })) {
            self.notify_unauthorized();
        }
        result
    }

    async fn prepare(&self, request: &ApiRequest) -> ApiRequest {
        let mut prepared = request.clone();
        for (name, value) in &self.config.static_headers {
            prepared.set_header(name, value);
        }
        if let Some(provider) = &self.config.header_provider {
            for (name, value) in provider.headers() {
                prepared.set_header(&name, &value);
            }
        }
        if let Some(credentials) = &self.config.credentials {
            match credentials.token().await {
                Ok(Some(token)) if !token.is_empty() => {
                    prepared.set_header("authorization", &format!("Bearer {token}"));
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Failed to read auth token; sending without it"),
            }
        }
        if prepared.header("cookie").is_none()
            && let Some(cookie) = cookie_header(&self.stored_cookies(&prepared.url).await)
        {
            prepared.set_header("cookie", &cookie);
        }
        prepared
    }

    async fn stored_cookies(&self, url: &Url) -> Vec<String> {
        let url = url.clone();
        match with_store(&self.config.cookie_store, move |store| store.load_for_request(&url)).await {
            Ok(cookies) => cookies,
            Err(err) => {
                warn!(error = %err, "Cookie lookup did not complete; sending without cookies");
                Vec::new()
            }
        }
    }

    async fn store_cookies(&self, url: &Url, cookies: Vec<String>) {
        let url = url.clone();
        let saved = with_store(&self.config.cookie_store, move |store| {
            store.save_from_response(&url, &cookies)
        })
        .await;
        if let Err(err) = saved {
            warn!(error = %err, "Cookie capture did not complete");
        }
    }

    async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let prepared = self.prepare(request).await;
        let started = Instant::now();
        let result = self.transport.execute(&prepared).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => {
                if self.config.enable_logging {
                    debug!(
                        method = %prepared.method,
                        url = %prepared.url,
                        status = response.status.as_u16(),
                        elapsed_ms,
                        "HTTP exchange"
                    );
                }
                let cookies = response.set_cookies();
                if !cookies.is_empty() {
                    self.store_cookies(&prepared.url, cookies).await;
                }
            }
            Err(err) => {
                if self.config.enable_logging {
                    debug!(
                        method = %prepared.method,
                        url = %prepared.url,
                        error = %err,
                        elapsed_ms,
                        "HTTP exchange failed"
                    );
                }
            }
        }
        result.map_err(ApiError::from)
    }

    async fn recover(&self, request: &ApiRequest, response: ApiResponse) -> ApiResult<ApiResponse> {
        let Some(handler) = self.config.refresh_handler.as_ref() else {
            self.notify_unauthorized();
            return Ok(response);
        };
        if self.refreshing.load(Ordering::Acquire) {
            debug!(url = %request.url, "Refresh already in flight; not waiting");
            self.notify_unauthorized();
            return Ok(response);
        }

        let retried = {
            let _lock = self.refresh_lock.lock().await;
            if self.refreshing.load(Ordering::Acquire) || !handler.can_refresh().await {
                None
            } else {
                self.refreshing.store(true, Ordering::Release);
                let _flag = RefreshFlag(&self.refreshing);
                match handler.refresh().await {
                    Ok(true) => {
                        debug!(url = %request.url, "Session refreshed; retrying request");
                        match self.send(request).await {
                            Ok(retried) => Some(retried),
                            Err(err) => {
                                warn!(error = %err, "Retry after refresh failed");
                                None
                            }
                        }
                    }
                    Ok(false) => {
                        debug!("Refresh handler reported no new session");
                        None
                    }
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "Session refresh failed");
                        None
                    }
                }
            }
        };

        match retried {
            Some(retried) if !self.is_unauthorized(retried.status) => Ok(retried),
            Some(retried) => {
                self.notify_unauthorized();
                Ok(retried)
            }
            None => {
                self.notify_unauthorized();
                Ok(response)
            }
        }
    }

    fn normalize(&self, response: ApiResponse) -> ApiResult<ApiResponse> {
        let status = response.status;
        if self.is_unauthorized(status) {
            return Err(ApiError::Unauthorized {
                status: Some(status.as_u16()),
                message: status_message(&response),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: status_message(&response),
            });
        }
        Ok(response)
    }

    fn is_unauthorized(&self, status: StatusCode) -> bool {
        self.config
            .unauthorized_statuses
            .contains(&status.as_u16())
    }

    fn notify_unauthorized(&self) {
        warn!("Unauthorized response was not recovered");
        if let Some(listener) = &self.config.unauthorized_listener {
            listener.on_unauthorized();
        }
    }
}

fn status_message(response: &ApiResponse) -> String {
    let body = response.text();
    let body = body.trim();
    if body.is_empty() {
        response
            .status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfigBuilder, UnauthorizedListener};
    use crate::error::TransportError;
    use crate::transport::TransportFuture;
    use reader_core::cookies::{CookieStore, MemoryCookieStore};
    use reader_core::credentials::CredentialStore;
    use reader_core::secrets::MemorySecrets;
    use reqwest::header::{HeaderValue, SET_COOKIE};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, Semaphore};

    #[derive(Default)]
    struct QueuedTransport {
        responses: StdMutex<VecDeque<Result<ApiResponse, TransportError>>>,
        requests: StdMutex<Vec<ApiRequest>>,
    }

    impl QueuedTransport {
        fn with(responses: Vec<Result<ApiResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(responses.into()),
                requests: StdMutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for QueuedTransport {
        fn execute<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status(500, "")));
            Box::pin(async move { next })
        }
    }

    fn status(code: u16, body: &str) -> ApiResponse {
        ApiResponse::new(StatusCode::from_u16(code).unwrap(), body.as_bytes().to_vec())
    }

    #[derive(Default)]
    struct ScriptedHandler {
        able: bool,
        outcome: Option<Result<bool, String>>,
        gate: Option<(Arc<Notify>, Arc<Semaphore>)>,
        refreshes: AtomicUsize,
    }

    impl RefreshHandler for ScriptedHandler {
        fn can_refresh(&self) -> RefreshFuture<'_, bool> {
            Box::pin(async move { self.able })
        }

        fn refresh(&self) -> RefreshFuture<'_, anyhow::Result<bool>> {
            Box::pin(async move {
                self.refreshes.fetch_add(1, Ordering::SeqCst);
                if let Some((started, gate)) = &self.gate {
                    started.notify_one();
                    let _permit = gate.acquire().await?;
                }
                match self.outcome.clone().unwrap_or(Ok(true)) {
                    Ok(renewed) => Ok(renewed),
                    Err(message) => Err(anyhow::anyhow!(message)),
                }
            })
        }
    }

    fn counting_listener() -> (Arc<AtomicUsize>, Arc<dyn UnauthorizedListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let listener = move || {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        (count, Arc::new(listener))
    }

    fn builder() -> PipelineConfigBuilder {
        PipelineConfig::builder(Url::parse("http://api.test/").unwrap())
    }

    fn request(pipeline: &RequestPipeline) -> ApiRequest {
        ApiRequest::get(pipeline.url("article/list/0/json").unwrap())
    }

    #[tokio::test]
    async fn refresh_success_retries_and_stays_quiet() {
        let transport = QueuedTransport::with(vec![Ok(status(401, "")), Ok(status(200, "ok"))]);
        let handler = Arc::new(ScriptedHandler {
            able: true,
            ..ScriptedHandler::default()
        });
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder()
                .refresh_handler(handler.clone())
                .unauthorized_listener(listener)
                .build(),
            transport.clone(),
        );

        let response = pipeline.execute(request(&pipeline)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "ok");
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_unauthorized_call_does_not_wait_for_refresh() {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Semaphore::new(0));
        let transport = QueuedTransport::with(vec![
            Ok(status(401, "")),
            Ok(status(401, "")),
            Ok(status(200, "ok")),
        ]);
        let handler = Arc::new(ScriptedHandler {
            able: true,
            gate: Some((started.clone(), gate.clone())),
            ..ScriptedHandler::default()
        });
        let (notified, listener) = counting_listener();
        let pipeline = Arc::new(RequestPipeline::new(
            builder()
                .refresh_handler(handler.clone())
                .unauthorized_listener(listener)
                .build(),
            transport.clone(),
        ));

        let first = {
            let pipeline = Arc::clone(&pipeline);
            let request = request(&pipeline);
            tokio::spawn(async move { pipeline.execute(request).await })
        };
        started.notified().await;

        let second = pipeline.execute(request(&pipeline)).await;
        assert_eq!(
            second.unwrap_err(),
            ApiError::Unauthorized {
                status: Some(401),
                message: "Unauthorized".into()
            }
        );
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(!pipeline.refreshing.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unauthorized_without_handler_notifies_listener() {
        let transport = QueuedTransport::with(vec![Ok(status(403, "denied"))]);
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder().unauthorized_listener(listener).build(),
            transport.clone(),
        );

        let err = pipeline.execute(request(&pipeline)).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Unauthorized {
                status: Some(403),
                message: "denied".into()
            }
        );
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn declining_handler_is_not_asked_to_refresh() {
        let transport = QueuedTransport::with(vec![Ok(status(401, ""))]);
        let handler = Arc::new(ScriptedHandler::default());
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder()
                .refresh_handler(handler.clone())
                .unauthorized_listener(listener)
                .build(),
            transport,
        );

        let err = pipeline.execute(request(&pipeline)).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_clears_flag_and_notifies() {
        let transport = QueuedTransport::with(vec![Ok(status(401, "")), Ok(status(401, ""))]);
        let handler = Arc::new(ScriptedHandler {
            able: true,
            outcome: Some(Err("login rejected".into())),
            ..ScriptedHandler::default()
        });
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder()
                .refresh_handler(handler.clone())
                .unauthorized_listener(listener)
                .build(),
            transport.clone(),
        );

        assert!(pipeline.execute(request(&pipeline)).await.unwrap_err().is_unauthorized());
        assert!(!pipeline.refreshing.load(Ordering::SeqCst));
        assert!(pipeline.execute(request(&pipeline)).await.unwrap_err().is_unauthorized());
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 2);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn retry_still_unauthorized_is_reported_once() {
        let transport = QueuedTransport::with(vec![Ok(status(401, "")), Ok(status(401, "again"))]);
        let handler = Arc::new(ScriptedHandler {
            able: true,
            ..ScriptedHandler::default()
        });
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder()
                .refresh_handler(handler.clone())
                .unauthorized_listener(listener)
                .build(),
            transport.clone(),
        );

        let err = pipeline.execute(request(&pipeline)).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Unauthorized {
                status: Some(401),
                message: "again".into()
            }
        );
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn retry_transport_failure_reports_original_unauthorized() {
        let transport = QueuedTransport::with(vec![
            Ok(status(401, "expired")),
            Err(TransportError::Timeout("read".into())),
        ]);
        let handler = Arc::new(ScriptedHandler {
            able: true,
            ..ScriptedHandler::default()
        });
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder()
                .refresh_handler(handler.clone())
                .unauthorized_listener(listener)
                .build(),
            transport.clone(),
        );

        let err = pipeline.execute(request(&pipeline)).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Unauthorized {
                status: Some(401),
                message: "expired".into()
            }
        );
        assert_eq!(handler.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert!(!pipeline.refreshing.load(Ordering::SeqCst));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn retry_carries_renewed_token() {
        let credentials = CredentialStore::new(Arc::new(MemorySecrets::new()));
        credentials.save("stale", "7", "alice", "pw").await.unwrap();

        struct Renewing(CredentialStore);
        impl RefreshHandler for Renewing {
            fn can_refresh(&self) -> RefreshFuture<'_, bool> {
                Box::pin(async { true })
            }
            fn refresh(&self) -> RefreshFuture<'_, anyhow::Result<bool>> {
                Box::pin(async move {
                    self.0.save("fresh", "7", "alice", "pw").await?;
                    Ok(true)
                })
            }
        }

        let transport = QueuedTransport::with(vec![Ok(status(401, "")), Ok(status(200, ""))]);
        let pipeline = RequestPipeline::new(
            builder()
                .credentials(credentials.clone())
                .refresh_handler(Arc::new(Renewing(credentials)))
                .build(),
            transport.clone(),
        );

        pipeline.execute(request(&pipeline)).await.unwrap();
        let requests = transport.requests();
        assert_eq!(requests[0].header("authorization"), Some("Bearer stale"));
        assert_eq!(requests[1].header("authorization"), Some("Bearer fresh"));
    }

    #[tokio::test]
    async fn injects_headers_and_cookies_and_captures_set_cookie() {
        let credentials = CredentialStore::new(Arc::new(MemorySecrets::new()));
        credentials.save("tok", "1", "bob", "pw").await.unwrap();
        let cookies = Arc::new(MemoryCookieStore::new());
        let url = Url::parse("http://api.test/banner/json").unwrap();
        cookies.save_from_response(&url, &["JSESSIONID=abc; Path=/".to_string()]);

        let mut reply = status(200, "{}");
        reply.headers.append(
            SET_COOKIE,
            HeaderValue::from_static("token_pass=xyz; Path=/; HttpOnly"),
        );
        let transport = QueuedTransport::with(vec![Ok(reply)]);
        let provider = || vec![("x-app-version".to_string(), "2.1.0".to_string())];
        let pipeline = RequestPipeline::new(
            builder()
                .static_header("x-client", "reader")
                .header_provider(Arc::new(provider))
                .credentials(credentials)
                .cookie_store(cookies.clone())
                .build(),
            transport.clone(),
        );

        pipeline.execute(ApiRequest::get(url.clone())).await.unwrap();
        let sent = &transport.requests()[0];
        assert_eq!(sent.header("x-client"), Some("reader"));
        assert_eq!(sent.header("x-app-version"), Some("2.1.0"));
        assert_eq!(sent.header("authorization"), Some("Bearer tok"));
        assert_eq!(sent.header("cookie"), Some("JSESSIONID=abc"));
        assert_eq!(
            cookies.load_for_request(&url),
            vec!["token_pass=xyz; Path=/; HttpOnly".to_string()]
        );
    }

    struct ThreadRecordingStore {
        inner: MemoryCookieStore,
        threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl ThreadRecordingStore {
        fn record(&self) {
            self.threads.lock().unwrap().push(std::thread::current().id());
        }
    }

    impl CookieStore for ThreadRecordingStore {
        fn save_from_response(&self, url: &Url, cookies: &[String]) {
            self.record();
            self.inner.save_from_response(url, cookies);
        }

        fn load_for_request(&self, url: &Url) -> Vec<String> {
            self.record();
            self.inner.load_for_request(url)
        }

        fn clear(&self) {
            self.inner.clear();
        }
    }

    #[tokio::test]
    async fn cookie_store_runs_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let store = Arc::new(ThreadRecordingStore {
            inner: MemoryCookieStore::new(),
            threads: std::sync::Mutex::new(Vec::new()),
        });
        let mut reply = status(200, "");
        reply
            .headers
            .append(SET_COOKIE, HeaderValue::from_static("JSESSIONID=def; Path=/"));
        let transport = QueuedTransport::with(vec![Ok(reply)]);
        let pipeline = RequestPipeline::new(builder().cookie_store(store.clone()).build(), transport);

        let request = request(&pipeline);
        pipeline.execute(request.clone()).await.unwrap();

        let threads = store.threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|thread| *thread != runtime_thread));
        assert_eq!(
            store.inner.load_for_request(&request.url),
            vec!["JSESSIONID=def; Path=/".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_token_is_not_sent() {
        let credentials = CredentialStore::new(Arc::new(MemorySecrets::new()));
        credentials.save("", "1", "bob", "pw").await.unwrap();
        let transport = QueuedTransport::with(vec![Ok(status(200, ""))]);
        let pipeline = RequestPipeline::new(
            builder().credentials(credentials).build(),
            transport.clone(),
        );

        pipeline.execute(request(&pipeline)).await.unwrap();
        assert_eq!(transport.requests()[0].header("authorization"), None);
    }

    #[tokio::test]
    async fn other_statuses_become_http_failures() {
        let transport = QueuedTransport::with(vec![Ok(status(502, ""))]);
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder().unauthorized_listener(listener).build(),
            transport,
        );

        let err = pipeline.execute(request(&pipeline)).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeouts_are_network_failures_not_unauthorized() {
        let transport = QueuedTransport::with(vec![Err(TransportError::Timeout("read".into()))]);
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder().unauthorized_listener(listener).build(),
            transport,
        );

        let err = pipeline.execute(request(&pipeline)).await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn envelope_business_failure_is_verbatim() {
        let transport = QueuedTransport::with(vec![Ok(status(
            200,
            r#"{"errorCode":-1,"errorMsg":"账号密码不匹配！"}"#,
        ))]);
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder().unauthorized_listener(listener).build(),
            transport,
        );

        let err = pipeline
            .call::<serde_json::Value>(request(&pipeline))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Business {
                code: -1,
                message: "账号密码不匹配！".into()
            }
        );
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn envelope_unauthorized_code_notifies_listener() {
        let transport = QueuedTransport::with(vec![Ok(status(
            200,
            r#"{"errorCode":-1001,"errorMsg":"请先登录！"}"#,
        ))]);
        let (notified, listener) = counting_listener();
        let pipeline = RequestPipeline::new(
            builder().unauthorized_listener(listener).build(),
            transport,
        );

        let err = pipeline.call_empty(request(&pipeline)).await.unwrap_err();
        assert_eq!(err.status(), None);
        assert!(err.is_unauthorized());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn call_decodes_data() {
        let transport = QueuedTransport::with(vec![Ok(status(
            200,
            r#"{"data":{"id":3},"errorCode":0,"errorMsg":""}"#,
        ))]);
        let pipeline = RequestPipeline::new(builder().build(), transport);

        #[derive(serde::Deserialize)]
        struct Id {
            id: u32,
        }
        let value: Id = pipeline.call(request(&pipeline)).await.unwrap();
        assert_eq!(value.id, 3);
    }

    #[test]
    fn url_joins_relative_paths() {
        let pipeline = RequestPipeline::new(builder().build(), QueuedTransport::with(Vec::new()));
        assert_eq!(
            pipeline.url("user/login").unwrap().as_str(),
            "http://api.test/user/login"
        );
    }
}
