//! Authenticated HTTP transport to the DQ backend.
//!
//! Every backend call goes through [`Transport`], which plays the role of a request/response
//! interceptor pair:
//!
//! - **Request side**: if a credential is persisted, it is attached as
//!   `Authorization: Bearer <token>`. Callers never attach credentials themselves.
//! - **Response side**: successes pass through untouched. Any error response (or a request that
//!   got no response at all) produces an error [`Notification`] built from the server `message`
//!   field, falling back to a generic transport message, and is then returned to the caller so it
//!   can still react locally (e.g. mark a form field invalid).
//!
//! A 401 from any endpoint additionally clears the persisted credential and then fires every
//! registered [`SessionInvalidationListener`]. The transport knows nothing about routing; the
//! session context decides what an invalidated session means for navigation.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

use crate::api::models::auth::ErrorBody;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::notifications::{Notification, Notifier};
use crate::storage::CredentialStorage;
use crate::types::abbrev_token;

/// Reacts to the backend rejecting the current credential.
///
/// Called after the persisted credential has been cleared, on the task that issued the failing
/// request. Implementations must not block.
pub trait SessionInvalidationListener: Send + Sync {
    fn session_invalidated(&self);
}

/// A successful backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| Error::Internal {
            operation: format!("decode response body: {e}"),
        })
    }
}

pub struct Transport {
    client: Client,
    base_url: Url,
    storage: Arc<dyn CredentialStorage>,
    notifier: Arc<dyn Notifier>,
    listeners: RwLock<Vec<Arc<dyn SessionInvalidationListener>>>,
}

impl Transport {
    pub fn new(config: &Config, storage: Arc<dyn CredentialStorage>, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: ensure_slash(&config.api_base_url),
            storage,
            notifier,
            listeners: RwLock::new(Vec::new()),
        })
    }

    /// The credential slot this transport reads from and clears on 401.
    pub fn storage(&self) -> &Arc<dyn CredentialStorage> {
        &self.storage
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn add_invalidation_listener(&self, listener: Arc<dyn SessionInvalidationListener>) {
        self.listeners.write().push(listener);
    }

    /// `GET` a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.dispatch(Method::GET, path, self.client.get(url)).await?.json()
    }

    /// `POST` an `application/x-www-form-urlencoded` body and decode a JSON reply.
    pub async fn post_form<F, T>(&self, path: &str, form: &F) -> Result<T>
    where
        F: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        self.dispatch(Method::POST, path, self.client.post(url).form(form)).await?.json()
    }

    /// `POST` a JSON body. The reply is returned undecoded since some endpoints have no
    /// meaningful body.
    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        self.dispatch(Method::POST, path, self.client.post(url).json(body)).await
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Internal {
                operation: format!("build URL for {path}: {e}"),
            })
    }

    /// Request interceptor: attach the persisted credential, if any.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.storage.load() {
            Ok(Some(token)) => {
                trace!(token = %abbrev_token(&token), "Attaching bearer credential");
                request.bearer_auth(token)
            }
            Ok(None) => request,
            Err(e) => {
                // Unreadable storage is treated as logged out; the backend will answer 401 if needed
                warn!(error = %e, "Could not read persisted credential, sending request without it");
                request
            }
        }
    }

    /// Send a request through both interceptors.
    #[instrument(skip_all, fields(method = %method, path = %path), err)]
    async fn dispatch(&self, method: Method, path: &str, request: RequestBuilder) -> Result<ApiResponse> {
        let request = self.authorize(request);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.reject_without_response(e)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Err(self.reject_without_response(e)),
        };

        if status.is_success() {
            debug!(status = status.as_u16(), response_len = body.len(), "Request completed");
            return Ok(ApiResponse { status, body });
        }

        let error_body = ErrorBody::parse(body.as_bytes());
        let error = Error::Api {
            status,
            detail: error_body.detail_text(),
            message: error_body.message.clone(),
        };

        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_session();
        } else {
            debug!(status = status.as_u16(), "Request rejected by backend");
        }

        let message = error_body.message.unwrap_or_else(|| error.to_string());
        self.notifier.notify(Notification::error(message));

        Err(error)
    }

    fn reject_without_response(&self, e: reqwest::Error) -> Error {
        error!(error = %e, "HTTP request failed");
        let error = Error::Transport(e);
        self.notifier.notify(Notification::error(error.user_message()));
        error
    }

    /// Clear the persisted credential, then tell listeners. The order matters: listeners may
    /// navigate, and navigation must already see the credential gone.
    fn invalidate_session(&self) {
        info!("Backend rejected credential, invalidating session");
        if let Err(e) = self.storage.clear() {
            error!(error = %e, "Failed to clear persisted credential after 401");
        }

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.session_invalidated();
        }
    }
}

/// Makes sure a url has a trailing slash, so that `join` appends rather than replaces the last
/// path segment ('/api' + 'v1' is '/v1', '/api/' + 'v1' is '/api/v1').
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationLevel;
    use crate::storage::MemoryCredentialStorage;
    use crate::test_utils::RecordingNotifier;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    impl SessionInvalidationListener for CountingListener {
        fn session_invalidated(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn transport(base: &str, storage: Arc<MemoryCredentialStorage>, notifier: Arc<RecordingNotifier>) -> Transport {
        let config = Config {
            api_base_url: Url::parse(base).unwrap(),
            ..Default::default()
        };
        Transport::new(&config, storage, notifier).unwrap()
    }

    #[test]
    fn test_ensure_slash() {
        let url = Url::parse("http://localhost:8000/prefix").unwrap();
        assert_eq!(ensure_slash(&url).as_str(), "http://localhost:8000/prefix/");
        let joined = ensure_slash(&url).join("api/v1/auth/me").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:8000/prefix/api/v1/auth/me");
    }

    #[tokio::test]
    async fn test_bearer_attached_from_storage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/auth/me"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryCredentialStorage::with_token("abc123"));
        let transport = transport(&server.uri(), storage, Arc::new(RecordingNotifier::default()));

        let body: serde_json::Value = transport.get("/api/v1/auth/me").await.unwrap();
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let transport = transport(
            &server.uri(),
            Arc::new(MemoryCredentialStorage::default()),
            Arc::new(RecordingNotifier::default()),
        );
        let _: serde_json::Value = transport.get("/api/v1/dashboard/statistics").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_post_form_is_urlencoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("username=alice&password=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc123", "token_type": "bearer"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport(
            &server.uri(),
            Arc::new(MemoryCredentialStorage::default()),
            Arc::new(RecordingNotifier::default()),
        );
        let body: serde_json::Value = transport
            .post_form("/api/v1/auth/token", &[("username", "alice"), ("password", "s3cret")])
            .await
            .unwrap();
        assert_eq!(body["access_token"], "abc123");
    }

    #[tokio::test]
    async fn test_unauthorized_clears_credential_and_fires_listeners() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Could not validate credentials"})))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryCredentialStorage::with_token("expired"));
        let notifier = Arc::new(RecordingNotifier::default());
        let transport = transport(&server.uri(), storage.clone(), notifier.clone());
        let listener = Arc::new(CountingListener::default());
        transport.add_invalidation_listener(listener.clone());

        let err = transport.get::<serde_json::Value>("/api/v1/projects").await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(err.detail(), Some("Could not validate credentials"));
        assert_eq!(storage.load().unwrap(), None);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            notifier.messages(NotificationLevel::Error),
            vec!["Request failed with status code 401".to_string()]
        );

        // Repeated 401s keep the slot empty and keep notifying listeners
        let _ = transport.get::<serde_json::Value>("/api/v1/projects").await;
        assert_eq!(storage.load().unwrap(), None);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_notification_uses_message_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Project name taken", "detail": "name"})))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryCredentialStorage::with_token("abc123"));
        let notifier = Arc::new(RecordingNotifier::default());
        let transport = transport(&server.uri(), storage.clone(), notifier.clone());

        let err = transport.post_json("/api/v1/projects", &json!({"name": "x"})).await.unwrap_err();

        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(notifier.messages(NotificationLevel::Error), vec!["Project name taken".to_string()]);
        // Only 401 touches the credential
        assert_eq!(storage.load().unwrap().as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_notifies_and_rejects() {
        // Grab a free port and release it so nothing is listening there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let uri = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let notifier = Arc::new(RecordingNotifier::default());
        let transport = transport(&uri, Arc::new(MemoryCredentialStorage::default()), notifier.clone());

        let err = transport.get::<serde_json::Value>("/api/v1/auth/me").await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(notifier.messages(NotificationLevel::Error), vec!["Request failed".to_string()]);
    }
}
