//! Test utilities for integration testing (available with `test-utils` feature).

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::api::models::users::{Role, User};
use crate::config::{Config, StorageConfig};
use crate::notifications::{Notification, NotificationLevel, Notifier};
use crate::router::Navigator;
use crate::types::endpoints;

/// Config pointing at a mock backend, with the credential kept in memory.
pub fn create_test_config(api_base_url: &str) -> Config {
    Config {
        api_base_url: Url::parse(api_base_url).expect("mock server uri is a valid URL"),
        storage: StorageConfig::Memory,
        ..Default::default()
    }
}

/// A fixed identity per role. The system admin is `alice` with id 1.
pub fn test_user(role: Role) -> User {
    let (id, username) = match role {
        Role::SystemAdmin => (1, "alice"),
        Role::ProjectAdmin => (2, "pat"),
        Role::RegularUser => (3, "bob"),
    };

    User {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        role,
        is_active: true,
        created_at: Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("fixed date is valid"),
    }
}

/// Backend accepts any credentials on the token endpoint and issues `token`.
pub async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(endpoints::TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": token, "token_type": "bearer"})))
        .mount(server)
        .await;
}

/// Backend resolves any credential to the [`test_user`] for `role`.
pub async fn mount_identity(server: &MockServer, role: Role) {
    Mock::given(method("GET"))
        .and(path(endpoints::ME))
        .respond_with(ResponseTemplate::new(200).set_body_json(test_user(role)))
        .mount(server)
        .await;
}

/// Records every notification for later assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Messages at `level`, in emission order.
    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

/// Navigator that records requested paths instead of navigating.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    pushes: Mutex<Vec<String>>,
    hard_redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().clone()
    }

    pub fn hard_redirects(&self) -> Vec<String> {
        self.hard_redirects.lock().clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn push(&self, path: &str) {
        self.pushes.lock().push(path.to_string());
    }

    fn hard_redirect(&self, path: &str) {
        self.hard_redirects.lock().push(path.to_string());
    }
}

