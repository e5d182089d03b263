//! End-to-end session scenarios: a full [`SessionContext`] against a mocked backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::SessionContext;
use crate::api::models::users::Role;
use crate::auth::session::{SessionPhase, SessionSnapshot};
use crate::config::{Config, StorageConfig};
use crate::notifications::NotificationLevel;
use crate::router::NavigationOutcome;
use crate::storage::{CredentialStorage, FileCredentialStorage, MemoryCredentialStorage};
use crate::test_utils::{RecordingNotifier, create_test_config, mount_identity, mount_token, test_user};

fn context_with(server: &MockServer, storage: Arc<dyn CredentialStorage>) -> (SessionContext, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let context = SessionContext::with_storage(&create_test_config(&server.uri()), storage, notifier.clone()).unwrap();
    (context, notifier)
}

fn location(context: &SessionContext) -> Option<String> {
    context.router().current().map(|l| l.path)
}

fn completed(outcome: NavigationOutcome) -> String {
    match outcome {
        NavigationOutcome::Completed(location) => location.path,
        NavigationOutcome::Superseded => panic!("Expected navigation to complete"),
    }
}

/// Login then logout through the file-backed store: nothing survives, on disk or in memory
#[test_log::test(tokio::test)]
async fn test_login_then_logout_leaves_no_session() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    mount_identity(&server, Role::RegularUser).await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    let config = Config {
        storage: StorageConfig::File {
            path: session_file.clone(),
            key: "token".to_string(),
        },
        ..create_test_config(&server.uri())
    };
    let context = SessionContext::new(&config, Arc::new(RecordingNotifier::default())).unwrap();

    context.session().login("bob", "password").await.unwrap();
    let on_disk = FileCredentialStorage::new(&session_file, "token");
    assert_eq!(on_disk.load().unwrap().as_deref(), Some("abc123"));
    assert_eq!(location(&context).as_deref(), Some("/"));

    context.session().logout().await;

    assert!(!context.session().is_authenticated());
    assert_eq!(context.session().user(), None);
    assert_eq!(on_disk.load().unwrap(), None);
    assert_eq!(location(&context).as_deref(), Some("/login"));
}

/// A mangled session file counts as logged out and is replaced by the next logout or login
#[tokio::test]
async fn test_corrupt_session_file_does_not_block_login() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    mount_identity(&server, Role::RegularUser).await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    std::fs::write(&session_file, "not json").unwrap();
    let config = Config {
        storage: StorageConfig::File {
            path: session_file.clone(),
            key: "token".to_string(),
        },
        ..create_test_config(&server.uri())
    };
    let context = SessionContext::new(&config, Arc::new(RecordingNotifier::default())).unwrap();
    assert!(!context.session().is_authenticated());

    context.session().logout().await;
    context.session().login("bob", "password").await.unwrap();

    assert!(context.session().is_authenticated());
    let on_disk = FileCredentialStorage::new(&session_file, "token");
    assert_eq!(on_disk.load().unwrap().as_deref(), Some("abc123"));
    assert_eq!(location(&context).as_deref(), Some("/"));
}

/// The credential persisted by one context is picked up by the next one
#[tokio::test]
async fn test_credential_survives_restart() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    mount_identity(&server, Role::ProjectAdmin).await;
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        storage: StorageConfig::File {
            path: dir.path().join("session.json"),
            key: "token".to_string(),
        },
        ..create_test_config(&server.uri())
    };

    let first = SessionContext::new(&config, Arc::new(RecordingNotifier::default())).unwrap();
    first.session().login("pat", "password").await.unwrap();
    drop(first);

    let second = SessionContext::new(&config, Arc::new(RecordingNotifier::default())).unwrap();
    assert_eq!(second.session().phase(), SessionPhase::Pending);
    assert_eq!(completed(second.bootstrap().await.unwrap()), "/");
    assert!(second.session().is_project_admin());
}

#[tokio::test]
async fn test_identity_failure_after_login_is_like_never_logging_in() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let storage = Arc::new(MemoryCredentialStorage::default());
    let (context, notifier) = context_with(&server, storage.clone());

    assert!(context.session().login("alice", "password").await.is_err());

    assert_eq!(context.session().snapshot(), SessionSnapshot::default());
    assert_eq!(storage.load().unwrap(), None);
    assert_eq!(location(&context).as_deref(), Some("/login"));
    assert!(
        !notifier
            .messages(NotificationLevel::Success)
            .contains(&"Login successful".to_string())
    );

    // Protected routes stay closed
    assert_eq!(completed(context.router().navigate("/projects").await.unwrap()), "/login");
}

#[tokio::test]
async fn test_admin_routes_closed_to_anonymous_visitors() {
    let server = MockServer::start().await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::default()));

    assert_eq!(completed(context.router().navigate("/admin/users").await.unwrap()), "/login");
    assert_eq!(completed(context.router().navigate("/admin").await.unwrap()), "/login");
}

#[tokio::test]
async fn test_admin_routes_closed_to_non_admins() {
    for role in [Role::RegularUser, Role::ProjectAdmin] {
        let server = MockServer::start().await;
        mount_identity(&server, role).await;
        let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::with_token("abc123")));

        assert_eq!(completed(context.router().navigate("/admin/users").await.unwrap()), "/");
        assert!(context.session().is_authenticated());
    }
}

#[tokio::test]
async fn test_admin_login_lands_in_admin_area() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    mount_identity(&server, Role::SystemAdmin).await;
    let (context, notifier) = context_with(&server, Arc::new(MemoryCredentialStorage::default()));

    context.session().login("alice", "password").await.unwrap();

    assert_eq!(location(&context).as_deref(), Some("/admin/users"));
    assert_eq!(notifier.messages(NotificationLevel::Success), vec!["Login successful".to_string()]);
}

#[tokio::test]
async fn test_guest_routes_unreachable_while_authenticated() {
    let server = MockServer::start().await;
    mount_identity(&server, Role::RegularUser).await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::with_token("abc123")));

    for guest_route in ["/login", "/register"] {
        assert_eq!(completed(context.router().navigate(guest_route).await.unwrap()), "/");
    }
    assert_eq!(completed(context.router().navigate("/about").await.unwrap()), "/about");
}

#[tokio::test]
async fn test_unauthorized_response_ends_session_idempotently() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    mount_identity(&server, Role::RegularUser).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/dashboard/statistics"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;
    let storage = Arc::new(MemoryCredentialStorage::default());
    let (context, _) = context_with(&server, storage.clone());
    context.session().login("bob", "password").await.unwrap();
    context.router().navigate("/projects").await.unwrap();

    for _ in 0..2 {
        let stats = context.dashboard().get_global_statistics().await;

        assert_eq!(stats.total_tasks, 0);
        assert_eq!(storage.load().unwrap(), None);
        assert_eq!(context.session().phase(), SessionPhase::Unauthenticated);
        assert_eq!(location(&context).as_deref(), Some("/login"));
    }
}

#[tokio::test]
async fn test_expired_credential_on_bootstrap_lands_on_login() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let storage = Arc::new(MemoryCredentialStorage::with_token("expired"));
    let (context, _) = context_with(&server, storage.clone());

    // The 401 starts a newer navigation to login, so the bootstrap one never commits
    assert_eq!(context.bootstrap().await.unwrap(), NavigationOutcome::Superseded);

    assert_eq!(storage.load().unwrap(), None);
    assert_eq!(context.session().snapshot(), SessionSnapshot::default());
    assert_eq!(location(&context).as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_initialize_auth_twice_is_same_as_once() {
    let server = MockServer::start().await;
    mount_identity(&server, Role::ProjectAdmin).await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::with_token("abc123")));

    context.session().initialize_auth().await;
    let once = (context.session().snapshot(), location(&context));
    context.session().initialize_auth().await;

    assert_eq!((context.session().snapshot(), location(&context)), once);
}

#[tokio::test]
async fn test_persisted_admin_credential() {
    let server = MockServer::start().await;
    mount_identity(&server, Role::SystemAdmin).await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::with_token("abc123")));

    assert_eq!(completed(context.router().navigate("/").await.unwrap()), "/");

    let session = context.session();
    assert!(session.is_authenticated());
    assert!(session.is_system_admin());
    assert_eq!(session.user(), Some(test_user(Role::SystemAdmin)));
    assert_eq!(session.user().map(|u| u.username), Some("alice".to_string()));

    assert_eq!(completed(context.router().navigate("/login").await.unwrap()), "/");
    assert_eq!(completed(context.router().navigate("/admin/users").await.unwrap()), "/admin/users");
}

#[tokio::test]
async fn test_anonymous_protected_route_skips_identity_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::default()));

    assert_eq!(completed(context.router().navigate("/data-sources").await.unwrap()), "/login");
}

#[tokio::test]
async fn test_last_navigation_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(test_user(Role::RegularUser))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::with_token("abc123")));
    let router = context.router();

    let (first, second) = tokio::join!(router.navigate("/projects"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        router.navigate("/about").await
    });

    assert_eq!(first.unwrap(), NavigationOutcome::Superseded);
    assert_eq!(completed(second.unwrap()), "/about");
    assert_eq!(location(&context).as_deref(), Some("/about"));
}

#[tokio::test]
async fn test_session_transitions_are_observable() {
    let server = MockServer::start().await;
    mount_token(&server, "abc123").await;
    mount_identity(&server, Role::RegularUser).await;
    let (context, _) = context_with(&server, Arc::new(MemoryCredentialStorage::default()));
    let mut session_rx = context.session().subscribe();
    let mut location_rx = context.router().subscribe();

    context.session().login("bob", "password").await.unwrap();

    assert!(session_rx.has_changed().unwrap());
    assert!(session_rx.borrow_and_update().is_authenticated());
    assert!(location_rx.has_changed().unwrap());
    assert_eq!(location_rx.borrow_and_update().as_ref().map(|l| l.name), Some("home"));
}
