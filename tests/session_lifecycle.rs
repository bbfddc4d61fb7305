//! Session lifecycle integration tests: restore, login, logout, expiry and
//! the mock fallback, against wiremock stubs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cropaid_session::models::{AuthResult, NewReport, Role, Severity};
use cropaid_session::{AuthMode, ClientConfig, SessionError, SessionManager};

fn manager_for(base_url: &str, dir: &TempDir) -> SessionManager {
    manager_with_timeout(base_url, dir, Duration::from_millis(500))
}

fn manager_with_timeout(base_url: &str, dir: &TempDir, timeout: Duration) -> SessionManager {
    let config = ClientConfig::new(base_url)
        .with_data_dir(dir.path())
        .with_timeout(timeout);
    SessionManager::new(config).unwrap()
}

/// A local address nothing is listening on
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "identifier": "farmer1@example.com",
            "password": "correct"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc",
            "user": {"id": 1, "role": "farmer", "email": "farmer1@example.com"}
        })))
        .mount(server)
        .await;
}

async fn mount_logout(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn restore_without_record_is_signed_out() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&unreachable_url(), &dir);
    assert!(manager.session().is_loading());

    let session = manager.restore().await;

    assert!(!session.is_loading());
    assert!(!session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert!(!manager.wait_until_ready().await.is_loading());
}

#[tokio::test]
async fn login_success_persists_a_real_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;

    let result: AuthResult = manager.login("farmer1@example.com", "correct").await.into();

    assert!(result.success);
    assert!(!result.mock);
    let session = manager.session();
    assert!(session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert_eq!(session.token(), Some("abc"));
    assert_eq!(session.current_user().unwrap().role, Role::Farmer);
}

#[tokio::test]
async fn restore_with_reachable_backend_keeps_real_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let restarted = manager_for(&server.uri(), &dir);
    let session = restarted.restore().await;

    assert!(session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert_eq!(session.token(), Some("abc"));
    assert_eq!(session.current_user().unwrap().id, 1);
}

#[tokio::test]
async fn restore_with_unreachable_backend_enters_mock_mode() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let offline = manager_for(&unreachable_url(), &dir);
    let session = offline.restore().await;

    assert!(session.is_authenticated());
    assert!(session.is_mock_mode());
    assert!(session.token().is_none());
    assert_eq!(session.current_user().unwrap().id, 1);
    assert!(dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn restore_with_rejected_token_clears_record() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Token expired"})))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let session = manager_for(&server.uri(), &dir).restore().await;

    assert!(!session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert!(!dir.path().join("token.dat").exists());
    assert!(!dir.path().join("user.dat").exists());
}

#[tokio::test]
async fn malformed_record_is_discarded() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("token.dat"), b"\"abc\"").unwrap();
    std::fs::write(dir.path().join("user.dat"), b"{broken").unwrap();

    let session = manager_for(&unreachable_url(), &dir).restore().await;

    assert!(!session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert!(!dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn login_against_unreachable_backend_uses_mock_data() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&unreachable_url(), &dir);
    manager.restore().await;

    let result: AuthResult = manager.login("farmer1@example.com", "correct").await.into();

    assert!(result.success);
    assert!(result.mock);
    let session = manager.session();
    assert!(session.is_authenticated());
    assert!(session.is_mock_mode());
    assert!(session.token().is_none());
    assert!(!dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn mock_fallback_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let config = ClientConfig::new(&unreachable_url())
        .with_data_dir(dir.path())
        .with_mock_fallback(false);
    let manager = SessionManager::new(config).unwrap();
    manager.restore().await;

    let err = manager.login("farmer1@example.com", "correct").await.unwrap_err();

    assert!(matches!(err, SessionError::BackendUnreachable(_)));
    assert!(!manager.session().is_authenticated());
}

#[tokio::test]
async fn wrong_password_leaves_session_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;
    let before = manager.session();

    let result = manager.login("farmer1@example.com", "wrong").await;

    assert!(
        matches!(&result, Err(SessionError::CredentialRejected(reason)) if reason == "Invalid credentials")
    );
    let flat: AuthResult = result.into();
    assert!(!flat.success);
    assert_eq!(flat.error.as_deref(), Some("Invalid credentials"));
    assert_eq!(manager.session(), before);
}

#[tokio::test]
async fn login_then_logout_returns_to_signed_out() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    let before = manager.restore().await;

    manager.login("farmer1@example.com", "correct").await.unwrap();
    manager.logout().await;
    let once = manager.session();
    manager.logout().await;

    assert_eq!(once, before);
    assert_eq!(manager.session(), once);
    assert!(once.token().is_none());
    assert!(once.current_user().is_none());
    assert!(!once.is_mock_mode());
    assert!(!manager_for(&server.uri(), &dir).restore().await.is_authenticated());
}

#[tokio::test]
async fn logout_leaves_mock_mode() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&unreachable_url(), &dir);
    manager.restore().await;
    manager.login("farmer2@example.com", "any").await.unwrap();

    manager.logout().await;

    assert!(!manager.session().is_mock_mode());
    assert!(!manager.session().is_authenticated());
}

#[tokio::test]
async fn requests_carry_the_bearer_token() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/farmer/reports"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 9,
            "type": "flood",
            "status": "investigating",
            "severity": "minor",
            "description": "Low field under water",
            "created_at": "2024-07-12T08:30:00Z"
        }])))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;
    manager.login("farmer1@example.com", "correct").await.unwrap();

    let reports = manager.farmer_reports().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, 9);
}

#[tokio::test]
async fn unauthorized_response_expires_the_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/farmer/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Token expired"})))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;
    manager.login("farmer1@example.com", "correct").await.unwrap();
    let changes = manager.subscribe();

    let err = manager.farmer_dashboard().await.unwrap_err();

    assert!(matches!(err, SessionError::SessionExpired));
    assert!(err.requires_login());
    assert!(changes.has_changed().unwrap());
    let session = manager.session();
    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
    assert!(!session.is_mock_mode());
    assert!(!dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn slow_backend_is_unreachable_but_keeps_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/admin/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;
    manager.login("farmer1@example.com", "correct").await.unwrap();

    let err = manager.admin_stats().await.unwrap_err();

    assert!(matches!(err, SessionError::BackendUnreachable(_)));
    assert!(manager.session().is_authenticated());
    assert!(!manager.session().is_mock_mode());
}

#[tokio::test]
async fn logout_cancels_requests_in_flight() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("GET"))
        .and(path("/farmer/reports"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(manager_with_timeout(
        &server.uri(),
        &dir,
        Duration::from_secs(5),
    ));
    manager.restore().await;
    manager.login("farmer1@example.com", "correct").await.unwrap();

    let pending = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.farmer_reports().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.logout().await;

    let outcome = pending.await.unwrap();
    assert!(matches!(outcome, Err(SessionError::Cancelled)));
    assert!(!manager.session().is_authenticated());
}

#[tokio::test]
async fn mock_reports_persist_for_the_process() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&unreachable_url(), &dir);
    manager.restore().await;
    let outcome = manager.login("farmer1@example.com", "any").await.unwrap();
    assert_eq!(outcome.mode, AuthMode::Mock);
    let before = manager.farmer_reports().await.unwrap().len();

    let created = manager
        .create_report(NewReport::Flood {
            severity: Severity::Severe,
            water_level: Some("chest-deep".into()),
            affected_area: None,
            description: "Typhoon rains".into(),
        })
        .await
        .unwrap();

    let reports = manager.farmer_reports().await.unwrap();
    assert_eq!(reports.len(), before + 1);
    assert!(reports.iter().any(|r| r.id == created.report_id));
    let dashboard = manager.farmer_dashboard().await.unwrap();
    assert_eq!(dashboard.profile.name, "Juan Dela Cruz");
}

#[tokio::test]
async fn register_forwards_profile_without_signing_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"message": "Account created"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;

    let outcome = manager.register(&profile()).await.unwrap();

    assert!(!outcome.signed_in);
    assert_eq!(outcome.message.as_deref(), Some("Account created"));
    assert!(!manager.session().is_authenticated());
}

#[tokio::test]
async fn register_adopts_a_returned_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "fresh",
            "user": {"id": 42, "name": "Ana Lopez", "role": "farmer"}
        })))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;

    let outcome = manager.register(&profile()).await.unwrap();

    assert!(outcome.signed_in);
    assert_eq!(manager.session().token(), Some("fresh"));
    assert!(dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn register_has_no_mock_fallback() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&unreachable_url(), &dir);
    manager.restore().await;

    let err = manager.register(&profile()).await.unwrap_err();

    assert!(matches!(err, SessionError::BackendUnreachable(_)));
    assert!(!manager.session().is_mock_mode());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "Email already registered"})),
        )
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&server.uri(), &dir);
    manager.restore().await;

    let result: AuthResult = manager.register(&profile()).await.into();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Email already registered"));
}

#[tokio::test]
async fn restore_keeps_session_when_probe_fails_with_server_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let session = manager_for(&server.uri(), &dir).restore().await;

    assert!(session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert_eq!(session.token(), Some("abc"));
    assert!(dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn restore_without_fallback_keeps_real_session_when_offline() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let config = ClientConfig::new(&unreachable_url())
        .with_data_dir(dir.path())
        .with_timeout(Duration::from_millis(500))
        .with_mock_fallback(false);
    let session = SessionManager::new(config).unwrap().restore().await;

    assert!(session.is_authenticated());
    assert!(!session.is_mock_mode());
    assert_eq!(session.token(), Some("abc"));
    assert_eq!(session.current_user().unwrap().id, 1);
}

#[tokio::test]
async fn mock_login_as_someone_else_drops_the_stored_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let offline = manager_for(&unreachable_url(), &dir);
    offline.restore().await;
    let outcome = offline.login("farmer2@example.com", "any").await.unwrap();
    assert_eq!(outcome.mode, AuthMode::Mock);
    assert_eq!(outcome.user.id, 2);

    let restarted = manager_for(&server.uri(), &dir).restore().await;

    assert!(!restarted.is_authenticated());
    assert!(!dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn mock_login_as_the_same_user_keeps_the_stored_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    let dir = TempDir::new().unwrap();
    manager_for(&server.uri(), &dir)
        .login("farmer1@example.com", "correct")
        .await
        .unwrap();

    let offline = manager_for(&unreachable_url(), &dir);
    offline.restore().await;
    offline.login("farmer1@example.com", "any").await.unwrap();

    assert!(offline.session().is_mock_mode());
    assert!(dir.path().join("token.dat").exists());
}

#[tokio::test]
async fn stalled_login_body_falls_back_to_mock_data() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 200\r\n\r\n{\"token\":";
        let _ = socket.write_all(head.as_bytes()).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });
    let dir = TempDir::new().unwrap();
    let manager = manager_for(&base_url, &dir);
    manager.restore().await;

    let outcome = manager.login("farmer1@example.com", "correct").await.unwrap();

    assert_eq!(outcome.mode, AuthMode::Mock);
    assert!(manager.session().is_mock_mode());
}

fn profile() -> cropaid_session::models::RegistrationProfile {
    cropaid_session::models::RegistrationProfile {
        first_name: "Ana".into(),
        last_name: "Lopez".into(),
        email: "ana@example.com".into(),
        phone: "09170000000".into(),
        password: "hunter22".into(),
        role: Role::Farmer,
        farm_name: "Lopez Farm".into(),
        farm_size: 1.2,
        address: "Purok 1".into(),
        barangay: "Lapuz".into(),
        municipality: "Norala".into(),
        province: "South Cotabato".into(),
        crops: vec!["rice".into()],
        notifications: vec!["sms".into(), "app".into()],
    }
}
