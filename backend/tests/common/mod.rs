#![allow(dead_code)]
use std::{net::SocketAddr, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

use placement_backend::{
    api,
    auth::{hash_password, AuthUser, Role},
    clock::{Clock, FixedClock, SystemClock},
    models::{
        organization::NewOrganization, user::NewUser, workplace::NewWorkplace,
    },
    notify::RecipientPolicy,
    store::{MemoryStore, OrganizationRepository, UserRepository, WorkplaceRepository},
    AppState,
};

pub const JWT_SECRET: &str = "test-secret-that-is-at-least-32-chars-long!!";
pub const JWT_EXPIRY_HOURS: u64 = 12;
pub const PASSWORD: &str = "testpass123";

pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Spin up a real Axum server on a random port over a fresh in-memory store.
/// Each test gets its own store, so no cleanup is needed.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(Arc::new(SystemClock), RecipientPolicy::default()).await
}

pub async fn setup_test_app_with(clock: Arc<dyn Clock>, recipients: RecipientPolicy) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        clock,
        recipients,
        JWT_SECRET.to_string(),
        JWT_EXPIRY_HOURS,
    );

    // Login is mounted without the rate limiter the server binary adds.
    let app = api::router(state.clone()).merge(api::login_router(state.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp { addr, store, state }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}+{}@test.local", prefix, &Uuid::new_v4().to_string()[..8])
}

/// Create a test organization with a unique slug. Returns the org ID.
pub async fn create_test_org(store: &MemoryStore, suffix: &str) -> Uuid {
    let slug = format!("test-org-{}-{}", suffix, &Uuid::new_v4().to_string()[..8]);
    store
        .create_organization(NewOrganization {
            name: format!("Test Org {}", suffix),
            slug,
            timezone: "UTC".into(),
        })
        .await
        .expect("Failed to create test org")
        .id
}

/// Create a test user with an Argon2-hashed password. Returns the user ID;
/// the password is always [`PASSWORD`].
pub async fn create_test_user(store: &MemoryStore, org_id: Uuid, role: Role, email: &str) -> Uuid {
    store
        .create_user(NewUser {
            org_id,
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).expect("Failed to hash password"),
            full_name: Some("Test User".into()),
            position: Some("Tester".into()),
            role,
        })
        .await
        .expect("Failed to create test user")
        .id
}

pub async fn create_test_workplace(store: &MemoryStore, org_id: Uuid, code: &str) -> Uuid {
    store
        .create_workplace(NewWorkplace {
            org_id,
            code: code.to_string(),
            name: format!("Workplace {}", code),
            location: Some("Main street 1".into()),
            capacity: Some(10),
            is_active: true,
        })
        .await
        .expect("Failed to create test workplace")
        .id
}

/// Caller identity for driving the lifecycle service directly.
pub fn caller(id: Uuid, org_id: Uuid, role: Role) -> AuthUser {
    AuthUser { id, org_id, role }
}

/// Log in via the HTTP API and return the JWT token.
pub async fn get_auth_token(app: &TestApp, email: &str) -> String {
    let resp = http_client()
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": email,
            "password": PASSWORD,
        }))
        .send()
        .await
        .expect("Login request failed");

    assert_eq!(resp.status(), 200, "Login should return 200");

    let body: serde_json::Value = resp.json().await.expect("Failed to parse login response");
    body["token"]
        .as_str()
        .expect("Response should contain token")
        .to_string()
}

/// Create a JWT token that is already expired (exp in the past).
pub fn create_expired_token(user_id: Uuid, org_id: Uuid) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use placement_backend::auth::Claims;

    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id,
        org_id,
        role: Role::Member,
        exp: (now - time::Duration::hours(1)).unix_timestamp(), // expired 1 hour ago
        iat: (now - time::Duration::hours(2)).unix_timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to create expired token")
}

pub fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .expect("Failed to format timestamp")
}

pub fn fixed_clock(at: OffsetDateTime) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(at))
}

/// Build a reqwest client (reusable across requests in a test).
pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}
