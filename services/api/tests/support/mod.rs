//! Shared helpers for HTTP-level tests

#![allow(dead_code)]

use api::{
    AppState, create_router,
    storage::{AvatarStorage, MemoryAvatarStorage},
};
use axum::http::{HeaderName, HeaderValue, header::AUTHORIZATION};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub struct TestApp {
    pub server: TestServer,
    pub avatars: MemoryAvatarStorage,
}

pub fn spawn_app() -> TestApp {
    let avatars = MemoryAvatarStorage::new("/media");
    let server = spawn_server(Arc::new(avatars.clone()));

    TestApp { server, avatars }
}

/// Server over in-memory stores and the given avatar storage
pub fn spawn_server(avatars: Arc<dyn AvatarStorage>) -> TestServer {
    let state = AppState::memory(avatars, MAX_AVATAR_BYTES);
    TestServer::new(create_router(state)).expect("Could not create test server.")
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header"),
    )
}

/// Register `username` and return its token
pub async fn register(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/api/register/")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "s3cret-passw0rd",
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    body["token"]
        .as_str()
        .expect("registration returns a token")
        .to_string()
}
