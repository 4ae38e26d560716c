//! API models for request and response payloads

use serde::Serialize;

pub mod transaction;
pub mod user;

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
