//! Client side of the Uptime Kuma API.
//!
//! Uptime Kuma has no REST API for monitor management; everything goes through
//! Socket.IO events. [`Connector`] opens an authenticated session and
//! [`MonitorApi`] is the set of calls the console needs from it.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::import::normalizer::MonitorCreateRequest;

pub mod models;
pub mod packet;
pub mod session;

pub use models::{Monitor, MonitorTagRef, Tag};
pub use session::SocketIoConnector;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KumaError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("login failed: {0}")]
    Auth(String),
    #[error("connection to the monitoring server was lost")]
    Disconnected,
    #[error("timed out waiting for '{0}'")]
    Timeout(String),
    #[error("{0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl KumaError {
    /// True when the session can no longer be used, so a batch should stop
    /// issuing calls instead of failing every remaining item one by one.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, KumaError::Connection(_) | KumaError::Disconnected)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for KumaError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => KumaError::Disconnected,
            other => KumaError::Connection(other.to_string()),
        }
    }
}

/// Server address and login, sent by the operator with every request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub kuma_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Trims every field and returns `None` if any of them ends up empty.
    pub fn normalized(&self) -> Option<Credentials> {
        let kuma_url = self.kuma_url.trim();
        let username = self.username.trim();
        let password = self.password.trim();
        if kuma_url.is_empty() || username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Credentials {
            kuma_url: kuma_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// One logged-in session against the monitoring server.
///
/// Calls are issued one at a time; the tag-creation path on the server is not
/// idempotent under concurrent duplicate names.
#[async_trait]
pub trait MonitorApi: Send {
    async fn get_monitors(&mut self) -> Result<Vec<Monitor>, KumaError>;

    async fn delete_monitor(&mut self, monitor_id: i64) -> Result<(), KumaError>;

    /// Creates a monitor and returns the id the server assigned to it.
    async fn add_monitor(&mut self, request: &MonitorCreateRequest) -> Result<i64, KumaError>;

    async fn get_tags(&mut self) -> Result<Vec<Tag>, KumaError>;

    async fn add_tag(&mut self, name: &str, color: &str) -> Result<Tag, KumaError>;

    async fn add_monitor_tag(
        &mut self,
        monitor_id: i64,
        tag_id: i64,
        value: &str,
    ) -> Result<(), KumaError>;

    async fn disconnect(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MonitorApi>, KumaError>;
}
