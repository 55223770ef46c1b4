//! In-memory monitoring server used by unit tests.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceExt;

use crate::import::normalizer::MonitorCreateRequest;
use crate::kuma::{Connector, Credentials, KumaError, Monitor, MonitorApi, Tag};
use crate::server::config::ServerConfig;
use crate::web::{create_axum_router, AppState};

#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub monitors: Vec<Monitor>,
    pub tags: Vec<Tag>,
    pub created_monitors: Vec<MonitorCreateRequest>,
    pub created_tags: Vec<String>,
    /// `(monitor_id, tag_id)` pairs.
    pub attached: Vec<(i64, i64)>,
    pub deleted: Vec<i64>,
    pub get_tags_calls: usize,
    pub calls: usize,
    pub disconnects: usize,
    next_id: i64,
    failing_monitors: HashSet<String>,
    failing_tags: HashSet<String>,
    failing_attach: HashSet<String>,
    failing_deletes: HashSet<i64>,
    disconnect_after: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FakeKuma {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeKuma {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                next_id: 100,
                ..FakeState::default()
            })),
        }
    }

    pub fn with_monitor(self, id: i64, name: &str, monitor_type: &str) -> Self {
        self.lock().monitors.push(Monitor::new(id, name, monitor_type));
        self
    }

    pub fn with_tag(self, id: i64, name: &str) -> Self {
        self.lock().tags.push(Tag {
            id,
            name: name.to_string(),
            color: "#059669".to_string(),
        });
        self
    }

    pub fn failing_monitor(self, name: &str) -> Self {
        self.lock().failing_monitors.insert(name.to_string());
        self
    }

    pub fn failing_tag(self, name: &str) -> Self {
        self.lock().failing_tags.insert(name.to_string());
        self
    }

    pub fn failing_attach(self, tag_name: &str) -> Self {
        self.lock().failing_attach.insert(tag_name.to_string());
        self
    }

    pub fn failing_delete(self, id: i64) -> Self {
        self.lock().failing_deletes.insert(id);
        self
    }

    /// Every call after the first `calls` ones fails with `Disconnected`.
    pub fn disconnect_after_calls(self, calls: usize) -> Self {
        self.lock().disconnect_after = Some(calls);
        self
    }

    pub fn state(&self) -> FakeState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    fn enter(&self) -> Result<MutexGuard<'_, FakeState>, KumaError> {
        let mut state = self.lock();
        if state.disconnect_after.is_some_and(|limit| state.calls >= limit) {
            return Err(KumaError::Disconnected);
        }
        state.calls += 1;
        Ok(state)
    }
}

#[async_trait]
impl MonitorApi for FakeKuma {
    async fn get_monitors(&mut self) -> Result<Vec<Monitor>, KumaError> {
        let state = self.enter()?;
        Ok(state.monitors.clone())
    }

    async fn delete_monitor(&mut self, monitor_id: i64) -> Result<(), KumaError> {
        let mut state = self.enter()?;
        let known = state.monitors.iter().any(|m| m.id == monitor_id);
        if !known || state.failing_deletes.contains(&monitor_id) {
            return Err(KumaError::Rejected("Monitor not found".to_string()));
        }
        state.monitors.retain(|m| m.id != monitor_id);
        state.deleted.push(monitor_id);
        Ok(())
    }

    async fn add_monitor(&mut self, request: &MonitorCreateRequest) -> Result<i64, KumaError> {
        let mut state = self.enter()?;
        if state.failing_monitors.contains(&request.name) {
            return Err(KumaError::Rejected("Invalid hostname".to_string()));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.created_monitors.push(request.clone());
        state
            .monitors
            .push(Monitor::new(id, &request.name, request.monitor_type.as_str()));
        Ok(id)
    }

    async fn get_tags(&mut self) -> Result<Vec<Tag>, KumaError> {
        let mut state = self.enter()?;
        state.get_tags_calls += 1;
        Ok(state.tags.clone())
    }

    async fn add_tag(&mut self, name: &str, color: &str) -> Result<Tag, KumaError> {
        let mut state = self.enter()?;
        if state.failing_tags.contains(name) {
            return Err(KumaError::Rejected("Tag rejected".to_string()));
        }
        state.next_id += 1;
        let tag = Tag {
            id: state.next_id,
            name: name.to_string(),
            color: color.to_string(),
        };
        state.tags.push(tag.clone());
        state.created_tags.push(name.to_string());
        Ok(tag)
    }

    async fn add_monitor_tag(
        &mut self,
        monitor_id: i64,
        tag_id: i64,
        _value: &str,
    ) -> Result<(), KumaError> {
        let mut state = self.enter()?;
        let tag_name = state
            .tags
            .iter()
            .find(|t| t.id == tag_id)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        if state.failing_attach.contains(&tag_name) {
            return Err(KumaError::Rejected("Tag not found".to_string()));
        }
        state.attached.push((monitor_id, tag_id));
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.lock().disconnects += 1;
    }
}

/// Hands out sessions that all share one [`FakeKuma`].
pub struct FakeConnector {
    pub kuma: FakeKuma,
    pub refuse: Option<KumaError>,
}

impl FakeConnector {
    pub fn new(kuma: FakeKuma) -> Self {
        Self { kuma, refuse: None }
    }

    pub fn refusing(error: KumaError) -> Self {
        Self {
            kuma: FakeKuma::new(),
            refuse: Some(error),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _credentials: &Credentials) -> Result<Box<dyn MonitorApi>, KumaError> {
        match &self.refuse {
            Some(error) => Err(error.clone()),
            None => Ok(Box::new(self.kuma.clone())),
        }
    }
}

/// Full HTTP router backed by `connector`, storing uploads in `upload_dir`.
pub fn test_router(connector: FakeConnector, upload_dir: &Path) -> Router {
    let config = ServerConfig {
        upload_dir: upload_dir.display().to_string(),
        ..ServerConfig::default()
    };
    let state = AppState::new(Arc::new(config), Arc::new(connector));
    create_axum_router(Arc::new(state))
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, body)
}

pub async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

pub fn credentials() -> Value {
    serde_json::json!({
        "kuma_url": "http://kuma.local:3001",
        "username": "admin",
        "password": "secret"
    })
}

/// `credentials()` with the fields of `extra` added.
pub fn with_credentials(extra: Value) -> Value {
    let mut body = credentials();
    if let (Some(target), Value::Object(fields)) = (body.as_object_mut(), extra) {
        target.extend(fields);
    }
    body
}
