use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::import::normalizer::{MonitorCreateRequest, MonitorTarget};

/// A monitor as pushed by the server in its `monitorList` event.
///
/// Only the fields the console reasons about are typed; everything else is
/// kept in `extra` and handed back to the browser untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Monitor {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub monitor_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<MonitorTagRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Monitor {
    pub fn new(id: i64, name: &str, monitor_type: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            monitor_type: monitor_type.to_string(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Comma separated tag names, with `name:value` for valued tags.
    pub fn tag_names(&self) -> String {
        self.tags
            .iter()
            .map(|tag| match tag.value.as_deref() {
                Some(value) if !value.is_empty() => format!("{}:{}", tag.name, value),
                _ => tag.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A tag attached to a monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorTagRef {
    #[serde(default)]
    pub tag_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Turns the `monitorList` payload (an object keyed by monitor id) into a list
/// ordered by id.
pub fn monitors_from_list(payload: &Value) -> Result<Vec<Monitor>, serde_json::Error> {
    let mut monitors = match payload {
        Value::Object(map) => map
            .values()
            .map(|v| serde_json::from_value::<Monitor>(v.clone()))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Array(items) => items
            .iter()
            .map(|v| serde_json::from_value::<Monitor>(v.clone()))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };
    monitors.sort_by_key(|m| m.id);
    Ok(monitors)
}

/// Builds the object sent with the `add` event.
///
/// The server stores whatever it receives, so every field it dereferences
/// unconditionally gets a value here before the request's own fields are
/// layered on top.
pub fn monitor_payload(request: &MonitorCreateRequest) -> Value {
    let mut payload = json!({
        "type": request.monitor_type.as_str(),
        "name": request.name,
        "description": request.description,
        "interval": request.interval,
        "retryInterval": request.retry_interval,
        "resendInterval": 0,
        "maxretries": request.max_retries,
        "upsideDown": false,
        "notificationIDList": {},
        "accepted_statuscodes": ["200-299"],
        "method": "GET",
        "httpBodyEncoding": "json",
        "maxredirects": 10,
        "ignoreTls": false,
        "expiryNotification": false,
        "packetSize": 56,
        "kafkaProducerBrokers": [],
        "kafkaProducerSaslOptions": { "mechanism": "None" },
    });

    let Some(fields) = payload.as_object_mut() else {
        return payload;
    };

    match &request.target {
        MonitorTarget::Url { url } => {
            fields.insert("url".into(), json!(url));
        }
        MonitorTarget::HostPort { hostname, port } => {
            fields.insert("hostname".into(), json!(hostname));
            if let Some(port) = port {
                fields.insert("port".into(), json!(port));
            }
        }
        MonitorTarget::Host { hostname } => {
            fields.insert("hostname".into(), json!(hostname));
        }
        MonitorTarget::Dns {
            hostname,
            resolve_server,
            resolve_type,
        } => {
            fields.insert("hostname".into(), json!(hostname));
            fields.insert("dns_resolve_server".into(), json!(resolve_server));
            fields.insert("dns_resolve_type".into(), json!(resolve_type));
        }
        MonitorTarget::None => {}
    }

    for (key, value) in request.options.entries() {
        fields.insert(key.to_string(), value.clone());
    }

    payload
}
