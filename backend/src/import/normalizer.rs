use serde_json::Value;
use std::fmt;

use super::table::{CellValue, MonitorRecord};
use super::TAG_COLUMNS;

pub const DEFAULT_INTERVAL: i64 = 60;
pub const DEFAULT_RETRY_INTERVAL: i64 = 30;
pub const DEFAULT_MAX_RETRIES: i64 = 3;
pub const DEFAULT_DNS_RESOLVE_SERVER: &str = "cloudflare";
pub const DEFAULT_DNS_RESOLVE_TYPE: &str = "A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorType {
    Http,
    Https,
    Port,
    Tcp,
    Udp,
    Ping,
    Dns,
    Other(String),
}

impl MonitorType {
    pub fn as_str(&self) -> &str {
        match self {
            MonitorType::Http => "http",
            MonitorType::Https => "https",
            MonitorType::Port => "port",
            MonitorType::Tcp => "tcp",
            MonitorType::Udp => "udp",
            MonitorType::Ping => "ping",
            MonitorType::Dns => "dns",
            MonitorType::Other(other) => other,
        }
    }
}

impl From<&str> for MonitorType {
    fn from(value: &str) -> Self {
        match value {
            "http" => MonitorType::Http,
            "https" => MonitorType::Https,
            "port" => MonitorType::Port,
            "tcp" => MonitorType::Tcp,
            "udp" => MonitorType::Udp,
            "ping" => MonitorType::Ping,
            "dns" => MonitorType::Dns,
            other => MonitorType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of integer coercion for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    /// Column missing, empty or zero.
    Absent,
    /// Column had a value that is not an integer.
    Unset,
    Value(i64),
}

impl NumericField {
    /// Coerces only truthy cells; zero and empty count as absent.
    pub fn coerce(cell: &CellValue) -> Self {
        if !cell.is_truthy() {
            return NumericField::Absent;
        }
        let parsed = match cell {
            CellValue::Integer(n) => Some(*n),
            CellValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            CellValue::Text(s) => s.trim().parse::<i64>().ok(),
            CellValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        };
        parsed.map_or(NumericField::Unset, NumericField::Value)
    }

    /// Absent falls back to `default`; unset stays unset.
    pub fn or_default(self, default: i64) -> Option<i64> {
        match self {
            NumericField::Absent => Some(default),
            NumericField::Unset => None,
            NumericField::Value(n) => Some(n),
        }
    }

    pub fn value(self) -> Option<i64> {
        match self {
            NumericField::Value(n) => Some(n),
            _ => None,
        }
    }
}

/// Type-specific target of a monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorTarget {
    Url {
        url: Option<String>,
    },
    HostPort {
        hostname: Option<String>,
        port: Option<i64>,
    },
    Host {
        hostname: Option<String>,
    },
    Dns {
        hostname: Option<String>,
        resolve_server: String,
        resolve_type: String,
    },
    None,
}

/// Optional fields copied through when the row carries them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOptions {
    pub weight_threshold: Option<Value>,
    pub expiry_notification: Option<Value>,
    pub ignore_tls: Option<Value>,
    pub max_redirects: Option<Value>,
}

impl MonitorOptions {
    fn from_record(record: &MonitorRecord) -> Self {
        let pick = |column: &str| {
            let cell = record.get(column);
            (!cell.is_empty()).then(|| cell.to_json())
        };
        Self {
            weight_threshold: pick("weight_threshold"),
            expiry_notification: pick("expiryNotification"),
            ignore_tls: pick("ignoreTls"),
            max_redirects: pick("maxredirects"),
        }
    }

    /// Present options under their wire names.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        [
            ("weight_threshold", self.weight_threshold.as_ref()),
            ("expiryNotification", self.expiry_notification.as_ref()),
            ("ignoreTls", self.ignore_tls.as_ref()),
            ("maxredirects", self.max_redirects.as_ref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorCreateRequest {
    pub name: String,
    pub monitor_type: MonitorType,
    pub interval: Option<i64>,
    pub retry_interval: Option<i64>,
    pub max_retries: Option<i64>,
    pub description: Option<String>,
    pub target: MonitorTarget,
    pub options: MonitorOptions,
}

/// A row ready for creation, with the tag values it should carry.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMonitor {
    pub request: MonitorCreateRequest,
    /// Non-empty values of the tag columns, in column order.
    pub tag_values: Vec<String>,
}

/// Builds the creation request for the row at `index` (1-based). Never fails;
/// bad numbers become unset and missing optional fields are left out. Columns
/// other than the ones read here are ignored.
pub fn normalize(index: usize, record: &MonitorRecord) -> NormalizedMonitor {
    let name = record
        .text("name")
        .unwrap_or_else(|| format!("Unnamed-{index}"));
    let monitor_type = MonitorType::from(record.text("type").unwrap_or_default().as_str());

    let hostname_or_url = || record.text("hostname").or_else(|| record.text("url"));
    let target = match monitor_type {
        MonitorType::Http | MonitorType::Https => MonitorTarget::Url {
            url: record.text("url"),
        },
        MonitorType::Port | MonitorType::Tcp | MonitorType::Udp => MonitorTarget::HostPort {
            hostname: hostname_or_url(),
            port: NumericField::coerce(record.get("port")).value(),
        },
        MonitorType::Ping => MonitorTarget::Host {
            hostname: hostname_or_url(),
        },
        MonitorType::Dns => MonitorTarget::Dns {
            hostname: hostname_or_url(),
            resolve_server: record
                .text("dns_resolve_server")
                .unwrap_or_else(|| DEFAULT_DNS_RESOLVE_SERVER.to_string()),
            resolve_type: record
                .text("dns_resolve_type")
                .unwrap_or_else(|| DEFAULT_DNS_RESOLVE_TYPE.to_string()),
        },
        MonitorType::Other(_) => MonitorTarget::None,
    };

    let request = MonitorCreateRequest {
        name,
        interval: NumericField::coerce(record.get("interval")).or_default(DEFAULT_INTERVAL),
        retry_interval: NumericField::coerce(record.get("retryInterval"))
            .or_default(DEFAULT_RETRY_INTERVAL),
        max_retries: NumericField::coerce(record.get("maxretries")).or_default(DEFAULT_MAX_RETRIES),
        description: record.text("description"),
        monitor_type,
        target,
        options: MonitorOptions::from_record(record),
    };

    NormalizedMonitor {
        request,
        tag_values: TAG_COLUMNS
            .iter()
            .filter_map(|column| record.text(column))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(cells: &[(&str, CellValue)]) -> MonitorRecord {
        cells.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_port_monitor_falls_back_to_url_for_hostname() {
        let row = record(&[
            ("name", text("db")),
            ("type", text("port")),
            ("hostname", text("")),
            ("url", text("10.0.0.5")),
            ("port", text("8080")),
        ]);
        let normalized = normalize(1, &row);
        assert_eq!(
            normalized.request.target,
            MonitorTarget::HostPort {
                hostname: Some("10.0.0.5".to_string()),
                port: Some(8080),
            }
        );
    }

    #[test]
    fn test_bad_port_is_unset() {
        let row = record(&[
            ("name", text("db")),
            ("type", text("tcp")),
            ("hostname", text("db.local")),
            ("port", text("notanumber")),
        ]);
        assert_eq!(NumericField::coerce(row.get("port")), NumericField::Unset);
        let normalized = normalize(1, &row);
        assert_eq!(
            normalized.request.target,
            MonitorTarget::HostPort {
                hostname: Some("db.local".to_string()),
                port: None,
            }
        );
    }

    #[test]
    fn test_empty_name_is_synthesized_from_row_index() {
        let row = record(&[("name", text("")), ("type", text("ping")), ("hostname", text("h"))]);
        assert_eq!(normalize(3, &row).request.name, "Unnamed-3");
        let no_column = record(&[("type", text("ping"))]);
        assert_eq!(normalize(7, &no_column).request.name, "Unnamed-7");
    }

    #[test]
    fn test_interval_defaults_and_unset() {
        let row = record(&[
            ("name", text("a")),
            ("type", text("http")),
            ("interval", CellValue::Integer(120)),
            ("retryInterval", text("soon")),
            ("maxretries", CellValue::Empty),
        ]);
        let request = normalize(1, &row).request;
        assert_eq!(request.interval, Some(120));
        assert_eq!(request.retry_interval, None);
        assert_eq!(request.max_retries, Some(DEFAULT_MAX_RETRIES));
    }

    #[test]
    fn test_zero_interval_counts_as_absent() {
        let row = record(&[("type", text("http")), ("interval", CellValue::Integer(0))]);
        assert_eq!(NumericField::coerce(row.get("interval")), NumericField::Absent);
        assert_eq!(normalize(1, &row).request.interval, Some(DEFAULT_INTERVAL));
    }

    #[test]
    fn test_float_cells_truncate() {
        assert_eq!(
            NumericField::coerce(&CellValue::Float(8080.0)),
            NumericField::Value(8080)
        );
        assert_eq!(NumericField::coerce(&text("80.5")), NumericField::Unset);
    }

    #[test]
    fn test_dns_defaults() {
        let row = record(&[("type", text("dns")), ("url", text("example.com"))]);
        assert_eq!(
            normalize(1, &row).request.target,
            MonitorTarget::Dns {
                hostname: Some("example.com".to_string()),
                resolve_server: "cloudflare".to_string(),
                resolve_type: "A".to_string(),
            }
        );
    }

    #[test]
    fn test_http_takes_url_only() {
        let row = record(&[
            ("type", text("https")),
            ("url", text("https://example.com")),
            ("hostname", text("ignored")),
            ("port", CellValue::Integer(443)),
        ]);
        assert_eq!(
            normalize(1, &row).request.target,
            MonitorTarget::Url {
                url: Some("https://example.com".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_type_keeps_base_fields_only() {
        let row = record(&[
            ("name", text("kw")),
            ("type", text("keyword")),
            ("url", text("https://example.com")),
        ]);
        let request = normalize(1, &row).request;
        assert_eq!(request.monitor_type, MonitorType::Other("keyword".to_string()));
        assert_eq!(request.target, MonitorTarget::None);
    }

    #[test]
    fn test_options_pass_through_when_present() {
        let row = record(&[
            ("type", text("http")),
            ("ignoreTls", CellValue::Bool(true)),
            ("maxredirects", CellValue::Integer(5)),
            ("expiryNotification", CellValue::Empty),
            ("owner", text("ops")),
        ]);
        let options = normalize(1, &row).request.options;
        assert_eq!(options.ignore_tls, Some(json!(true)));
        assert_eq!(options.max_redirects, Some(json!(5)));
        assert_eq!(options.expiry_notification, None);
        assert_eq!(options.weight_threshold, None);
        assert_eq!(options.entries().count(), 2);
    }

    #[test]
    fn test_tag_values_in_column_order() {
        let row = record(&[
            ("hostinfo", text("rack-1")),
            ("sysname", text("billing")),
            ("appname", text("")),
        ]);
        assert_eq!(normalize(1, &row).tag_values, vec!["billing", "rack-1"]);
    }

    #[test]
    fn test_missing_markers_from_csv_fall_back_to_defaults() {
        let table = crate::import::table::parse_table(
            b"name,type,url,interval,sysname\napi,http,http://a,NA,N/A\n",
        )
        .unwrap();
        let normalized = normalize(1, &table.records[0]);
        assert_eq!(normalized.request.interval, Some(DEFAULT_INTERVAL));
        assert!(normalized.tag_values.is_empty());
    }
}
