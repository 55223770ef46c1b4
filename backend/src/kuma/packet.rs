//! Engine.IO v4 / Socket.IO v5 text framing, default namespace only.

use serde_json::Value;

use super::KumaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake, carries `sid`, `pingInterval`, ...
    Open(Value),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    ConnectError(Value),
    Event {
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        ack_id: u64,
        args: Vec<Value>,
    },
}

pub fn encode(packet: &Packet) -> String {
    match packet {
        Packet::Open(data) => format!("0{data}"),
        Packet::Close => "1".to_string(),
        Packet::Ping => "2".to_string(),
        Packet::Pong => "3".to_string(),
        Packet::Noop => "6".to_string(),
        Packet::Connect(None) => "40".to_string(),
        Packet::Connect(Some(data)) => format!("40{data}"),
        Packet::Disconnect => "41".to_string(),
        Packet::ConnectError(data) => format!("44{data}"),
        Packet::Event { ack_id, name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            let id = ack_id.map(|id| id.to_string()).unwrap_or_default();
            format!("42{id}{}", Value::Array(items))
        }
        Packet::Ack { ack_id, args } => format!("43{ack_id}{}", Value::Array(args.clone())),
    }
}

pub fn decode(text: &str) -> Result<Packet, KumaError> {
    let mut chars = text.chars();
    let engine_type = chars
        .next()
        .ok_or_else(|| KumaError::Protocol("empty frame".to_string()))?;
    let rest = chars.as_str();

    match engine_type {
        '0' => Ok(Packet::Open(parse_json(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '6' => Ok(Packet::Noop),
        '4' => decode_socket(rest),
        other => Err(KumaError::Protocol(format!(
            "unknown engine packet type '{other}'"
        ))),
    }
}

fn decode_socket(text: &str) -> Result<Packet, KumaError> {
    let mut chars = text.chars();
    let socket_type = chars
        .next()
        .ok_or_else(|| KumaError::Protocol("empty socket packet".to_string()))?;
    let mut rest = chars.as_str();

    // Namespaced packets look like `42/admin,["event"]`.
    if rest.starts_with('/') {
        rest = rest.split_once(',').map(|(_, tail)| tail).unwrap_or("");
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let (id_part, body) = rest.split_at(digits);
    let ack_id = if id_part.is_empty() {
        None
    } else {
        Some(
            id_part
                .parse::<u64>()
                .map_err(|e| KumaError::Protocol(format!("bad ack id '{id_part}': {e}")))?,
        )
    };

    match socket_type {
        '0' => Ok(Packet::Connect(if body.is_empty() {
            None
        } else {
            Some(parse_json(body)?)
        })),
        '1' => Ok(Packet::Disconnect),
        '4' => Ok(Packet::ConnectError(if body.is_empty() {
            Value::Null
        } else {
            parse_json(body)?
        })),
        '2' => {
            let mut items = parse_array(body)?;
            if items.is_empty() {
                return Err(KumaError::Protocol("event without a name".to_string()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(KumaError::Protocol(format!(
                        "event name is not a string: {other}"
                    )))
                }
            };
            Ok(Packet::Event {
                ack_id,
                name,
                args: items,
            })
        }
        '3' => {
            let ack_id = ack_id
                .ok_or_else(|| KumaError::Protocol("ack without an id".to_string()))?;
            Ok(Packet::Ack {
                ack_id,
                args: parse_array(body)?,
            })
        }
        other => Err(KumaError::Protocol(format!(
            "unsupported socket packet type '{other}'"
        ))),
    }
}

fn parse_json(text: &str) -> Result<Value, KumaError> {
    serde_json::from_str(text).map_err(|e| KumaError::Protocol(format!("invalid JSON payload: {e}")))
}

fn parse_array(text: &str) -> Result<Vec<Value>, KumaError> {
    match parse_json(text)? {
        Value::Array(items) => Ok(items),
        other => Err(KumaError::Protocol(format!("expected an array, got {other}"))),
    }
}
