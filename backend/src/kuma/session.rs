use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::models::{monitor_payload, monitors_from_list, Monitor, Tag};
use super::packet::{self, Packet};
use super::{Connector, Credentials, KumaError, MonitorApi};
use crate::import::normalizer::MonitorCreateRequest;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;
/// Waiting calls by ack id. `None` once the reader has stopped, so later
/// calls fail fast instead of waiting for an ack that cannot arrive.
type PendingAcks = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Vec<Value>>>>>>;

/// Opens Socket.IO sessions against an Uptime Kuma server.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl SocketIoConnector {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        install_crypto_provider();
        Self {
            connect_timeout,
            request_timeout,
        }
    }
}

#[async_trait]
impl Connector for SocketIoConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MonitorApi>, KumaError> {
        let attempt = async {
            let mut session =
                KumaSession::open(&credentials.kuma_url, self.request_timeout).await?;
            if let Err(e) = session
                .login(&credentials.username, &credentials.password)
                .await
            {
                session.disconnect().await;
                return Err(e);
            }
            Ok(session)
        };

        let session = tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| {
                KumaError::Connection(format!(
                    "no answer from {} within {}s",
                    credentials.kuma_url,
                    self.connect_timeout.as_secs()
                ))
            })??;
        Ok(Box::new(session))
    }
}

/// `wss://` connections need a process-wide rustls provider.
fn install_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Another thread may win the race; either provider will do.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

/// Maps the operator-facing server URL to the Socket.IO websocket endpoint.
pub fn socket_url(kuma_url: &str) -> Result<String, KumaError> {
    let trimmed = kuma_url.trim().trim_end_matches('/');
    let (scheme, rest) = match trimmed.split_once("://") {
        Some(("https", rest)) | Some(("wss", rest)) => ("wss", rest),
        Some(("http", rest)) | Some(("ws", rest)) => ("ws", rest),
        Some((other, _)) => {
            return Err(KumaError::Connection(format!(
                "unsupported URL scheme '{other}'"
            )))
        }
        None => ("ws", trimmed),
    };
    if rest.is_empty() {
        return Err(KumaError::Connection(format!("invalid server URL '{kuma_url}'")));
    }
    Ok(format!("{scheme}://{rest}/socket.io/?EIO=4&transport=websocket"))
}

enum Outgoing {
    Frame(String),
    Close,
}

/// A logged-in Socket.IO session.
///
/// A reader task answers engine pings, routes acknowledgements to the
/// waiting call and keeps the latest `monitorList` push. A writer task owns
/// the sink so both the session and the reader can send frames.
pub struct KumaSession {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pending: PendingAcks,
    monitors: watch::Receiver<Option<Vec<Monitor>>>,
    next_ack_id: u64,
    request_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl KumaSession {
    pub async fn open(kuma_url: &str, request_timeout: Duration) -> Result<Self, KumaError> {
        let url = socket_url(kuma_url)?;
        info!(url = %url, "Connecting to monitoring server");
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| KumaError::Connection(e.to_string()))?;
        let (mut sink, mut source) = ws_stream.split();

        match next_packet(&mut source).await? {
            Packet::Open(_) => {}
            other => {
                return Err(KumaError::Protocol(format!(
                    "expected engine handshake, got {other:?}"
                )))
            }
        }
        send_frame(&mut sink, packet::encode(&Packet::Connect(None))).await?;

        loop {
            match next_packet(&mut source).await? {
                Packet::Connect(_) => break,
                Packet::ConnectError(data) => {
                    return Err(KumaError::Connection(format!("namespace refused: {data}")))
                }
                Packet::Ping => send_frame(&mut sink, packet::encode(&Packet::Pong)).await?,
                other => debug!(packet = ?other, "Ignoring packet before namespace connect"),
            }
        }
        debug!("Socket.IO namespace connected");

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let pending: PendingAcks = Arc::new(Mutex::new(Some(HashMap::new())));
        let (monitors_tx, monitors_rx) = watch::channel(None);

        let writer = tokio::spawn(write_loop(sink, outgoing_rx));
        let reader = tokio::spawn(read_loop(
            source,
            outgoing_tx.clone(),
            pending.clone(),
            monitors_tx,
        ));

        Ok(Self {
            outgoing: outgoing_tx,
            pending,
            monitors: monitors_rx,
            next_ack_id: 0,
            request_timeout,
            reader,
            writer,
        })
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), KumaError> {
        let response = self
            .call(
                "login",
                vec![json!({ "username": username, "password": password, "token": "" })],
            )
            .await?;
        if is_ok(&response) {
            info!(username = %username, "Logged in to monitoring server");
            return Ok(());
        }
        if response.get("tokenRequired").and_then(Value::as_bool) == Some(true) {
            return Err(KumaError::Auth(
                "two-factor authentication token required".to_string(),
            ));
        }
        Err(KumaError::Auth(response_message(&response)))
    }

    /// Emits `event` and waits for its acknowledgement, returning the first
    /// acknowledgement argument.
    async fn call(&mut self, event: &str, args: Vec<Value>) -> Result<Value, KumaError> {
        let ack_id = self.next_ack_id;
        self.next_ack_id += 1;

        let (tx, rx) = oneshot::channel();
        match self.pending.lock().await.as_mut() {
            Some(pending) => pending.insert(ack_id, tx),
            None => return Err(KumaError::Disconnected),
        };

        let frame = packet::encode(&Packet::Event {
            ack_id: Some(ack_id),
            name: event.to_string(),
            args,
        });
        debug!(event = %event, ack_id, "Emitting event");
        if self.outgoing.send(Outgoing::Frame(frame)).is_err() {
            self.forget(ack_id).await;
            return Err(KumaError::Disconnected);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(mut ack_args)) => Ok(if ack_args.is_empty() {
                Value::Null
            } else {
                ack_args.swap_remove(0)
            }),
            Ok(Err(_)) => Err(KumaError::Disconnected),
            Err(_) => {
                self.forget(ack_id).await;
                Err(KumaError::Timeout(event.to_string()))
            }
        }
    }

    async fn forget(&self, ack_id: u64) {
        if let Some(pending) = self.pending.lock().await.as_mut() {
            pending.remove(&ack_id);
        }
    }

    async fn call_ok(&mut self, event: &str, args: Vec<Value>) -> Result<Value, KumaError> {
        let response = self.call(event, args).await?;
        if is_ok(&response) {
            Ok(response)
        } else {
            Err(KumaError::Rejected(response_message(&response)))
        }
    }
}

#[async_trait]
impl MonitorApi for KumaSession {
    async fn get_monitors(&mut self) -> Result<Vec<Monitor>, KumaError> {
        let timeout = self.request_timeout;
        let wait = self.monitors.wait_for(|list| list.is_some());
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(list)) => Ok(list.clone().unwrap_or_default()),
            Ok(Err(_)) => Err(KumaError::Disconnected),
            Err(_) => Err(KumaError::Timeout("monitorList".to_string())),
        }
    }

    async fn delete_monitor(&mut self, monitor_id: i64) -> Result<(), KumaError> {
        self.call_ok("deleteMonitor", vec![json!(monitor_id)]).await?;
        Ok(())
    }

    async fn add_monitor(&mut self, request: &MonitorCreateRequest) -> Result<i64, KumaError> {
        let response = self.call_ok("add", vec![monitor_payload(request)]).await?;
        response
            .get("monitorID")
            .or_else(|| response.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                KumaError::Protocol(format!("no monitor id in response: {response}"))
            })
    }

    async fn get_tags(&mut self) -> Result<Vec<Tag>, KumaError> {
        let response = self.call_ok("getTags", Vec::new()).await?;
        let tags = response.get("tags").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(tags).map_err(|e| KumaError::Protocol(format!("bad tag list: {e}")))
    }

    async fn add_tag(&mut self, name: &str, color: &str) -> Result<Tag, KumaError> {
        let response = self
            .call_ok(
                "addTag",
                vec![json!({ "name": name, "color": color, "new": true })],
            )
            .await?;
        let tag = response
            .get("tag")
            .cloned()
            .ok_or_else(|| KumaError::Protocol(format!("no tag in response: {response}")))?;
        serde_json::from_value(tag).map_err(|e| KumaError::Protocol(format!("bad tag: {e}")))
    }

    async fn add_monitor_tag(
        &mut self,
        monitor_id: i64,
        tag_id: i64,
        value: &str,
    ) -> Result<(), KumaError> {
        self.call_ok(
            "addMonitorTag",
            vec![json!(tag_id), json!(monitor_id), json!(value)],
        )
        .await?;
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.outgoing.send(Outgoing::Close).is_ok() {
            let writer = &mut self.writer;
            if tokio::time::timeout(Duration::from_secs(2), writer).await.is_err() {
                debug!("Writer did not finish closing in time");
            }
        }
        self.reader.abort();
        self.writer.abort();
        debug!("Disconnected from monitoring server");
    }
}

impl Drop for KumaSession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn is_ok(response: &Value) -> bool {
    response.get("ok").and_then(Value::as_bool) == Some(true)
}

fn response_message(response: &Value) -> String {
    response
        .get("msg")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| response.to_string())
}

async fn send_frame(sink: &mut WsSink, frame: String) -> Result<(), KumaError> {
    sink.send(WsMessage::Text(frame.into())).await?;
    Ok(())
}

/// Reads text frames until one decodes into a packet. Used only during the
/// handshake, before the reader task takes over the stream.
async fn next_packet(source: &mut WsSource) -> Result<Packet, KumaError> {
    while let Some(frame) = source.next().await {
        match frame? {
            WsMessage::Text(text) => return packet::decode(text.as_str()),
            WsMessage::Close(_) => return Err(KumaError::Disconnected),
            _ => continue,
        }
    }
    Err(KumaError::Disconnected)
}

async fn write_loop(mut sink: WsSink, mut outgoing: mpsc::UnboundedReceiver<Outgoing>) {
    while let Some(item) = outgoing.recv().await {
        match item {
            Outgoing::Frame(frame) => {
                if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                    warn!(error = %e, "Failed to send frame to monitoring server");
                    break;
                }
            }
            Outgoing::Close => {
                let _ = sink.send(WsMessage::Text(packet::encode(&Packet::Disconnect).into())).await;
                let _ = sink.close().await;
                break;
            }
        }
    }
}

async fn read_loop(
    mut source: WsSource,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pending: PendingAcks,
    monitors: watch::Sender<Option<Vec<Monitor>>>,
) {
    while let Some(frame) = source.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "Monitoring server connection error");
                break;
            }
        };

        match packet::decode(text.as_str()) {
            Ok(Packet::Ping) => {
                let _ = outgoing.send(Outgoing::Frame(packet::encode(&Packet::Pong)));
            }
            Ok(Packet::Ack { ack_id, args }) => {
                let waiter = pending.lock().await.as_mut().and_then(|p| p.remove(&ack_id));
                if let Some(waiter) = waiter {
                    let _ = waiter.send(args);
                } else {
                    debug!(ack_id, "Acknowledgement for an abandoned call");
                }
            }
            Ok(Packet::Event { name, args, .. }) if name == "monitorList" => {
                match args.first().map(monitors_from_list) {
                    Some(Ok(list)) => {
                        debug!(count = list.len(), "Received monitor list");
                        monitors.send_replace(Some(list));
                    }
                    Some(Err(e)) => warn!(error = %e, "Could not parse monitor list"),
                    None => {}
                }
            }
            Ok(Packet::Event { name, .. }) => debug!(event = %name, "Ignoring server event"),
            Ok(Packet::Close) | Ok(Packet::Disconnect) => break,
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Undecodable frame from monitoring server"),
        }
    }

    // Dropping the senders wakes every waiting call with `Disconnected`.
    pending.lock().await.take();
    debug!("Monitoring server reader finished");
}
