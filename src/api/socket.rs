//! Socket session manager.
//!
//! One websocket connection per selected workspace. `connect` tears down any
//! prior connection first; `emit` silently drops (with a warning) while
//! disconnected; server pushes fan out over a broadcast channel whose
//! receivers are the subscriptions, dropping a receiver unsubscribes it.
//!
//! There is no reconnect or backoff policy and no queueing of emits issued
//! while disconnected. Connection errors are logged and end the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::api::events::{
    EVENT_CHAT_JOIN, EVENT_CHAT_LEAVE, EVENT_MESSAGE_SEND, EVENT_PRESENCE_ACTIVITY, Frame,
    ServerEvent,
};
use crate::api::models::Attachment;
use crate::config::Config;
use crate::error::{Error, Result};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Connection {
    outgoing: mpsc::UnboundedSender<Frame>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub struct SocketSession {
    conn: Option<Connection>,
    workspace_id: Option<String>,
    events: broadcast::Sender<ServerEvent>,
}

impl SocketSession {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            conn: None,
            workspace_id: None,
            events,
        }
    }

    /// Open a connection scoped to `workspace_id`, tearing down any prior
    /// one. The token and workspace id ride along as query parameters.
    pub async fn connect(&mut self, config: &Config, token: &str, workspace_id: &str) -> Result<()> {
        if self.conn.is_some() {
            self.disconnect();
        }
        self.workspace_id = Some(workspace_id.to_string());

        let url = socket_url(config.socket_url(), token, workspace_id)?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Socket(e.to_string()))?;
        info!("socket connected for workspace {workspace_id}");

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Frame>();
        let connected = Arc::new(AtomicBool::new(true));

        let writer_connected = connected.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("dropping unserializable frame {}: {e}", frame.event);
                        continue;
                    }
                };
                if let Err(e) = sink.send(WsMessage::Text(text)).await {
                    error!("socket send failed: {e}");
                    writer_connected.store(false, Ordering::Relaxed);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_connected = connected.clone();
        let events = self.events.clone();
        let reader = tokio::spawn(async move {
            while let Some(next) = source.next().await {
                match next {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                        Ok(frame) => match ServerEvent::decode(frame) {
                            Ok(ServerEvent::Other { event, data }) => {
                                debug!("ignoring unknown socket event {event}");
                                let _ = events.send(ServerEvent::Other { event, data });
                            }
                            Ok(event) => {
                                let _ = events.send(event);
                            }
                            Err(e) => warn!("bad socket payload: {e}"),
                        },
                        Err(e) => warn!("unparseable socket frame: {e}"),
                    },
                    Ok(WsMessage::Close(_)) => {
                        info!("socket closed by server");
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary, nothing to do
                    Err(e) => {
                        error!("socket error: {e}");
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::Relaxed);
        });

        self.conn = Some(Connection {
            outgoing,
            connected,
            reader,
            writer,
        });
        Ok(())
    }

    /// Close the transport and stop both pump tasks. Subscriptions stay
    /// valid across reconnects; they simply see no events while down.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.connected.store(false, Ordering::Relaxed);
            conn.reader.abort();
            conn.writer.abort();
            info!("socket disconnected");
        }
        self.workspace_id = None;
    }

    pub fn is_connected(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|c| c.connected.load(Ordering::Relaxed))
    }

    /// Send a named event. Object payloads get the active workspace id
    /// merged in; non-object payloads pass through untouched. Emitting while
    /// disconnected drops the event with a warning.
    pub fn emit(&self, event: &str, payload: Value) {
        let Some(conn) = self.conn.as_ref().filter(|c| c.connected.load(Ordering::Relaxed))
        else {
            warn!("emit on disconnected socket, dropping {event}");
            return;
        };
        let data = match (payload, &self.workspace_id) {
            (Value::Object(mut map), Some(ws)) => {
                map.insert("workspaceId".to_string(), Value::String(ws.clone()));
                Value::Object(map)
            }
            (other, _) => other,
        };
        let frame = Frame {
            event: event.to_string(),
            data,
        };
        if conn.outgoing.send(frame).is_err() {
            warn!("socket writer gone, dropping {event}");
        }
    }

    /// Subscribe to decoded server pushes. Dropping the receiver is the
    /// unsubscribe; receivers that fall behind the channel capacity miss
    /// events, matching the fire-and-forget listener model upstream.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    // --- convenience emits used by the chat flows -------------------------

    pub fn join_chat(&self, chat_id: &str) {
        self.emit(EVENT_CHAT_JOIN, json!({ "chatId": chat_id }));
    }

    pub fn leave_chat(&self, chat_id: &str) {
        self.emit(EVENT_CHAT_LEAVE, json!({ "chatId": chat_id }));
    }

    /// Send a text message. The client message id is a coarse timestamp used
    /// by the backend for duplicate tracking.
    pub fn send_message(&self, chat_id: &str, content: &str) {
        self.emit(
            EVENT_MESSAGE_SEND,
            json!({
                "chatId": chat_id,
                "content": content,
                "clientMessageId": chrono::Utc::now().timestamp_millis().to_string(),
            }),
        );
    }

    /// Send an attachment-only message, after the upload flow produced the
    /// public URLs.
    pub fn send_attachments(&self, chat_id: &str, attachments: &[Attachment]) {
        self.emit(
            EVENT_MESSAGE_SEND,
            json!({
                "chatId": chat_id,
                "attachments": attachments,
            }),
        );
    }

    pub fn touch_presence(&self) {
        self.emit(EVENT_PRESENCE_ACTIVITY, json!({}));
    }
}

impl Default for SocketSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SocketSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Turn the configured endpoint into a ws/wss URL carrying the auth query.
fn socket_url(base: &str, token: &str, workspace_id: &str) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::Socket(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        _ => "wss",
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Socket(format!("cannot use scheme {scheme} on {base}")))?;
    url.query_pairs_mut()
        .append_pair("token", token)
        .append_pair("workspaceId", workspace_id);
    Ok(url)
}
