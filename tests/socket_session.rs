//! Socket session behavior against an in-process websocket server: auth
//! query, workspace-id injection on emit, push-to-cache flow, drop-on-
//! disconnect, and teardown-before-reconnect.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

use wms_client::api::events::{EVENT_MESSAGE_NEW, Frame};
use wms_client::{Cache, Config, ServerEvent, SocketSession};

const WAIT: Duration = Duration::from_secs(5);

struct ServerConn {
    uri: String,
    ws: WebSocketStream<TcpStream>,
}

/// Accepts websocket connections and hands each one to the test.
async fn ws_server() -> (Config, mpsc::Receiver<ServerConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws stub");
    let addr = listener.local_addr().expect("ws stub addr");
    let (tx, rx) = mpsc::channel(4);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let uri_slot = Arc::new(Mutex::new(String::new()));
            let slot = uri_slot.clone();
            let callback = move |req: &Request, resp: Response| {
                *slot.lock().unwrap() = req.uri().to_string();
                Ok(resp)
            };
            match tokio_tungstenite::accept_hdr_async(stream, callback).await {
                Ok(ws) => {
                    let uri = uri_slot.lock().unwrap().clone();
                    if tx.send(ServerConn { uri, ws }).await.is_err() {
                        break;
                    }
                }
                Err(_) => continue,
            }
        }
    });

    let config = Config {
        base_url: format!("http://{addr}"),
        socket_url: None,
        timeout_secs: 5,
        page_size: 30,
    };
    (config, rx)
}

async fn next_frame(conn: &mut ServerConn) -> Frame {
    loop {
        let msg = timeout(WAIT, conn.ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).expect("frame json");
        }
    }
}

#[tokio::test]
async fn connect_carries_auth_and_emit_merges_workspace_id() {
    let (config, mut conns) = ws_server().await;
    let mut session = SocketSession::new();
    session.connect(&config, "t1", "w1").await.unwrap();
    assert!(session.is_connected());

    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();
    assert!(conn.uri.contains("token=t1"), "{}", conn.uri);
    assert!(conn.uri.contains("workspaceId=w1"), "{}", conn.uri);

    session.emit("chat:join", json!({"chatId": "c1"}));
    let frame = next_frame(&mut conn).await;
    assert_eq!(frame.event, "chat:join");
    assert_eq!(frame.data, json!({"chatId": "c1", "workspaceId": "w1"}));
}

#[tokio::test]
async fn convenience_emits_carry_their_payloads() {
    let (config, mut conns) = ws_server().await;
    let mut session = SocketSession::new();
    session.connect(&config, "t1", "w1").await.unwrap();
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();

    session.join_chat("c1");
    session.send_message("c1", "hello there");
    session.leave_chat("c1");

    let join = next_frame(&mut conn).await;
    assert_eq!(join.event, "chat:join");

    let send = next_frame(&mut conn).await;
    assert_eq!(send.event, "chat:message:send");
    assert_eq!(send.data["content"], "hello there");
    assert_eq!(send.data["workspaceId"], "w1");
    assert!(send.data["clientMessageId"].is_string());

    let leave = next_frame(&mut conn).await;
    assert_eq!(leave.event, "chat:leave");
}

#[tokio::test]
async fn server_push_flows_into_the_cache() {
    let (config, mut conns) = ws_server().await;
    let mut session = SocketSession::new();
    let mut pushes = session.subscribe();
    session.connect(&config, "t1", "w1").await.unwrap();
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();

    let frame = Frame {
        event: EVENT_MESSAGE_NEW.into(),
        data: json!({
            "id": "m1",
            "chatId": "c1",
            "senderId": "u2",
            "content": "ping",
            "createdAt": "2026-02-01T12:00:00Z",
        }),
    };
    conn.ws
        .send(WsMessage::Text(serde_json::to_string(&frame).unwrap()))
        .await
        .unwrap();

    let event = timeout(WAIT, pushes.recv()).await.unwrap().unwrap();
    let mut cache = Cache::new();
    cache.apply_event(&event);

    match event {
        ServerEvent::MessageNew(ref m) => assert_eq!(m.id, "m1"),
        ref other => panic!("wrong event: {other:?}"),
    }
    assert_eq!(cache.messages("c1").len(), 1);
    assert_eq!(cache.messages("c1")[0].content.as_deref(), Some("ping"));
}

#[tokio::test]
async fn emit_after_disconnect_is_dropped_on_the_floor() {
    let (config, mut conns) = ws_server().await;
    let mut session = SocketSession::new();
    session.connect(&config, "t1", "w1").await.unwrap();
    let mut conn = timeout(WAIT, conns.recv()).await.unwrap().unwrap();

    session.disconnect();
    assert!(!session.is_connected());
    session.emit("chat:join", json!({"chatId": "c1"}));

    // The server sees the stream end without ever receiving a frame.
    let end = timeout(WAIT, async {
        loop {
            match conn.ws.next().await {
                Some(Ok(WsMessage::Text(_))) => panic!("frame leaked after disconnect"),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => break,
            }
        }
    })
    .await;
    assert!(end.is_ok(), "server never observed the close");
}

#[tokio::test]
async fn reconnect_tears_down_the_previous_connection() {
    let (config_a, mut conns_a) = ws_server().await;
    let (config_b, mut conns_b) = ws_server().await;

    let mut session = SocketSession::new();
    session.connect(&config_a, "t1", "w1").await.unwrap();
    let mut conn_a = timeout(WAIT, conns_a.recv()).await.unwrap().unwrap();

    session.connect(&config_b, "t1", "w2").await.unwrap();
    let mut conn_b = timeout(WAIT, conns_b.recv()).await.unwrap().unwrap();

    // The emit reaches only the new connection, tagged with the new workspace.
    session.emit("chat:join", json!({"chatId": "c1"}));
    let frame = next_frame(&mut conn_b).await;
    assert_eq!(frame.data["workspaceId"], "w2");

    // The old connection is gone.
    let end = timeout(WAIT, async {
        loop {
            match conn_a.ws.next().await {
                Some(Ok(WsMessage::Text(_))) => panic!("frame leaked to stale connection"),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => break,
            }
        }
    })
    .await;
    assert!(end.is_ok(), "old server never observed the teardown");
}
