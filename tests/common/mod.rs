//! Minimal in-process HTTP stub used by the gateway tests: serves canned
//! responses in order (repeating the last one) and records every request.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Recorded {
    /// Request line plus headers, verbatim.
    pub head: String,
    pub body: String,
}

impl Recorded {
    pub fn line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    pub fn has_header(&self, needle: &str) -> bool {
        self.head
            .lines()
            .any(|l| l.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
    }
}

pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub async fn start(responses: Vec<String>) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));
        let hits = Arc::new(AtomicUsize::new(0));

        let reqs = requests.clone();
        let hit_count = hits.clone();
        tokio::spawn(async move {
            let responses = Arc::new(responses);
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let n = hit_count.fetch_add(1, Ordering::SeqCst);
                let responses = responses.clone();
                let reqs = reqs.clone();
                tokio::spawn(async move {
                    if let Some(recorded) = read_request(&mut stream).await {
                        reqs.lock().unwrap().push(recorded);
                    }
                    let idx = n.min(responses.len().saturating_sub(1));
                    if let Some(resp) = responses.get(idx) {
                        let _ = stream.write_all(resp.as_bytes()).await;
                    }
                    let _ = stream.shutdown().await;
                });
            }
        });

        StubServer { addr, requests, hits }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn request(&self, idx: usize) -> Recorded {
        self.requests.lock().unwrap()[idx].clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = find_blank_line(&buf) {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let want = content_length(&head);
            let body_start = pos + 4;
            while buf.len() - body_start < want {
                let n = stream.read(&mut tmp).await.ok()?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
            }
            let body = String::from_utf8_lossy(&buf[body_start..]).to_string();
            return Some(Recorded { head, body });
        }
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

pub fn response(status: u16, reason: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

pub fn ok_json(body: &str) -> String {
    response(200, "OK", body)
}

pub fn server_error() -> String {
    response(500, "Internal Server Error", r#"{"message":"boom"}"#)
}
