//! Headless client library for the WMS workspace chat backend.
//!
//! The host application (mobile or desktop shell) owns the screens and the
//! runtime; this crate owns everything under them:
//!
//! - [`api::ApiClient`]: REST gateway with an offline precheck, bearer
//!   injection from the session, idempotent-only retry with exponential
//!   backoff, and normalized error messages;
//! - [`api::SocketSession`]: one realtime connection per workspace, emit
//!   with workspace-id injection, typed server pushes over broadcast
//!   subscriptions;
//! - [`cache::Cache`]: normalized chat summaries, per-chat message lists,
//!   and the presence map, fed by both of the above;
//! - [`api::upload_file`]: presigned two-phase object-storage upload;
//! - [`storage::SessionStore`]: encrypted persistence of the session slice
//!   (and only that slice) across restarts.
//!
//! A typical hydrate-then-listen flow:
//!
//! ```no_run
//! use wms_client::{ApiClient, Cache, Config, Context, ServerEvent, SocketSession};
//!
//! # async fn run() -> wms_client::Result<()> {
//! let ctx = Context::new();
//! let api = ApiClient::new(Config::load(), ctx.clone())?;
//! api.login("ada@example.test", "hunter2").await?;
//!
//! let mut cache = Cache::new();
//! cache.set_chats(api.chats("w1").await?);
//!
//! let mut socket = SocketSession::new();
//! let token = ctx.token().ok_or(wms_client::Error::MissingToken)?;
//! socket.connect(api.config(), &token, "w1").await?;
//! socket.join_chat("c1");
//!
//! let mut pushes = socket.subscribe();
//! while let Ok(event) = pushes.recv().await {
//!     cache.apply_event(&event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod storage;

pub use api::{ApiClient, RetryPolicy, ServerEvent, SocketSession, UploadedFile, upload_file};
pub use cache::Cache;
pub use config::Config;
pub use context::{Context, SessionState};
pub use error::{Error, Result};
pub use storage::{SessionStore, derive_store_key};
