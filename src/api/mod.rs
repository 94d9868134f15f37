pub mod client;
pub mod endpoints;
pub mod events;
pub mod models;
pub mod socket;
pub mod upload;

pub use client::{ApiClient, RetryPolicy};
pub use events::ServerEvent;
pub use socket::SocketSession;
pub use upload::{UploadedFile, upload_file};
