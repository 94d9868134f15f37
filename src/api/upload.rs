//! Two-phase object-storage upload.
//!
//! Phase one asks the backend for a presigned target through the gateway;
//! phase two PUTs the raw bytes straight at that target, bypassing the
//! gateway so no bearer header leaks to the storage provider. The content
//! type must exactly match what phase one negotiated. No retry, no
//! resumability, no chunking.

use log::{debug, warn};

use crate::api::client::ApiClient;
use crate::error::{Error, Result};

/// Outcome of a successful upload, ready to attach to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Public URL the attachment is served from.
    pub public_url: String,
    /// Object-storage key.
    pub key: Option<String>,
}

pub async fn upload_file(
    api: &ApiClient,
    filename: &str,
    file_type: &str,
    bytes: Vec<u8>,
) -> Result<UploadedFile> {
    let file_type = if file_type.is_empty() {
        "application/octet-stream"
    } else {
        file_type
    };

    let presigned = api.presigned_url(filename, file_type).await?;
    debug!("presigned target issued for {filename}");

    let resp = api
        .http()
        .put(&presigned.url)
        .header("Content-Type", file_type)
        .body(bytes)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        warn!("storage PUT for {filename} failed with {status}");
        // Storage providers return XML bodies here; no detail is carried.
        return Err(Error::Http {
            status: status.as_u16(),
            message: format!("upload failed: {status}"),
        });
    }

    let public_url = presigned
        .public_url
        .ok_or_else(|| Error::Decode("presigned response missing publicUrl".into()))?;
    Ok(UploadedFile {
        public_url,
        key: presigned.filename,
    })
}
