//! Encrypted persistence of the session slice.
//!
//! Only [`SessionState`] survives restarts; the chat cache is deliberately
//! not written anywhere, it would be stale on the next launch. The state is
//! serialized to JSON, sealed with XChaCha20-Poly1305 (24-byte nonce
//! prepended to the ciphertext), and kept in a one-row key-value table in
//! the platform data directory. The 32-byte key is derived from a
//! caller-supplied device secret with a BLAKE3 KDF.

use std::fs;
use std::path::{Path, PathBuf};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use directories::ProjectDirs;
use rand::RngCore;
use rusqlite::{Connection, OptionalExtension, params};

use crate::context::SessionState;
use crate::error::{Error, Result};

const NONCE_SIZE: usize = 24;
const KDF_CONTEXT: &str = "wms-client 2026 session store v1";
const SESSION_KEY: &str = "session";

/// Derive the sealing key from a device secret (e.g. an OS-keystore entry).
pub fn derive_store_key(device_secret: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT);
    hasher.update(device_secret);
    let hash = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&hash.as_bytes()[..32]);
    key
}

fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| Error::Crypto)?;
    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn unseal(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_SIZE {
        return Err(Error::Crypto);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| Error::Crypto)
}

/// Handle over the encrypted session database.
pub struct SessionStore {
    conn: Connection,
    key: [u8; 32],
}

impl SessionStore {
    /// Open (or create) the default store in the platform data dir.
    pub fn open(key: [u8; 32]) -> Result<Self> {
        let proj = ProjectDirs::from("ai", "wms365", "wms-client").ok_or(Error::NoAppDir)?;
        let path = proj.data_dir().join("session.sqlite");
        Self::open_at(&path, key)
    }

    /// Open at an explicit path. Used by tests and custom layouts.
    pub fn open_at(path: &Path, key: [u8; 32]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS kv (
                k TEXT PRIMARY KEY,
                v BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn, key })
    }

    /// Persist the session slice, replacing any prior row.
    pub fn save(&self, session: &SessionState) -> Result<()> {
        let plaintext = serde_json::to_vec(session)?;
        let blob = seal(&self.key, &plaintext)?;
        self.conn.execute(
            r#"
            INSERT INTO kv (k, v, updated_at)
            VALUES (?1, ?2, unixepoch())
            ON CONFLICT(k) DO UPDATE SET
                v=excluded.v,
                updated_at=excluded.updated_at
            "#,
            params![SESSION_KEY, blob],
        )?;
        Ok(())
    }

    /// Load the persisted session, `Ok(None)` when nothing was saved yet.
    /// A wrong key or a tampered blob is a crypto error.
    pub fn load(&self) -> Result<Option<SessionState>> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT v FROM kv WHERE k = ?1",
                params![SESSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let Some(blob) = blob else {
            return Ok(None);
        };
        let plaintext = unseal(&self.key, &blob)?;
        let session = serde_json::from_slice(&plaintext)?;
        Ok(Some(session))
    }

    /// Drop the persisted session (logout).
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE k = ?1", params![SESSION_KEY])?;
        Ok(())
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::User;

    fn sample_session() -> SessionState {
        SessionState {
            user: Some(User {
                id: "u1".into(),
                name: Some("Ada".into()),
                username: None,
                avatar: None,
                status: None,
                last_seen: None,
            }),
            token: Some("t1".into()),
            first_launch: false,
            selected_workspace: Some("w1".into()),
        }
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sqlite");
        let key = derive_store_key(b"device-secret");

        let store = SessionStore::open_at(&path, key).unwrap();
        assert!(store.load().unwrap().is_none());

        let session = sample_session();
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session.clone()));

        // Saving again overwrites rather than accumulating rows.
        let mut changed = session;
        changed.selected_workspace = Some("w2".into());
        store.save(&changed).unwrap();
        assert_eq!(
            store.load().unwrap().unwrap().selected_workspace.as_deref(),
            Some("w2")
        );
    }

    #[test]
    fn wrong_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sqlite");

        let store = SessionStore::open_at(&path, derive_store_key(b"right")).unwrap();
        store.save(&sample_session()).unwrap();
        drop(store);

        let store = SessionStore::open_at(&path, derive_store_key(b"wrong")).unwrap();
        assert!(matches!(store.load(), Err(Error::Crypto)));
    }

    #[test]
    fn clear_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sqlite");
        let store = SessionStore::open_at(&path, derive_store_key(b"s")).unwrap();
        store.save(&sample_session()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn kdf_is_deterministic_and_separated() {
        assert_eq!(derive_store_key(b"a"), derive_store_key(b"a"));
        assert_ne!(derive_store_key(b"a"), derive_store_key(b"b"));
    }
}
