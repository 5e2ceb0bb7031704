//! SQLite-backed record store. Record payloads are health data and are kept AES-GCM
//! encrypted at rest; only the user id and timestamp are stored in clear.
//! Key derived from a deployment secret (SHA-256).

use super::{LogRecord, RecordStore, StoreError, UserLogSet};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use uuid::Uuid;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out.copy_from_slice(&h.as_ref()[..KEY_LEN]);
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, StoreError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StoreError::Crypto)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|_| StoreError::Crypto)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, StoreError> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| StoreError::Decode(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(StoreError::Decode("payload too short".into()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StoreError::Crypto)?;
    cipher.decrypt(nonce.into(), ct).map_err(|_| StoreError::Crypto)
}

pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl SqliteRecordStore {
    /// Open or create the DB at `path`. Key is derived from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS log_records (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                logged_at INTEGER,
                payload_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_log_records_user ON log_records(user_id);
            CREATE INDEX IF NOT EXISTS idx_log_records_logged_at ON log_records(logged_at);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    /// Register a user with no records. Idempotent.
    pub fn insert_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
            params![user_id, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Append a record for `user_id` (registering the user if needed); returns the record id.
    pub fn insert_record(&self, user_id: &str, record: &LogRecord) -> Result<String, StoreError> {
        self.insert_user(user_id)?;
        let id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(&record.fields)?;
        let enc = encrypt(&self.key, payload.as_bytes())?;
        self.conn.lock().execute(
            "INSERT INTO log_records (id, user_id, logged_at, payload_enc) VALUES (?1, ?2, ?3, ?4)",
            params![id, user_id, record.logged_at.map(|t| t.timestamp_millis()), enc],
        )?;
        Ok(id)
    }

    /// Retention: delete records logged before `ts`. Untimestamped records are kept.
    pub fn prune_before(&self, ts: DateTime<Utc>) -> Result<u64, StoreError> {
        let n = self.conn.lock().execute(
            "DELETE FROM log_records WHERE logged_at IS NOT NULL AND logged_at < ?1",
            params![ts.timestamp_millis()],
        )?;
        Ok(n as u64)
    }
}

impl RecordStore for SqliteRecordStore {
    fn fetch(&self, user_id: &str) -> Result<Option<UserLogSet>, StoreError> {
        let conn = self.conn.lock();
        let known: Option<i64> = conn
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
            .optional()?;
        if known.is_none() {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            "SELECT logged_at, payload_enc FROM log_records WHERE user_id = ?1 ORDER BY rowid",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let logged_at: Option<i64> = row.get(0)?;
            let enc: String = row.get(1)?;
            let plain = decrypt(&self.key, &enc)?;
            let fields: Map<String, Value> = serde_json::from_slice(&plain)?;
            records.push(LogRecord {
                logged_at: logged_at.and_then(DateTime::<Utc>::from_timestamp_millis),
                fields,
            });
        }
        Ok(Some(UserLogSet::new(user_id, records)))
    }
}
