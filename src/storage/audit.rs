//! SQLite audit log. The full record is stored AES-256-GCM encrypted; only the
//! request id, user id, timestamp and overall score stay queryable in clear.

use super::{AuditError, AuditRecord, AuditSink};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::Mutex;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(secret: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(digest::digest(&digest::SHA256, secret).as_ref());
    key
}

fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, AuditError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| AuditError::Crypto(e.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|e| AuditError::Crypto(e.to_string()))?;
    let mut out = nonce.to_vec();
    out.extend(sealed);
    Ok(BASE64.encode(out))
}

fn open_sealed(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, AuditError> {
    let raw = BASE64.decode(encoded).map_err(|e| AuditError::Crypto(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(AuditError::Crypto("payload too short".into()));
    }
    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| AuditError::Crypto(e.to_string()))?;
    cipher
        .decrypt(nonce.into(), sealed)
        .map_err(|e| AuditError::Crypto(e.to_string()))
}

pub struct AuditStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AuditStore {
    /// Open or create the database at `path`, keyed from `secret`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, AuditError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                request_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                overall INTEGER NOT NULL,
                cache_hit INTEGER NOT NULL,
                record_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_ts ON audit_log(ts);
            CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    pub fn insert(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let json = serde_json::to_vec(record)?;
        let enc = seal(&self.key, &json)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO audit_log (request_id, user_id, ts, overall, cache_hit, record_enc) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.request_id,
                record.user_id,
                record.timestamp,
                record.scores.overall.value(),
                record.cache_hit,
                enc
            ],
        )?;
        Ok(())
    }

    /// Decrypt one record by request id.
    pub fn get(&self, request_id: &str) -> Result<Option<AuditRecord>, AuditError> {
        let enc: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT record_enc FROM audit_log WHERE request_id = ?1",
                params![request_id],
                |row| row.get(0),
            )
            .optional()?;
        match enc {
            Some(enc) => {
                let plain = open_sealed(&self.key, &enc)?;
                Ok(Some(serde_json::from_slice(&plain)?))
            }
            None => Ok(None),
        }
    }

    /// Request ids for a user, newest first.
    pub fn request_ids_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<String>, AuditError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT request_id FROM audit_log WHERE user_id = ?1 ORDER BY ts DESC LIMIT ?2")?;
        let ids = stmt
            .query_map(params![user_id, limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn count(&self) -> Result<u64, AuditError> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Retention: delete records older than `ts` (epoch millis).
    pub fn prune_before(&self, ts: i64) -> Result<u64, AuditError> {
        let n = self.conn.lock().execute("DELETE FROM audit_log WHERE ts < ?1", params![ts])?;
        Ok(n as u64)
    }
}

impl AuditSink for AuditStore {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.insert(record)
    }

    fn ping(&self) -> Result<(), AuditError> {
        self.conn.lock().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}
