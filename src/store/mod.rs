//! Concurrent file-backed key store.
//!
//! Each key lives in a 32-byte `<name>.key` file under the store directory;
//! `keynum` holds the highest allocated id as 12 modhex characters. A
//! process-wide map of per-key async mutexes serializes the
//! read-verify-write cycle for a given key while distinct keys proceed in
//! parallel. The same store mutex that guards the map serializes key
//! allocation.

use crate::otp::{bytes, modhex, OtpError, TokenRecord, CODE_LEN, KEY_NAME_LEN, RECORD_LEN};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom},
    sync::Mutex,
};

mod error;

pub use error::StoreError;

/// Name of the allocation counter file inside the store directory.
pub const KEY_NUM_FILE: &str = "keynum";

/// A freshly allocated key: its public name and the full record, secret
/// included. The record is handed to the caller exactly once.
#[derive(Debug)]
pub struct NewKey {
    pub name: String,
    pub record: TokenRecord,
}

/// Directory of key files with per-key mutual exclusion.
#[derive(Debug)]
pub struct KeyStore {
    dir: PathBuf,
    // Lock entries are created on first touch and reused for the life of the
    // process; growth is bounded by the number of distinct keys seen.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Verify a submitted token against its key file and persist the state
    /// the token carries. Returns the accepted counter value.
    ///
    /// The per-key lock is held across the whole read-verify-write cycle, so
    /// concurrent submissions against one key are strictly serialized. The
    /// store mutex is only held for the existence check and lock lookup,
    /// never while waiting on a per-key lock.
    ///
    /// # Errors
    /// See [`StoreError`]; validation failures carry the [`OtpError`] detail.
    pub async fn verify(&self, token: &str) -> Result<u32, StoreError> {
        if token.len() != CODE_LEN {
            return Err(StoreError::BadTokenFormat);
        }
        let name = token.get(..KEY_NAME_LEN).ok_or(StoreError::BadTokenFormat)?;
        // Decoding the prefix up front rejects anything that is not pure
        // modhex before it can reach a filesystem path.
        modhex::decode(name).map_err(StoreError::Verify)?;

        let path = self.key_path(name);
        let lock = {
            let mut locks = self.locks.lock().await;
            // No lock entry for keys that do not exist.
            if !fs::try_exists(&path).await.unwrap_or(false) {
                return Err(StoreError::NoKey);
            }
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        let _guard = lock.lock().await;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .await
            .map_err(StoreError::OpenKey)?;

        let mut buf = [0u8; RECORD_LEN];
        file.read_exact(&mut buf).await.map_err(StoreError::ReadKey)?;
        let record = TokenRecord::from_bytes(&buf).map_err(StoreError::ParseKey)?;

        let accepted = record.verify_code(token).map_err(StoreError::Verify)?;

        file.seek(SeekFrom::Start(0))
            .await
            .map_err(StoreError::WriteKey)?;
        file.write_all(&accepted.as_bytes())
            .await
            .map_err(StoreError::WriteKey)?;
        file.flush().await.map_err(StoreError::WriteKey)?;

        Ok(accepted.counter())
    }

    /// Allocate the next key id and create its key file.
    ///
    /// The id is incremented before use, and `keynum` is rewritten only
    /// after the key file landed; the key file itself is written to a temp
    /// name and renamed into place so a crashed allocation never leaves a
    /// truncated record.
    ///
    /// # Errors
    /// See [`StoreError`]; each variant maps onto one wire error message.
    pub async fn new_key(&self) -> Result<NewKey, StoreError> {
        // Allocation is globally serialized under the store mutex.
        let _guard = self.locks.lock().await;

        let keynum_path = self.dir.join(KEY_NUM_FILE);
        if !fs::try_exists(&keynum_path).await.unwrap_or(false) {
            return Err(StoreError::NoKeyNum);
        }
        let mut keynum = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&keynum_path)
            .await
            .map_err(StoreError::OpenKeyNum)?;

        let mut name_buf = [0u8; KEY_NAME_LEN];
        keynum
            .read_exact(&mut name_buf)
            .await
            .map_err(StoreError::ReadKeyNum)?;
        let current = std::str::from_utf8(&name_buf)
            .map_err(|_| StoreError::ParseKeyNum(OtpError::MalformedCode))?;
        let id_bytes = modhex::decode(current).map_err(StoreError::ParseKeyNum)?;

        let id = bytes::decode_be(&id_bytes) + 1;
        let record = TokenRecord::new(id).map_err(StoreError::Provision)?;
        let name = record.key_name();

        let path = self.key_path(&name);
        let tmp = self.dir.join(format!("{name}.key.tmp"));
        fs::write(&tmp, record.as_bytes())
            .await
            .map_err(StoreError::CreateKey)?;
        fs::rename(&tmp, &path)
            .await
            .map_err(StoreError::CreateKey)?;

        keynum
            .seek(SeekFrom::Start(0))
            .await
            .map_err(StoreError::WriteKeyNum)?;
        keynum
            .write_all(name.as_bytes())
            .await
            .map_err(StoreError::WriteKeyNum)?;
        keynum.flush().await.map_err(StoreError::WriteKeyNum)?;

        Ok(NewKey { name, record })
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.key"))
    }
}
