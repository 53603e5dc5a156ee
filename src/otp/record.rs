use crate::otp::{
    bytes::{decode_le, encode_be, encode_le},
    crc, modhex, OtpError,
};
use aes::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    Aes128,
};
use rand::{rngs::OsRng, RngCore};
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted size of a token record.
pub const RECORD_LEN: usize = 32;

/// Length of a wire code in modhex characters.
pub const CODE_LEN: usize = 44;

/// Length of a key name: the 6-byte big-endian id, modhex encoded.
pub const KEY_NAME_LEN: usize = 12;

// The first 16 record bytes are the OTP plaintext; a code carries the
// big-endian id followed by their AES ciphertext.
const PLAINTEXT_LEN: usize = 16;
const CODE_BYTES: usize = 22;

const USE_CTR_MAX: u16 = 0x7fff;

// Eighth-second ticks between the Unix epoch and the device epoch
// (March 2023).
const EPOCH_EIGHTHS: u64 = 8 * 1_680_000_000;

/// A key's persisted state: identity, counters, and the AES-128 secret.
///
/// The record doubles as the OTP plaintext; bytes 0..16 of [`Self::as_bytes`]
/// are what gets encrypted into a code. The secret never leaves the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    id: [u8; 6],
    use_ctr: [u8; 2],
    timestamp: [u8; 3],
    session_ctr: u8,
    rnd: [u8; 2],
    checksum: [u8; 2],
    secret: [u8; 16],
}

impl TokenRecord {
    /// Provision a record for `id` with a fresh random secret. The use
    /// counter starts at 1, the session counter at 0.
    ///
    /// # Errors
    /// Returns [`OtpError::Rng`] if the CSPRNG fails.
    pub fn new(id: u64) -> Result<Self, OtpError> {
        let mut record = Self {
            id: encode_le::<6>(id),
            use_ctr: [0; 2],
            timestamp: [0; 3],
            session_ctr: 0,
            rnd: [0; 2],
            checksum: [0; 2],
            secret: [0; 16],
        };
        OsRng
            .try_fill_bytes(&mut record.secret)
            .map_err(|err| OtpError::Rng(err.to_string()))?;
        record.increment_use_ctr()?;
        record.stamp_timestamp();
        record.stamp_checksum();
        Ok(record)
    }

    /// Parse a persisted record, re-verifying the checksum.
    ///
    /// # Errors
    /// Returns [`OtpError::BadChecksum`] if the CRC residue over the first
    /// 16 bytes is not the expected constant.
    pub fn from_bytes(buf: &[u8; RECORD_LEN]) -> Result<Self, OtpError> {
        let mut record = Self {
            id: [0; 6],
            use_ctr: [0; 2],
            timestamp: [0; 3],
            session_ctr: buf[11],
            rnd: [0; 2],
            checksum: [0; 2],
            secret: [0; 16],
        };
        record.id.copy_from_slice(&buf[..6]);
        record.use_ctr.copy_from_slice(&buf[6..8]);
        record.timestamp.copy_from_slice(&buf[8..11]);
        record.rnd.copy_from_slice(&buf[12..14]);
        record.checksum.copy_from_slice(&buf[14..16]);
        record.secret.copy_from_slice(&buf[16..32]);
        if !record.checksum_ok() {
            return Err(OtpError::BadChecksum);
        }
        Ok(record)
    }

    /// Serialize to the persisted layout.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..6].copy_from_slice(&self.id);
        out[6..8].copy_from_slice(&self.use_ctr);
        out[8..11].copy_from_slice(&self.timestamp);
        out[11] = self.session_ctr;
        out[12..14].copy_from_slice(&self.rnd);
        out[14..16].copy_from_slice(&self.checksum);
        out[16..32].copy_from_slice(&self.secret);
        out
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        decode_le(&self.id)
    }

    #[must_use]
    pub fn use_ctr(&self) -> u16 {
        decode_le(&self.use_ctr) as u16
    }

    #[must_use]
    pub fn timestamp(&self) -> u32 {
        decode_le(&self.timestamp) as u32
    }

    #[must_use]
    pub fn session_ctr(&self) -> u8 {
        self.session_ctr
    }

    /// Sequence number of the last emitted code. Strictly increasing across
    /// the life of a key; the replay check compares these.
    #[must_use]
    pub fn counter(&self) -> u32 {
        u32::from(self.use_ctr()) * 256 + u32::from(self.session_ctr)
    }

    /// The key's public name: modhex of the 6-byte big-endian id. Doubles as
    /// the key file name and the first 12 characters of every code.
    #[must_use]
    pub fn key_name(&self) -> String {
        modhex::encode(&encode_be::<6>(self.id()))
    }

    /// Advance the counters, restamp timestamp/randomness/checksum, and emit
    /// the next 44-character code. The caller must persist the mutated
    /// record, otherwise the emitted code verifies against stale state.
    ///
    /// # Errors
    /// Returns [`OtpError::CounterExhausted`] once the use counter would
    /// pass `0x7fff`, and [`OtpError::Rng`] if the CSPRNG fails.
    pub fn generate_code(&mut self) -> Result<String, OtpError> {
        self.session_ctr = self.session_ctr.wrapping_add(1);
        if self.session_ctr == 0 {
            self.increment_use_ctr()?;
        }
        self.stamp_timestamp();
        self.refresh_rnd()?;
        self.stamp_checksum();

        let cipher = self.cipher()?;
        let plain = self.as_bytes();
        let mut block = GenericArray::clone_from_slice(&plain[..PLAINTEXT_LEN]);
        cipher.encrypt_block(&mut block);

        let mut wire = Vec::with_capacity(CODE_BYTES);
        wire.extend_from_slice(&encode_be::<6>(self.id()));
        wire.extend_from_slice(&block);
        Ok(modhex::encode(&wire))
    }

    /// Check a submitted code against this record and return the state it
    /// carries, which becomes the next persisted state on success.
    ///
    /// The id inside the ciphertext is authoritative; the plaintext wire
    /// prefix is only used for key lookup. Timestamp and randomness are
    /// advisory and accepted as-is.
    ///
    /// # Errors
    /// [`OtpError::MalformedCode`] for anything that is not 44 modhex
    /// characters, [`OtpError::BadChecksum`] / [`OtpError::BadId`] for
    /// tampered ciphertext, [`OtpError::Replay`] unless the code's
    /// `(use_ctr, session_ctr)` pair is strictly greater than ours.
    pub fn verify_code(&self, code: &str) -> Result<Self, OtpError> {
        let wire = modhex::decode(code)?;
        if wire.len() != CODE_BYTES {
            return Err(OtpError::MalformedCode);
        }

        let cipher = self.cipher()?;
        let mut block = GenericArray::clone_from_slice(&wire[6..]);
        cipher.decrypt_block(&mut block);

        let mut buf = [0u8; RECORD_LEN];
        buf[..PLAINTEXT_LEN].copy_from_slice(&block);
        buf[PLAINTEXT_LEN..].copy_from_slice(&self.secret);
        let candidate = Self::from_bytes(&buf)?;

        if candidate.id() != self.id() {
            return Err(OtpError::BadId);
        }
        if candidate.counter() <= self.counter() {
            return Err(OtpError::Replay);
        }
        Ok(candidate)
    }

    fn cipher(&self) -> Result<Aes128, OtpError> {
        Aes128::new_from_slice(&self.secret).map_err(|_| OtpError::CryptoInit)
    }

    fn increment_use_ctr(&mut self) -> Result<(), OtpError> {
        let ctr = self.use_ctr();
        if ctr >= USE_CTR_MAX {
            return Err(OtpError::CounterExhausted);
        }
        self.use_ctr = encode_le::<2>(u64::from(ctr + 1));
        Ok(())
    }

    fn stamp_timestamp(&mut self) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);
        // ~8 Hz tick since the device epoch, truncated to 24 bits
        let ticks = (now_ms * 8 / 1000).wrapping_sub(EPOCH_EIGHTHS);
        self.timestamp = encode_le::<3>(ticks);
    }

    fn refresh_rnd(&mut self) -> Result<(), OtpError> {
        OsRng
            .try_fill_bytes(&mut self.rnd)
            .map_err(|err| OtpError::Rng(err.to_string()))
    }

    fn stamp_checksum(&mut self) {
        let buf = self.as_bytes();
        let crc = crc::crc16(&buf[..14]) ^ 0xffff;
        self.checksum = encode_le::<2>(u64::from(crc));
    }

    fn checksum_ok(&self) -> bool {
        let buf = self.as_bytes();
        crc::crc16(&buf[..PLAINTEXT_LEN]) == crc::RESIDUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = TokenRecord::new(7).expect("new record");
        assert_eq!(record.id(), 7);
        assert_eq!(record.use_ctr(), 1);
        assert_eq!(record.session_ctr(), 0);
        assert_eq!(record.counter(), 256);
        assert_ne!(record.secret, [0; 16]);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let record = TokenRecord::new(0x0000_dead_beef).expect("new record");
        let parsed = TokenRecord::from_bytes(&record.as_bytes()).expect("parse");
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_checksum_residue() {
        let record = TokenRecord::new(42).expect("new record");
        assert_eq!(crc::crc16(&record.as_bytes()[..16]), crc::RESIDUE);
    }

    #[test]
    fn test_corrupt_byte_fails_checksum() {
        let record = TokenRecord::new(42).expect("new record");
        let mut buf = record.as_bytes();
        buf[3] ^= 0x01;
        assert_eq!(
            TokenRecord::from_bytes(&buf),
            Err(OtpError::BadChecksum)
        );
    }

    #[test]
    fn test_key_name_is_big_endian() {
        let record = TokenRecord::new(1).expect("new record");
        assert_eq!(record.key_name(), "cccccccccccb");
    }

    #[test]
    fn test_generated_code_verifies_once() {
        let stored = TokenRecord::new(9).expect("new record");
        let mut device = stored.clone();
        let code = device.generate_code().expect("generate");
        assert_eq!(code.len(), CODE_LEN);
        assert!(code.starts_with(&stored.key_name()));

        let accepted = stored.verify_code(&code).expect("verify");
        assert!(accepted.counter() > stored.counter());

        // The same code against the updated state is a replay.
        assert_eq!(accepted.verify_code(&code), Err(OtpError::Replay));
    }

    #[test]
    fn test_codes_are_strictly_monotonic() {
        let mut device = TokenRecord::new(3).expect("new record");
        let stored = device.clone();
        let mut last = stored.counter();
        for _ in 0..32 {
            let code = device.generate_code().expect("generate");
            let carried = stored.verify_code(&code).expect("decrypt");
            assert!(carried.counter() > last);
            last = carried.counter();
        }
    }

    #[test]
    fn test_session_rollover_carries_into_use_ctr() {
        let mut device = TokenRecord::new(5).expect("new record");
        device.session_ctr = 0xff;
        device.generate_code().expect("generate");
        assert_eq!(device.use_ctr(), 2);
        assert_eq!(device.session_ctr(), 0);
    }

    #[test]
    fn test_counter_saturation() {
        let mut device = TokenRecord::new(5).expect("new record");
        device.use_ctr = encode_le::<2>(u64::from(USE_CTR_MAX));
        device.session_ctr = 0xff;
        assert_eq!(device.generate_code(), Err(OtpError::CounterExhausted));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let stored = TokenRecord::new(11).expect("new record");
        let mut imposter = TokenRecord::new(11).expect("new record");
        let code = imposter.generate_code().expect("generate");
        // Decrypting under the wrong secret scrambles the plaintext; the
        // checksum catches it.
        assert_eq!(stored.verify_code(&code), Err(OtpError::BadChecksum));
    }

    #[test]
    fn test_wrong_id_rejected() {
        let mut device = TokenRecord::new(21).expect("new record");
        let code = device.generate_code().expect("generate");
        // Same secret, different stored id.
        let mut other = device.clone();
        other.id = encode_le::<6>(22);
        assert_eq!(other.verify_code(&code), Err(OtpError::BadId));
    }

    #[test]
    fn test_malformed_codes() {
        let record = TokenRecord::new(1).expect("new record");
        assert_eq!(record.verify_code(""), Err(OtpError::MalformedCode));
        assert_eq!(
            record.verify_code(&"c".repeat(CODE_LEN - 2)),
            Err(OtpError::MalformedCode)
        );
        assert_eq!(
            record.verify_code(&"a".repeat(CODE_LEN)),
            Err(OtpError::MalformedCode)
        );
    }
}
