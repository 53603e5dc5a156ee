use thiserror::Error;

/// Failures of the token codec and verification state machine.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OtpError {
    #[error("malformed modhex code")]
    MalformedCode,

    #[error("crc checksum mismatch")]
    BadChecksum,

    #[error("key id mismatch")]
    BadId,

    #[error("replayed code")]
    Replay,

    #[error("use counter exhausted")]
    CounterExhausted,

    #[error("aes key setup failed")]
    CryptoInit,

    #[error("rng failure: {0}")]
    Rng(String),
}
