use crate::otp::OtpError;
use std::io;
use thiserror::Error;

/// Failures of the key store. Variants map one-to-one onto the wire error
/// messages the service reports.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("token must be 44 characters")]
    BadTokenFormat,

    #[error("no key file for this token")]
    NoKey,

    #[error("failed to open key file: {0}")]
    OpenKey(io::Error),

    #[error("short read on key file: {0}")]
    ReadKey(io::Error),

    #[error("stored key record is corrupt: {0}")]
    ParseKey(OtpError),

    #[error(transparent)]
    Verify(OtpError),

    #[error("failed to write key file: {0}")]
    WriteKey(io::Error),

    #[error("key counter file is missing")]
    NoKeyNum,

    #[error("failed to open key counter file: {0}")]
    OpenKeyNum(io::Error),

    #[error("short read on key counter file: {0}")]
    ReadKeyNum(io::Error),

    #[error("key counter file is corrupt: {0}")]
    ParseKeyNum(OtpError),

    #[error("failed to provision key record: {0}")]
    Provision(OtpError),

    #[error("failed to create key file: {0}")]
    CreateKey(io::Error),

    #[error("failed to update key counter file: {0}")]
    WriteKeyNum(io::Error),
}
