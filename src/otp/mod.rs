//! Modhex OTP engine: token record layout, codecs, code generation and
//! verification. The 32-byte record and 44-character wire format follow the
//! classic Yubikey OTP contract.

pub mod bytes;
pub mod crc;
pub mod modhex;

mod error;
mod record;

pub use error::OtpError;
pub use record::{TokenRecord, CODE_LEN, KEY_NAME_LEN, RECORD_LEN};
