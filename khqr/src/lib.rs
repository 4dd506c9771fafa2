//! KHQR — the Cambodian interbank QR standard used by Bakong.
//!
//! Builds EMV-Co merchant-presented payloads for individual and merchant
//! Bakong accounts, decodes them back into structured form, and renders the
//! payload as a PNG data URL suitable for an `<img>` tag.  The md5 hex digest
//! of a payload is the transaction hash the Bakong gateway is queried by.

mod builder;
mod crc;
mod decode;
mod render;
mod tlv;
mod types;

use thiserror::Error;

pub use builder::KhqrBuilder;
pub use decode::decode;
pub use render::{qr_png_data_url, transaction_md5};
pub use types::{AccountType, Currency, KhqrInfo};

#[derive(Debug, Error)]
pub enum KhqrError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} exceeds {1} characters")]
    FieldTooLong(&'static str, usize),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("encoded value for tag {0} exceeds 99 characters")]
    ValueTooLong(String),

    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    #[error("truncated or malformed payload")]
    Truncated,

    #[error("payload CRC mismatch")]
    CrcMismatch,

    #[error("QR encode error: {0}")]
    QrEncode(#[from] qrcode::types::QrError),

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, KhqrError>;
