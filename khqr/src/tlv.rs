//! Tag-length-value encoding shared by the builder and the decoder.
//!
//! EMV-Co QR payloads are a flat sequence of `TTLLV...` fields where `TT` is
//! a two-digit tag and `LL` a two-digit, zero-padded byte length.  Nested
//! templates (merchant account info, additional data, timestamp) carry the
//! same encoding inside their value.

use crate::{KhqrError, Result};

// Top-level tags.
pub const PAYLOAD_FORMAT: &str = "00";
pub const POINT_OF_INITIATION: &str = "01";
pub const INDIVIDUAL_ACCOUNT: &str = "29";
pub const MERCHANT_ACCOUNT: &str = "30";
pub const MERCHANT_CATEGORY_CODE: &str = "52";
pub const CURRENCY: &str = "53";
pub const AMOUNT: &str = "54";
pub const COUNTRY_CODE: &str = "58";
pub const MERCHANT_NAME: &str = "59";
pub const MERCHANT_CITY: &str = "60";
pub const ADDITIONAL_DATA: &str = "62";
pub const CRC: &str = "63";
pub const TIMESTAMP: &str = "99";

// Sub-tags of the account templates (29/30).
pub const SUB_ACCOUNT_ID: &str = "00";
pub const SUB_MERCHANT_ID: &str = "01";
pub const SUB_ACQUIRING_BANK: &str = "02";

// Sub-tags of the additional-data template (62).
pub const SUB_BILL_NUMBER: &str = "01";
pub const SUB_MOBILE_NUMBER: &str = "02";
pub const SUB_STORE_LABEL: &str = "03";
pub const SUB_TERMINAL_LABEL: &str = "07";
pub const SUB_PURPOSE: &str = "08";

// Sub-tag of the timestamp template (99).
pub const SUB_CREATION_MS: &str = "00";

/// Longest value the two-digit length field can describe.
pub const MAX_VALUE_LEN: usize = 99;

/// Encode one field. Values longer than [`MAX_VALUE_LEN`] bytes cannot be
/// represented by the two-digit length and are rejected; this also bounds
/// nested templates whose sub-fields are individually valid but aggregate
/// past the limit.
pub fn encode(tag: &str, value: &str) -> Result<String> {
    if value.len() > MAX_VALUE_LEN {
        return Err(KhqrError::ValueTooLong(tag.to_string()));
    }
    Ok(format!("{tag}{:02}{value}", value.len()))
}

/// Parse a payload (or template value) into `(tag, value)` pairs in order.
pub fn parse(payload: &str) -> Result<Vec<(String, String)>> {
    let mut fields = Vec::new();
    let mut i = 0;
    while i < payload.len() {
        let tag = payload.get(i..i + 2).ok_or(KhqrError::Truncated)?;
        let len: usize = payload
            .get(i + 2..i + 4)
            .ok_or(KhqrError::Truncated)?
            .parse()
            .map_err(|_| KhqrError::Truncated)?;
        let value = payload
            .get(i + 4..i + 4 + len)
            .ok_or(KhqrError::Truncated)?;
        fields.push((tag.to_string(), value.to_string()));
        i += 4 + len;
    }
    Ok(fields)
}

/// Find the first occurrence of `tag` in a parsed field list.
pub fn find<'a>(fields: &'a [(String, String)], tag: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(t, _)| t == tag)
        .map(|(_, v)| v.as_str())
}
