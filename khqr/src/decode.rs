//! Payload decoding and CRC verification.

use crate::tlv;
use crate::types::{AccountType, Currency, KhqrInfo};
use crate::{crc, KhqrError, Result};

/// Decode a KHQR payload back into structured form.
///
/// Verifies the trailing CRC before parsing; a payload that fails the check
/// is rejected outright rather than partially decoded.
pub fn decode(payload: &str) -> Result<KhqrInfo> {
    verify_crc(payload)?;

    let fields = tlv::parse(payload)?;

    let (account_type, account_value) =
        if let Some(v) = tlv::find(&fields, tlv::INDIVIDUAL_ACCOUNT) {
            (AccountType::Individual, v)
        } else if let Some(v) = tlv::find(&fields, tlv::MERCHANT_ACCOUNT) {
            (AccountType::Merchant, v)
        } else {
            return Err(KhqrError::MissingField("merchant account template"));
        };

    let account = tlv::parse(account_value)?;
    let bakong_account_id = tlv::find(&account, tlv::SUB_ACCOUNT_ID)
        .ok_or(KhqrError::MissingField("bakongAccountID"))?
        .to_string();
    let merchant_id = tlv::find(&account, tlv::SUB_MERCHANT_ID).map(str::to_string);
    let acquiring_bank = tlv::find(&account, tlv::SUB_ACQUIRING_BANK).map(str::to_string);

    let merchant_name = tlv::find(&fields, tlv::MERCHANT_NAME)
        .ok_or(KhqrError::MissingField("merchantName"))?
        .to_string();
    let merchant_city = tlv::find(&fields, tlv::MERCHANT_CITY)
        .unwrap_or_default()
        .to_string();

    let currency_code =
        tlv::find(&fields, tlv::CURRENCY).ok_or(KhqrError::MissingField("currency"))?;
    let currency = Currency::from_numeric_code(currency_code)?;

    let amount = tlv::find(&fields, tlv::AMOUNT).map(str::to_string);

    let mut bill_number = None;
    let mut mobile_number = None;
    let mut store_label = None;
    let mut terminal_label = None;
    let mut purpose = None;
    if let Some(additional) = tlv::find(&fields, tlv::ADDITIONAL_DATA) {
        let sub = tlv::parse(additional)?;
        bill_number = tlv::find(&sub, tlv::SUB_BILL_NUMBER).map(str::to_string);
        mobile_number = tlv::find(&sub, tlv::SUB_MOBILE_NUMBER).map(str::to_string);
        store_label = tlv::find(&sub, tlv::SUB_STORE_LABEL).map(str::to_string);
        terminal_label = tlv::find(&sub, tlv::SUB_TERMINAL_LABEL).map(str::to_string);
        purpose = tlv::find(&sub, tlv::SUB_PURPOSE).map(str::to_string);
    }

    let timestamp_ms = match tlv::find(&fields, tlv::TIMESTAMP) {
        Some(ts) => tlv::find(&tlv::parse(ts)?, tlv::SUB_CREATION_MS)
            .and_then(|ms| ms.parse().ok()),
        None => None,
    };

    Ok(KhqrInfo {
        account_type,
        bakong_account_id,
        merchant_name,
        merchant_city,
        currency,
        amount,
        merchant_id,
        acquiring_bank,
        bill_number,
        mobile_number,
        store_label,
        terminal_label,
        purpose,
        timestamp_ms,
    })
}

fn verify_crc(payload: &str) -> Result<()> {
    // The last field must be "6304" + four hex digits.
    if payload.len() < 8 {
        return Err(KhqrError::Truncated);
    }
    let (body, tail) = payload.split_at(payload.len() - 4);
    if !body.ends_with("6304") {
        return Err(KhqrError::Truncated);
    }
    let expected = u16::from_str_radix(tail, 16).map_err(|_| KhqrError::CrcMismatch)?;
    if crc::checksum(body.as_bytes()) != expected {
        return Err(KhqrError::CrcMismatch);
    }
    Ok(())
}
