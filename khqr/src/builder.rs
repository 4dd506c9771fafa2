//! Payload construction.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::tlv;
use crate::types::{AccountType, Currency};
use crate::{crc, KhqrError, Result};

const PAYLOAD_FORMAT_VERSION: &str = "01";
const POI_STATIC: &str = "11";
const POI_DYNAMIC: &str = "12";
const DEFAULT_MCC: &str = "5999";
const COUNTRY_KH: &str = "KH";
const DEFAULT_CITY: &str = "Phnom Penh";

const MAX_ACCOUNT_ID: usize = 32;
const MAX_MERCHANT_ID: usize = 32;
const MAX_ACQUIRING_BANK: usize = 32;
const MAX_MERCHANT_NAME: usize = 25;
const MAX_MERCHANT_CITY: usize = 15;
const MAX_ADDITIONAL_FIELD: usize = 25;
const MAX_AMOUNT: usize = 13;

/// Builds a KHQR payload string.
///
/// ```
/// use khqr::{Currency, KhqrBuilder};
///
/// let payload = KhqrBuilder::individual("sokha_chan@devb", "Sokha Chan")
///     .currency(Currency::Usd)
///     .amount(1.5)
///     .build()
///     .unwrap();
/// assert!(payload.starts_with("000201"));
/// ```
#[derive(Debug, Clone)]
pub struct KhqrBuilder {
    account_type: AccountType,
    bakong_account_id: String,
    merchant_name: String,
    merchant_city: Option<String>,
    merchant_id: Option<String>,
    acquiring_bank: Option<String>,
    currency: Currency,
    amount: Option<f64>,
    bill_number: Option<String>,
    mobile_number: Option<String>,
    store_label: Option<String>,
    terminal_label: Option<String>,
    purpose: Option<String>,
    timestamp_ms: Option<i64>,
}

impl KhqrBuilder {
    pub fn individual(bakong_account_id: impl Into<String>, merchant_name: impl Into<String>) -> Self {
        Self::new(AccountType::Individual, bakong_account_id, merchant_name)
    }

    pub fn merchant(bakong_account_id: impl Into<String>, merchant_name: impl Into<String>) -> Self {
        Self::new(AccountType::Merchant, bakong_account_id, merchant_name)
    }

    fn new(
        account_type: AccountType,
        bakong_account_id: impl Into<String>,
        merchant_name: impl Into<String>,
    ) -> Self {
        Self {
            account_type,
            bakong_account_id: bakong_account_id.into(),
            merchant_name: merchant_name.into(),
            merchant_city: None,
            merchant_id: None,
            acquiring_bank: None,
            currency: Currency::Khr,
            amount: None,
            bill_number: None,
            mobile_number: None,
            store_label: None,
            terminal_label: None,
            purpose: None,
            timestamp_ms: None,
        }
    }

    pub fn merchant_city(mut self, city: impl Into<String>) -> Self {
        self.merchant_city = Some(city.into());
        self
    }

    pub fn merchant_id(mut self, id: impl Into<String>) -> Self {
        self.merchant_id = Some(id.into());
        self
    }

    pub fn acquiring_bank(mut self, bank: impl Into<String>) -> Self {
        self.acquiring_bank = Some(bank.into());
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Setting an amount makes the QR dynamic (point of initiation `12`).
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn bill_number(mut self, v: impl Into<String>) -> Self {
        self.bill_number = Some(v.into());
        self
    }

    pub fn mobile_number(mut self, v: impl Into<String>) -> Self {
        self.mobile_number = Some(v.into());
        self
    }

    pub fn store_label(mut self, v: impl Into<String>) -> Self {
        self.store_label = Some(v.into());
        self
    }

    pub fn terminal_label(mut self, v: impl Into<String>) -> Self {
        self.terminal_label = Some(v.into());
        self
    }

    pub fn purpose(mut self, v: impl Into<String>) -> Self {
        self.purpose = Some(v.into());
        self
    }

    /// Override the creation timestamp (tag 99). Defaults to now, which makes
    /// every generated payload, and therefore its md5, unique.
    pub fn timestamp_ms(mut self, ms: i64) -> Self {
        self.timestamp_ms = Some(ms);
        self
    }

    pub fn build(self) -> Result<String> {
        self.validate()?;

        let mut payload = String::new();
        payload.push_str(&tlv::encode(tlv::PAYLOAD_FORMAT, PAYLOAD_FORMAT_VERSION)?);

        let poi = if self.amount.is_some() { POI_DYNAMIC } else { POI_STATIC };
        payload.push_str(&tlv::encode(tlv::POINT_OF_INITIATION, poi)?);

        let account_tag = match self.account_type {
            AccountType::Individual => tlv::INDIVIDUAL_ACCOUNT,
            AccountType::Merchant => tlv::MERCHANT_ACCOUNT,
        };
        let mut account = tlv::encode(tlv::SUB_ACCOUNT_ID, &self.bakong_account_id)?;
        if let Some(id) = &self.merchant_id {
            account.push_str(&tlv::encode(tlv::SUB_MERCHANT_ID, id)?);
        }
        if let Some(bank) = &self.acquiring_bank {
            account.push_str(&tlv::encode(tlv::SUB_ACQUIRING_BANK, bank)?);
        }
        payload.push_str(&tlv::encode(account_tag, &account)?);

        payload.push_str(&tlv::encode(tlv::MERCHANT_CATEGORY_CODE, DEFAULT_MCC)?);
        payload.push_str(&tlv::encode(tlv::CURRENCY, self.currency.numeric_code())?);
        if let Some(amount) = self.amount {
            payload.push_str(&tlv::encode(tlv::AMOUNT, &format_amount(amount))?);
        }
        payload.push_str(&tlv::encode(tlv::COUNTRY_CODE, COUNTRY_KH)?);
        payload.push_str(&tlv::encode(tlv::MERCHANT_NAME, &self.merchant_name)?);
        payload.push_str(&tlv::encode(
            tlv::MERCHANT_CITY,
            self.merchant_city.as_deref().unwrap_or(DEFAULT_CITY),
        )?);

        let mut additional = String::new();
        for (sub, value) in [
            (tlv::SUB_BILL_NUMBER, &self.bill_number),
            (tlv::SUB_MOBILE_NUMBER, &self.mobile_number),
            (tlv::SUB_STORE_LABEL, &self.store_label),
            (tlv::SUB_TERMINAL_LABEL, &self.terminal_label),
            (tlv::SUB_PURPOSE, &self.purpose),
        ] {
            if let Some(v) = value {
                additional.push_str(&tlv::encode(sub, v)?);
            }
        }
        if !additional.is_empty() {
            payload.push_str(&tlv::encode(tlv::ADDITIONAL_DATA, &additional)?);
        }

        let ms = self.timestamp_ms.unwrap_or_else(now_ms);
        let timestamp = tlv::encode(tlv::SUB_CREATION_MS, &ms.to_string())?;
        payload.push_str(&tlv::encode(tlv::TIMESTAMP, &timestamp)?);

        // CRC is computed over everything including its own tag and length.
        payload.push_str(tlv::CRC);
        payload.push_str("04");
        let sum = crc::checksum(payload.as_bytes());
        payload.push_str(&format!("{sum:04X}"));

        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        if self.bakong_account_id.is_empty() {
            return Err(KhqrError::MissingField("bakongAccountID"));
        }
        if self.bakong_account_id.len() > MAX_ACCOUNT_ID {
            return Err(KhqrError::FieldTooLong("bakongAccountID", MAX_ACCOUNT_ID));
        }
        if self.merchant_name.is_empty() {
            return Err(KhqrError::MissingField("merchantName"));
        }
        if self.merchant_name.len() > MAX_MERCHANT_NAME {
            return Err(KhqrError::FieldTooLong("merchantName", MAX_MERCHANT_NAME));
        }
        if let Some(city) = &self.merchant_city {
            if city.len() > MAX_MERCHANT_CITY {
                return Err(KhqrError::FieldTooLong("merchantCity", MAX_MERCHANT_CITY));
            }
        }
        if let Some(id) = &self.merchant_id {
            if id.len() > MAX_MERCHANT_ID {
                return Err(KhqrError::FieldTooLong("merchantID", MAX_MERCHANT_ID));
            }
        }
        if let Some(bank) = &self.acquiring_bank {
            if bank.len() > MAX_ACQUIRING_BANK {
                return Err(KhqrError::FieldTooLong("acquiringBank", MAX_ACQUIRING_BANK));
            }
        }
        for (name, value) in [
            ("billNumber", &self.bill_number),
            ("mobileNumber", &self.mobile_number),
            ("storeLabel", &self.store_label),
            ("terminalLabel", &self.terminal_label),
            ("purposeOfTransaction", &self.purpose),
        ] {
            if let Some(v) = value {
                if v.len() > MAX_ADDITIONAL_FIELD {
                    return Err(KhqrError::FieldTooLong(name, MAX_ADDITIONAL_FIELD));
                }
            }
        }
        if let Some(amount) = self.amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(KhqrError::InvalidAmount(amount.to_string()));
            }
            // Validate the wire form: a sub-cent amount collapses to "0"
            // after rounding, and a huge one overflows tag 54.
            let formatted = format_amount(amount);
            if formatted == "0" || formatted.len() > MAX_AMOUNT {
                return Err(KhqrError::InvalidAmount(amount.to_string()));
            }
        }
        Ok(())
    }
}

/// Format with at most two decimal places, trailing zeros trimmed.
fn format_amount(amount: f64) -> String {
    let s = format!("{amount:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
