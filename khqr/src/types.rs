//! Structured representation of a KHQR payload.

use serde::{Deserialize, Serialize};

use crate::{KhqrError, Result};

/// Whether the beneficiary is an individual Bakong account (template 29) or a
/// registered merchant (template 30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Individual,
    Merchant,
}

/// Transaction currency. KHQR only supports riel and dollar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Khr,
    Usd,
}

impl Currency {
    /// ISO-4217 numeric code carried in tag 53.
    pub fn numeric_code(self) -> &'static str {
        match self {
            Self::Khr => "116",
            Self::Usd => "840",
        }
    }

    pub fn from_numeric_code(code: &str) -> Result<Self> {
        match code {
            "116" => Ok(Self::Khr),
            "840" => Ok(Self::Usd),
            other => Err(KhqrError::UnknownCurrency(other.to_string())),
        }
    }

    /// Alphabetic code (`KHR` / `USD`).
    pub fn alpha_code(self) -> &'static str {
        match self {
            Self::Khr => "KHR",
            Self::Usd => "USD",
        }
    }

    pub fn from_alpha_code(code: &str) -> Result<Self> {
        match code.to_ascii_uppercase().as_str() {
            "KHR" => Ok(Self::Khr),
            "USD" => Ok(Self::Usd),
            other => Err(KhqrError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Decoded payload contents, also used as the snapshot persisted onto a
/// profile after a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KhqrInfo {
    pub account_type: AccountType,
    #[serde(rename = "bakongAccountID")]
    pub bakong_account_id: String,
    pub merchant_name: String,
    pub merchant_city: String,
    pub currency: Currency,
    pub amount: Option<String>,
    pub merchant_id: Option<String>,
    pub acquiring_bank: Option<String>,
    pub bill_number: Option<String>,
    pub mobile_number: Option<String>,
    pub store_label: Option<String>,
    pub terminal_label: Option<String>,
    pub purpose: Option<String>,
    pub timestamp_ms: Option<i64>,
}
