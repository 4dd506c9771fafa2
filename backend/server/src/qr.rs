//! Donation QR assembly.
//!
//! Donations always target the platform's fixed Bakong identity and are
//! denominated in USD; the general-purpose `generate-khqr` endpoint is the
//! one that exposes the full KHQR option set.

use khqr::{Currency, KhqrBuilder};

use crate::config::Config;
use crate::errors::Result;

pub struct DonationQr {
    pub payload: String,
    pub md5: String,
    pub qr_data_url: String,
}

pub fn build_donation_qr(config: &Config, amount: f64) -> Result<DonationQr> {
    let payload = KhqrBuilder::individual(&config.bakong_account_id, &config.merchant_name)
        .merchant_city(&config.merchant_city)
        .currency(Currency::Usd)
        .amount(amount)
        .build()?;

    let md5 = khqr::transaction_md5(&payload);
    let qr_data_url = khqr::qr_png_data_url(&payload)?;

    Ok(DonationQr {
        payload,
        md5,
        qr_data_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            bakong_token: "t".to_string(),
            bakong_api_url: "http://localhost".to_string(),
            bakong_account_id: "khnhom@devb".to_string(),
            merchant_name: "Khnhom".to_string(),
            merchant_city: "Phnom Penh".to_string(),
            database_url: String::new(),
            api_port: 0,
            poll_interval_secs: 5,
            session_timeout_secs: 300,
            countdown_secs: 30,
        }
    }

    #[test]
    fn donation_qr_is_dynamic_usd() {
        let qr = build_donation_qr(&test_config(), 10.5).unwrap();
        assert!(qr.qr_data_url.starts_with("data:image/png;base64,"));
        assert_eq!(qr.md5.len(), 32);

        let info = khqr::decode(&qr.payload).unwrap();
        assert_eq!(info.currency, Currency::Usd);
        assert_eq!(info.amount.as_deref(), Some("10.5"));
        assert_eq!(info.merchant_name, "Khnhom");
        assert_eq!(info.bakong_account_id, "khnhom@devb");
    }

    #[test]
    fn each_donation_gets_a_fresh_hash() {
        // The embedded creation timestamp makes consecutive QRs distinct.
        let a = build_donation_qr(&test_config(), 1.0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = build_donation_qr(&test_config(), 1.0).unwrap();
        assert_ne!(a.md5, b.md5);
    }

    #[test]
    fn invalid_amount_is_rejected() {
        assert!(build_donation_qr(&test_config(), f64::NAN).is_err());
        assert!(build_donation_qr(&test_config(), -1.0).is_err());
    }
}
