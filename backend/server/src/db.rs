//! Database layer — migrations, profile queries and the donation ledger.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;
use crate::sessions::PendingDonation;

/// Cumulative donation total (USD) at which a profile becomes a supporter.
pub const SUPPORTER_THRESHOLD: f64 = 5.0;
/// Cumulative total at which a profile becomes a gold supporter.
pub const GOLD_SUPPORTER_THRESHOLD: f64 = 20.0;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// A profile row as read from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRecord {
    pub id: i64,
    pub username: String,
    pub donation_amount: f64,
    pub is_supporter: bool,
    pub is_gold_supporter: bool,
}

const PROFILE_COLUMNS: &str =
    "id, username, donation_amount, is_supporter, is_gold_supporter";

pub async fn create_profile(
    pool: &SqlitePool,
    username: &str,
    api_token: &str,
) -> Result<ProfileRecord> {
    let row = sqlx::query_as::<_, ProfileRecord>(&format!(
        "INSERT INTO profiles (username, api_token) VALUES (?1, ?2) RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(username)
    .bind(api_token)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_profile(pool: &SqlitePool, id: i64) -> Result<Option<ProfileRecord>> {
    let row = sqlx::query_as::<_, ProfileRecord>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// The narrow auth seam: resolve a bearer token to its profile.  Token
/// issuance itself belongs to the main application.
pub async fn get_profile_by_token(
    pool: &SqlitePool,
    api_token: &str,
) -> Result<Option<ProfileRecord>> {
    let row = sqlx::query_as::<_, ProfileRecord>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE api_token = ?1"
    ))
    .bind(api_token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Apply a confirmed donation to the beneficiary profile.
///
/// One atomic UPDATE accumulates the amount and raises the tier flags; the
/// flags are monotonic (the CASE arms never reset a flag that is already
/// set) and both thresholds can be crossed by a single donation.
pub async fn apply_donation(
    pool: &SqlitePool,
    donation: &PendingDonation,
) -> Result<Option<ProfileRecord>> {
    let row = sqlx::query_as::<_, ProfileRecord>(&format!(
        r#"
        UPDATE profiles SET
            donation_amount   = donation_amount + ?1,
            is_supporter      = CASE WHEN donation_amount + ?1 >= ?2 THEN 1 ELSE is_supporter END,
            is_gold_supporter = CASE WHEN donation_amount + ?1 >= ?3 THEN 1 ELSE is_gold_supporter END
        WHERE id = ?4
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(donation.amount)
    .bind(SUPPORTER_THRESHOLD)
    .bind(GOLD_SUPPORTER_THRESHOLD)
    .bind(donation.profile_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Persist the decoded payment-info snapshot from `generate-khqr` onto the
/// profile.
pub async fn save_khqr_snapshot(
    pool: &SqlitePool,
    profile_id: i64,
    khqr_string: &str,
    khqr_md5: &str,
    info: &khqr::KhqrInfo,
) -> Result<()> {
    let data = serde_json::to_string(info)?;
    sqlx::query(
        "UPDATE profiles SET khqr_string = ?1, khqr_md5 = ?2, khqr_data = ?3 WHERE id = ?4",
    )
    .bind(khqr_string)
    .bind(khqr_md5)
    .bind(data)
    .bind(profile_id)
    .execute(pool)
    .await?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn donation(profile_id: i64, amount: f64) -> PendingDonation {
        PendingDonation {
            profile_id,
            amount,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn supporter_threshold_crossing() {
        let (_dir, pool) = test_support::temp_pool().await;
        let profile = create_profile(&pool, "sokha", "tok-1").await.unwrap();

        // 4 USD: below every threshold.
        let p = apply_donation(&pool, &donation(profile.id, 4.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.donation_amount, 4.0);
        assert!(!p.is_supporter);
        assert!(!p.is_gold_supporter);

        // +1 USD crosses the supporter threshold exactly.
        let p = apply_donation(&pool, &donation(profile.id, 1.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.donation_amount, 5.0);
        assert!(p.is_supporter);
        assert!(!p.is_gold_supporter);

        // +15 USD reaches gold.
        let p = apply_donation(&pool, &donation(profile.id, 15.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.donation_amount, 20.0);
        assert!(p.is_supporter);
        assert!(p.is_gold_supporter);
    }

    #[tokio::test]
    async fn single_donation_can_cross_both_thresholds() {
        let (_dir, pool) = test_support::temp_pool().await;
        let profile = create_profile(&pool, "dara", "tok-2").await.unwrap();

        let p = apply_donation(&pool, &donation(profile.id, 25.0))
            .await
            .unwrap()
            .unwrap();
        assert!(p.is_supporter);
        assert!(p.is_gold_supporter);
    }

    #[tokio::test]
    async fn unknown_profile_applies_nothing() {
        let (_dir, pool) = test_support::temp_pool().await;
        let result = apply_donation(&pool, &donation(999, 5.0)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn token_lookup() {
        let (_dir, pool) = test_support::temp_pool().await;
        create_profile(&pool, "sokha", "tok-1").await.unwrap();

        let found = get_profile_by_token(&pool, "tok-1").await.unwrap();
        assert_eq!(found.unwrap().username, "sokha");
        assert!(get_profile_by_token(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn khqr_snapshot_round_trip() {
        let (_dir, pool) = test_support::temp_pool().await;
        let profile = create_profile(&pool, "sokha", "tok-1").await.unwrap();

        let payload = khqr::KhqrBuilder::individual("sokha@devb", "Sokha Chan")
            .timestamp_ms(1_700_000_000_000)
            .build()
            .unwrap();
        let info = khqr::decode(&payload).unwrap();
        let md5 = khqr::transaction_md5(&payload);
        save_khqr_snapshot(&pool, profile.id, &payload, &md5, &info)
            .await
            .unwrap();

        let (stored_string, stored_data): (String, String) =
            sqlx::query_as("SELECT khqr_string, khqr_data FROM profiles WHERE id = ?1")
                .bind(profile.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored_string, payload);
        let restored: khqr::KhqrInfo = serde_json::from_str(&stored_data).unwrap();
        assert_eq!(restored, info);
    }
}
