use sqlx::PgPool;

use crate::domain::DailyEnergyRecord;

/// Write one day's total for a site.
///
/// `daily_energy` is declared with `DEDUP UPSERT KEYS(day, site_id)`, so a
/// second insert for the same day replaces the first instead of adding a row.
pub async fn upsert_daily_energy(
    pool: &PgPool,
    site_id: &str,
    record: &DailyEnergyRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO daily_energy (day, site_id, kwh)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(record.date.midnight_utc())
    .bind(site_id)
    .bind(record.delta_kwh)
    .execute(pool)
    .await
    .map(|_| ())
}
