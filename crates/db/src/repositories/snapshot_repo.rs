//! Repository for the `smart_grid_data` table (append-only).

use gridx_core::types::DbId;
use gridx_core::DeviceRole;
use sqlx::PgPool;

use crate::models::snapshot::{CreateSnapshot, Snapshot};

/// Column list for `smart_grid_data` SELECT queries (includes `id` and `timestamp`).
///
/// `id` is widened because tables created by earlier deployments use
/// `SERIAL` (INT4) rather than `BIGSERIAL`.
const COLUMNS: &str = "\
    id::BIGINT AS id, timestamp, trigger_source, \
    grid_id, grid_voltage, grid_current, grid_power, grid_energy, grid_frequency, grid_pf, \
    home_id, home_voltage, home_current, home_power, home_energy, home_frequency, home_pf, \
    home_temperature, \
    risk_score, alert_theft, alert_maintenance";

/// Column list for INSERT statements (excludes store-generated `id` and `timestamp`).
const INSERT_COLUMNS: &str = "\
    trigger_source, \
    grid_id, grid_voltage, grid_current, grid_power, grid_energy, grid_frequency, grid_pf, \
    home_id, home_voltage, home_current, home_power, home_energy, home_frequency, home_pf, \
    home_temperature, \
    risk_score, alert_theft, alert_maintenance";

/// Write and audit operations for snapshots. There is no update or delete.
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// Append one snapshot, returning its generated ID.
    pub async fn insert(pool: &PgPool, snapshot: &CreateSnapshot) -> Result<DbId, sqlx::Error> {
        let query = format!(
            "INSERT INTO smart_grid_data ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                     $11, $12, $13, $14, $15, $16, $17, $18, $19) \
             RETURNING id::BIGINT"
        );
        sqlx::query_scalar(&query)
            .bind(snapshot.trigger_source.as_str())
            .bind(&snapshot.grid_id)
            .bind(snapshot.grid_voltage)
            .bind(snapshot.grid_current)
            .bind(snapshot.grid_power)
            .bind(snapshot.grid_energy)
            .bind(snapshot.grid_frequency)
            .bind(snapshot.grid_pf)
            .bind(&snapshot.home_id)
            .bind(snapshot.home_voltage)
            .bind(snapshot.home_current)
            .bind(snapshot.home_power)
            .bind(snapshot.home_energy)
            .bind(snapshot.home_frequency)
            .bind(snapshot.home_pf)
            .bind(snapshot.home_temperature)
            .bind(snapshot.risk_score)
            .bind(snapshot.alert_theft)
            .bind(snapshot.alert_maintenance)
            .fetch_one(pool)
            .await
    }

    /// Count snapshots attributed to one trigger role.
    pub async fn count_by_trigger(pool: &PgPool, trigger: DeviceRole) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM smart_grid_data WHERE trigger_source = $1")
            .bind(trigger.as_str())
            .fetch_one(pool)
            .await
    }

    /// List recent snapshots, newest first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Snapshot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM smart_grid_data ORDER BY id DESC LIMIT $1");
        sqlx::query_as::<_, Snapshot>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
