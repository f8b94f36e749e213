//! Integration tests for `SnapshotRepo` against a real PostgreSQL instance.

use gridx_core::{DeviceRole, SystemState};
use gridx_db::models::snapshot::CreateSnapshot;
use gridx_db::repositories::SnapshotRepo;
use sqlx::PgPool;

fn sample_state() -> SystemState {
    let mut state = SystemState::default();
    state.pole.connected = true;
    state.pole.node_id = "Grid_Pole".to_string();
    state.pole.voltage = 230.0;
    state.pole.power = 100.0;
    state.pole.power_factor = 0.5;
    state.house.meter.connected = true;
    state.house.meter.node_id = "House_Node".to_string();
    state.house.meter.power = 80.0;
    state.house.temperature = 27.5;
    state.alerts.theft_detected = true;
    state.alerts.risk_score = 0.4;
    state
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn health_check_passes_after_migrations(pool: PgPool) {
    gridx_db::health_check(&pool).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn insert_stores_every_column(pool: PgPool) {
    let row = CreateSnapshot::from_state(DeviceRole::Pole, &sample_state());

    let id = SnapshotRepo::insert(&pool, &row).await.unwrap();
    let stored = SnapshotRepo::list_recent(&pool, 1).await.unwrap();

    assert_eq!(stored.len(), 1);
    let snapshot = &stored[0];
    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.trigger_source, "pole");
    assert_eq!(snapshot.grid_id, "Grid_Pole");
    assert_eq!(snapshot.grid_voltage, 230.0);
    assert_eq!(snapshot.grid_power, 100.0);
    assert_eq!(snapshot.grid_pf, 0.5);
    assert_eq!(snapshot.home_id, "House_Node");
    assert_eq!(snapshot.home_power, 80.0);
    assert_eq!(snapshot.home_temperature, 27.5);
    assert_eq!(snapshot.risk_score, 0.4);
    assert!(snapshot.alert_theft);
    assert!(!snapshot.alert_maintenance);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn count_by_trigger_separates_roles(pool: PgPool) {
    let state = sample_state();
    for _ in 0..3 {
        SnapshotRepo::insert(&pool, &CreateSnapshot::from_state(DeviceRole::Pole, &state))
            .await
            .unwrap();
    }
    SnapshotRepo::insert(&pool, &CreateSnapshot::from_state(DeviceRole::House, &state))
        .await
        .unwrap();

    assert_eq!(SnapshotRepo::count_by_trigger(&pool, DeviceRole::Pole).await.unwrap(), 3);
    assert_eq!(SnapshotRepo::count_by_trigger(&pool, DeviceRole::House).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_recent_is_newest_first(pool: PgPool) {
    let state = sample_state();
    let first = SnapshotRepo::insert(&pool, &CreateSnapshot::from_state(DeviceRole::Pole, &state))
        .await
        .unwrap();
    let second =
        SnapshotRepo::insert(&pool, &CreateSnapshot::from_state(DeviceRole::House, &state))
            .await
            .unwrap();

    let rows = SnapshotRepo::list_recent(&pool, 10).await.unwrap();

    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second, first]);
}

/// Table layout created by earlier deployments: `SERIAL` id, nullable columns.
const LEGACY_TABLE: &str = "\
    CREATE TABLE smart_grid_data (
        id SERIAL PRIMARY KEY,
        timestamp TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
        trigger_source VARCHAR(20),
        grid_id VARCHAR(50), grid_voltage REAL, grid_current REAL, grid_power REAL,
        grid_energy REAL, grid_frequency REAL, grid_pf REAL,
        home_id VARCHAR(50), home_voltage REAL, home_current REAL, home_power REAL,
        home_energy REAL, home_frequency REAL, home_pf REAL, home_temperature REAL,
        risk_score REAL, alert_theft BOOLEAN, alert_maintenance BOOLEAN
    )";

#[sqlx::test(migrations = false)]
async fn insert_and_list_work_on_legacy_serial_table(pool: PgPool) {
    sqlx::query(LEGACY_TABLE).execute(&pool).await.unwrap();
    // Migrations leave an existing table in place.
    gridx_db::run_migrations(&pool).await.unwrap();

    let row = CreateSnapshot::from_state(DeviceRole::House, &sample_state());
    let id = SnapshotRepo::insert(&pool, &row).await.unwrap();
    let stored = SnapshotRepo::list_recent(&pool, 5).await.unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].trigger_source, "house");
}
