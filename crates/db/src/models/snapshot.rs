//! Snapshot rows of the `smart_grid_data` table.

use gridx_core::types::{DbId, Timestamp};
use gridx_core::{DeviceRole, SystemState};
use serde::Serialize;
use sqlx::FromRow;

/// A persisted snapshot. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Snapshot {
    pub id: DbId,
    pub timestamp: Timestamp,
    pub trigger_source: String,

    pub grid_id: String,
    pub grid_voltage: f32,
    pub grid_current: f32,
    pub grid_power: f32,
    pub grid_energy: f32,
    pub grid_frequency: f32,
    pub grid_pf: f32,

    pub home_id: String,
    pub home_voltage: f32,
    pub home_current: f32,
    pub home_power: f32,
    pub home_energy: f32,
    pub home_frequency: f32,
    pub home_pf: f32,
    pub home_temperature: f32,

    pub risk_score: f32,
    pub alert_theft: bool,
    pub alert_maintenance: bool,
}

/// Insert DTO: the columns a snapshot supplies (id and timestamp are
/// store-generated). Measurements are narrowed to `REAL`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSnapshot {
    pub trigger_source: DeviceRole,

    pub grid_id: String,
    pub grid_voltage: f32,
    pub grid_current: f32,
    pub grid_power: f32,
    pub grid_energy: f32,
    pub grid_frequency: f32,
    pub grid_pf: f32,

    pub home_id: String,
    pub home_voltage: f32,
    pub home_current: f32,
    pub home_power: f32,
    pub home_energy: f32,
    pub home_frequency: f32,
    pub home_pf: f32,
    pub home_temperature: f32,

    pub risk_score: f32,
    pub alert_theft: bool,
    pub alert_maintenance: bool,
}

impl CreateSnapshot {
    /// Flatten a system state into one row attributed to `trigger_source`.
    pub fn from_state(trigger_source: DeviceRole, state: &SystemState) -> Self {
        let pole = &state.pole;
        let house = &state.house.meter;

        Self {
            trigger_source,

            grid_id: pole.node_id.clone(),
            grid_voltage: pole.voltage as f32,
            grid_current: pole.current as f32,
            grid_power: pole.power as f32,
            grid_energy: pole.energy as f32,
            grid_frequency: pole.frequency as f32,
            grid_pf: pole.power_factor as f32,

            home_id: house.node_id.clone(),
            home_voltage: house.voltage as f32,
            home_current: house.current as f32,
            home_power: house.power as f32,
            home_energy: house.energy as f32,
            home_frequency: house.frequency as f32,
            home_pf: house.power_factor as f32,
            home_temperature: state.house.temperature as f32,

            risk_score: state.alerts.risk_score as f32,
            alert_theft: state.alerts.theft_detected,
            alert_maintenance: state.alerts.maintenance_risk,
        }
    }
}
