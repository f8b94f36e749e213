//! The single in-memory view of both meters and their alerts.

use serde::Serialize;

use crate::alert::{self, AlertState};
use crate::device::DeviceRole;
use crate::telemetry::{HouseReading, MeterReading, ReadingPayload};

/// Node id shown for the pole before it ever reports.
pub const INITIAL_POLE_NODE_ID: &str = "Grid_Pole_Master";
/// Node id shown for the house before it ever reports.
pub const INITIAL_HOUSE_NODE_ID: &str = "House_Unit_1";

/// Combined state of the system. Unit of broadcast and of persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemState {
    pub pole: MeterReading,
    pub house: HouseReading,
    pub alerts: AlertState,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            pole: MeterReading::initial(INITIAL_POLE_NODE_ID),
            house: HouseReading::initial(INITIAL_HOUSE_NODE_ID),
            alerts: AlertState::default(),
        }
    }
}

/// Owner of [`SystemState`].
///
/// Not synchronized; the hub serializes all access behind its own lock so a
/// reading, its alert recompute, and the snapshot taken afterwards are never
/// interleaved with another message.
#[derive(Debug, Default)]
pub struct StateStore {
    state: SystemState,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a decoded payload into the reading for its role and stamp
    /// `last_seen`. Returns the updated meter values.
    pub fn apply_reading(&mut self, payload: ReadingPayload) -> MeterReading {
        let now = chrono::Utc::now();
        match payload {
            ReadingPayload::Pole(p) => {
                p.merge_into(&mut self.state.pole, now);
                self.state.pole.clone()
            }
            ReadingPayload::House(p) => {
                p.merge_into(&mut self.state.house, now);
                self.state.house.meter.clone()
            }
        }
    }

    /// Flip the connectivity flag only; measurements are left untouched.
    pub fn mark_connected(&mut self, role: DeviceRole, connected: bool) {
        self.meter_mut(role).connected = connected;
    }

    pub fn is_connected(&self, role: DeviceRole) -> bool {
        self.meter(role).connected
    }

    pub fn meter(&self, role: DeviceRole) -> &MeterReading {
        match role {
            DeviceRole::Pole => &self.state.pole,
            DeviceRole::House => &self.state.house.meter,
        }
    }

    fn meter_mut(&mut self, role: DeviceRole) -> &mut MeterReading {
        match role {
            DeviceRole::Pole => &mut self.state.pole,
            DeviceRole::House => &mut self.state.house.meter,
        }
    }

    pub fn alerts(&self) -> &AlertState {
        &self.state.alerts
    }

    pub fn set_alerts(&mut self, alerts: AlertState) {
        self.state.alerts = alerts;
    }

    /// Run the alert engine against the current readings and store the result.
    pub fn refresh_alerts(&mut self) -> &AlertState {
        let alerts = alert::evaluate(&self.state.pole, &self.state.house.meter, &self.state.alerts);
        self.set_alerts(alerts);
        &self.state.alerts
    }

    /// Owned copy of the whole state.
    pub fn snapshot(&self) -> SystemState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{HousePayload, PolePayload, SensorPayload, DEFAULT_FREQUENCY_HZ};

    #[test]
    fn starts_disconnected_with_initial_ids() {
        let store = StateStore::new();
        let state = store.snapshot();

        assert!(!state.pole.connected);
        assert!(!state.house.meter.connected);
        assert_eq!(state.pole.node_id, INITIAL_POLE_NODE_ID);
        assert_eq!(state.house.meter.node_id, INITIAL_HOUSE_NODE_ID);
        assert_eq!(state.alerts.message, alert::INITIAL_MESSAGE);
    }

    #[test]
    fn apply_reading_stamps_last_seen_and_defaults() {
        let mut store = StateStore::new();

        let reading = store.apply_reading(ReadingPayload::Pole(PolePayload {
            power: Some(42.0),
            ..Default::default()
        }));

        assert_eq!(reading.power, 42.0);
        assert_eq!(reading.frequency, DEFAULT_FREQUENCY_HZ);
        assert!(reading.last_seen.is_some());
        assert_eq!(store.snapshot().pole, reading);
    }

    #[test]
    fn apply_reading_only_touches_its_role() {
        let mut store = StateStore::new();
        let before = store.snapshot().pole;

        store.apply_reading(ReadingPayload::House(HousePayload {
            sensors: Some(SensorPayload {
                power: Some(75.0),
                ..Default::default()
            }),
            ..Default::default()
        }));

        let after = store.snapshot();
        assert_eq!(after.pole, before);
        assert_eq!(after.house.meter.power, 75.0);
    }

    #[test]
    fn disconnect_keeps_last_measurements() {
        let mut store = StateStore::new();
        store.mark_connected(DeviceRole::Pole, true);
        store.apply_reading(ReadingPayload::Pole(PolePayload {
            voltage: Some(231.0),
            power: Some(120.0),
            ..Default::default()
        }));

        store.mark_connected(DeviceRole::Pole, false);

        let pole = store.snapshot().pole;
        assert!(!pole.connected);
        assert_eq!(pole.voltage, 231.0);
        assert_eq!(pole.power, 120.0);
        assert!(pole.last_seen.is_some());
    }

    #[test]
    fn refresh_alerts_stores_engine_result() {
        let mut store = StateStore::new();
        store.mark_connected(DeviceRole::Pole, true);
        store.mark_connected(DeviceRole::House, true);
        store.apply_reading(ReadingPayload::Pole(PolePayload {
            power: Some(100.0),
            ..Default::default()
        }));
        store.apply_reading(ReadingPayload::House(HousePayload {
            sensors: Some(SensorPayload {
                power: Some(80.0),
                ..Default::default()
            }),
            ..Default::default()
        }));

        let alerts = store.refresh_alerts().clone();

        assert!(alerts.theft_detected);
        assert_eq!(store.snapshot().alerts, alerts);
    }

    #[test]
    fn snapshot_serializes_nested_objects() {
        let json = serde_json::to_value(StateStore::new().snapshot()).unwrap();

        assert!(json["pole"].is_object());
        assert!(json["house"].is_object());
        assert_eq!(json["alerts"]["risk_score"], 0.0);
        assert_eq!(json["house"]["relays"].as_array().map(Vec::len), Some(4));
    }
}
