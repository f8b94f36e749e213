//! Device readings and the inbound producer payloads that update them.
//!
//! Producers send partial JSON objects. Each role has a typed payload with
//! every field optional; [`PolePayload::merge_into`] and
//! [`HousePayload::merge_into`] fill omitted fields from the defaults table
//! below rather than erroring. Unknown fields are ignored.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::DeviceRole;
use crate::error::HubError;
use crate::types::Timestamp;

/// Frequency assumed when a producer omits it (Hz).
pub const DEFAULT_FREQUENCY_HZ: f64 = 50.0;
/// Temperature assumed when the house omits it (degrees C).
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;
/// Node id assumed when the pole omits it.
pub const DEFAULT_POLE_NODE_ID: &str = "Grid_Pole";
/// Node id assumed when the house omits it.
pub const DEFAULT_HOUSE_NODE_ID: &str = "House_Node";

/// Number of switchable relay channels on the house node.
pub const RELAY_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Latest known electrical measurements of one meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterReading {
    pub connected: bool,
    pub node_id: String,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
    #[serde(rename = "pf")]
    pub power_factor: f64,
    pub frequency: f64,
    pub last_seen: Option<Timestamp>,
}

impl MeterReading {
    /// A never-seen meter: disconnected, all measurements zero.
    pub fn initial(node_id: &str) -> Self {
        Self {
            connected: false,
            node_id: node_id.to_string(),
            voltage: 0.0,
            current: 0.0,
            power: 0.0,
            energy: 0.0,
            power_factor: 0.0,
            frequency: 0.0,
            last_seen: None,
        }
    }
}

/// The house meter plus its temperature sensor and relay outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseReading {
    #[serde(flatten)]
    pub meter: MeterReading,
    pub temperature: f64,
    #[serde(rename = "relays")]
    pub relay_states: [bool; RELAY_COUNT],
}

impl HouseReading {
    pub fn initial(node_id: &str) -> Self {
        Self {
            meter: MeterReading::initial(node_id),
            temperature: DEFAULT_TEMPERATURE_C,
            relay_states: [false; RELAY_COUNT],
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Body of a message from the pole producer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolePayload {
    pub node_id: Option<String>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub energy: Option<f64>,
    pub frequency: Option<f64>,
    pub pf: Option<f64>,
}

/// Sensor block nested inside a house message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorPayload {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub energy: Option<f64>,
    pub temperature: Option<f64>,
    pub frequency: Option<f64>,
    pub pf: Option<f64>,
}

/// Body of a message from the house producer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HousePayload {
    pub node_id: Option<String>,
    pub sensors: Option<SensorPayload>,
    pub relays: Option<[bool; RELAY_COUNT]>,
}

impl PolePayload {
    /// Overwrite every measurement of `reading`, defaulting omitted fields.
    /// `connected` is left alone.
    pub fn merge_into(self, reading: &mut MeterReading, now: Timestamp) {
        reading.node_id = self
            .node_id
            .unwrap_or_else(|| DEFAULT_POLE_NODE_ID.to_string());
        reading.voltage = self.voltage.unwrap_or(0.0);
        reading.current = self.current.unwrap_or(0.0);
        reading.power = self.power.unwrap_or(0.0);
        reading.energy = self.energy.unwrap_or(0.0);
        reading.frequency = self.frequency.unwrap_or(DEFAULT_FREQUENCY_HZ);
        reading.power_factor = self.pf.unwrap_or(0.0);
        reading.last_seen = Some(now);
    }
}

impl HousePayload {
    pub fn merge_into(self, reading: &mut HouseReading, now: Timestamp) {
        let sensors = self.sensors.unwrap_or_default();
        let meter = &mut reading.meter;

        meter.node_id = self
            .node_id
            .unwrap_or_else(|| DEFAULT_HOUSE_NODE_ID.to_string());
        meter.voltage = sensors.voltage.unwrap_or(0.0);
        meter.current = sensors.current.unwrap_or(0.0);
        meter.power = sensors.power.unwrap_or(0.0);
        meter.energy = sensors.energy.unwrap_or(0.0);
        meter.frequency = sensors.frequency.unwrap_or(DEFAULT_FREQUENCY_HZ);
        meter.power_factor = sensors.pf.unwrap_or(0.0);
        meter.last_seen = Some(now);

        reading.temperature = sensors.temperature.unwrap_or(DEFAULT_TEMPERATURE_C);
        reading.relay_states = self.relays.unwrap_or([false; RELAY_COUNT]);
    }
}

/// A decoded producer message, tagged by the role that sent it.
#[derive(Debug, Clone)]
pub enum ReadingPayload {
    Pole(PolePayload),
    House(HousePayload),
}

impl ReadingPayload {
    /// Decode raw message bytes according to the sender's role.
    ///
    /// Anything that is not a JSON object matching the role's payload shape
    /// (wrong types, a relay array of the wrong length) is
    /// [`HubError::MalformedPayload`].
    pub fn decode(role: DeviceRole, raw: &[u8]) -> Result<Self, HubError> {
        let object = parse_object(raw)?;
        let payload = match role {
            DeviceRole::Pole => ReadingPayload::Pole(from_object(object)?),
            DeviceRole::House => {
                require_object_field(&object, "sensors")?;
                ReadingPayload::House(from_object(object)?)
            }
        };
        Ok(payload)
    }

    pub fn role(&self) -> DeviceRole {
        match self {
            ReadingPayload::Pole(_) => DeviceRole::Pole,
            ReadingPayload::House(_) => DeviceRole::House,
        }
    }
}

/// Parse `raw` as a top-level JSON object.
///
/// Derived struct decoders also accept arrays in field order; every inbound
/// message goes through here first so only objects get that far.
pub fn parse_object(raw: &[u8]) -> Result<Map<String, Value>, serde_json::Error> {
    serde_json::from_slice(raw)
}

fn from_object<T: DeserializeOwned>(object: Map<String, Value>) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(object))
}

/// `key`, when present and not null, must itself be an object.
fn require_object_field(object: &Map<String, Value>, key: &str) -> Result<(), serde_json::Error> {
    match object.get(key) {
        None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(serde_json::Error::custom(format!(
            "`{key}` must be a JSON object"
        ))),
    }
}
