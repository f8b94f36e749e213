//! Producer roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// The two fixed producer roles. Routing in the hub is keyed on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Grid-side meter on the utility pole.
    Pole,
    /// Premises-side meter with switchable relays.
    House,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 2] = [DeviceRole::Pole, DeviceRole::House];

    /// Wire name, also stored in the `trigger_source` column.
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceRole::Pole => "pole",
            DeviceRole::House => "house",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceRole {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pole" => Ok(DeviceRole::Pole),
            "house" => Ok(DeviceRole::House),
            other => Err(HubError::UnknownRole(other.to_string())),
        }
    }
}
