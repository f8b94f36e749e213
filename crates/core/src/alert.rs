//! Theft and predictive-maintenance alerts.
//!
//! Pure logic, no I/O. The hub passes the current readings in and stores the
//! returned [`AlertState`].

use serde::Serialize;

use crate::telemetry::MeterReading;

/// Line loss (pole power minus house power, in watts) above which theft is flagged.
pub const THEFT_LOSS_THRESHOLD_W: f64 = 15.0;
/// Power factor below which a meter contributes to the risk score.
pub const LOW_POWER_FACTOR: f64 = 0.85;
/// Risk contribution of a low power factor on the pole.
pub const POLE_RISK_WEIGHT: f64 = 0.4;
/// Risk contribution of a low power factor on the house.
pub const HOUSE_RISK_WEIGHT: f64 = 0.3;
/// Risk score above which maintenance is flagged.
pub const MAINTENANCE_RISK_THRESHOLD: f64 = 0.6;

pub const THEFT_MESSAGE: &str = "THEFT DETECTED: Line Loss Exceeds Threshold!";
pub const MAINTENANCE_MESSAGE: &str = "MAINTENANCE ALERT: High Grid Instability";
pub const OPTIMAL_MESSAGE: &str = "System Optimal";
/// Message shown before the first reading is evaluated.
pub const INITIAL_MESSAGE: &str = "System Normal";

/// Derived alert flags broadcast alongside the readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertState {
    pub theft_detected: bool,
    pub maintenance_risk: bool,
    /// Weighted heuristic in `[0.0, 1.0]`.
    pub risk_score: f64,
    pub message: String,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            theft_detected: false,
            maintenance_risk: false,
            risk_score: 0.0,
            message: INITIAL_MESSAGE.to_string(),
        }
    }
}

/// Evaluate both alerts from the current readings.
///
/// Theft is only evaluated while both meters are connected; otherwise
/// `previous.theft_detected` is carried forward unchanged. The risk score
/// depends only on the two power factors.
pub fn evaluate(pole: &MeterReading, house: &MeterReading, previous: &AlertState) -> AlertState {
    let theft_detected = if pole.connected && house.connected {
        pole.power - house.power > THEFT_LOSS_THRESHOLD_W
    } else {
        previous.theft_detected
    };

    let risk_score = risk_score(pole.power_factor, house.power_factor);
    let maintenance_risk = risk_score > MAINTENANCE_RISK_THRESHOLD;

    let message = if theft_detected {
        THEFT_MESSAGE
    } else if maintenance_risk {
        MAINTENANCE_MESSAGE
    } else {
        OPTIMAL_MESSAGE
    };

    AlertState {
        theft_detected,
        maintenance_risk,
        risk_score,
        message: message.to_string(),
    }
}

fn risk_score(pole_pf: f64, house_pf: f64) -> f64 {
    let mut risk = 0.0;
    if is_low_power_factor(pole_pf) {
        risk += POLE_RISK_WEIGHT;
    }
    if is_low_power_factor(house_pf) {
        risk += HOUSE_RISK_WEIGHT;
    }
    f64::min(risk, 1.0)
}

/// Zero means "not reported", so it never counts as low.
fn is_low_power_factor(pf: f64) -> bool {
    pf > 0.0 && pf < LOW_POWER_FACTOR
}
