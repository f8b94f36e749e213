//! Domain core for the gridx telemetry hub.
//!
//! Everything in this crate is synchronous and free of I/O: the device
//! readings and their wire payloads, the in-memory [`StateStore`], the
//! alert engine, and the error taxonomy shared with the API crate.

pub mod alert;
pub mod device;
pub mod error;
pub mod state_store;
pub mod telemetry;
pub mod types;

pub use alert::AlertState;
pub use device::DeviceRole;
pub use error::HubError;
pub use state_store::{StateStore, SystemState};
pub use telemetry::{HouseReading, MeterReading, ReadingPayload};
