//! Platform-agnostic core of the soil-moisture node.
//!
//! The four pieces run leaves-first: [`sensor::SensorReader`] captures
//! readings, [`link::ConnectivityManager`] owns the network attachment,
//! [`delivery::DeliveryClient`] posts one reading per session and
//! [`acquisition::AcquisitionLoop`] drives them on a fixed tick. Hardware,
//! time and the network stack are injected through small traits so the
//! whole pipeline runs on the host under `embassy_futures::block_on`.

#![cfg_attr(not(test), no_std)]

pub mod acquisition;
pub mod backoff;
pub mod clock;
pub mod delivery;
pub mod http;
pub mod link;
pub mod payload;
pub mod policy;
pub mod reading;
pub mod sensor;
pub mod status;

#[cfg(test)]
mod testing;

pub use acquisition::{AcquisitionLoop, ChannelReport, Disposition, TickReport};
pub use clock::Clock;
pub use delivery::{DeliveryClient, DeliveryOutcome, Endpoint, FailureReason};
pub use link::{AttachError, ConnectivityManager, Connector, Link, LinkState, Session};
pub use policy::AcquisitionPolicy;
pub use reading::{Reading, READING_MAX, READING_MIN};
pub use sensor::{AnalogSource, Calibration, ChannelId, SensorAnomaly, SensorReader};
pub use status::{StatusEvent, StatusSink};
