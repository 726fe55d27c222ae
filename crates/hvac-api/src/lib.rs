// hvac-api: Async Rust client for the HVAC cloud gateway API.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::GatewayClient;
pub use error::Error;
pub use models::{DeviceSettingsReport, DeviceSummary};
