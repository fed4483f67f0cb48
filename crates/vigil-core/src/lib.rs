pub mod agent;
pub mod check;
pub mod config;
pub mod constants;
pub mod core_types;
pub mod duration;
pub mod error;
pub mod policy;

pub mod backoff;
pub mod shutdown;
pub mod telemetry;
pub mod transport;

pub use constants::*;
