pub mod monitor;
pub mod persistence;
