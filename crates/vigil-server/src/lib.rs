pub mod application;
pub mod bootstrap;
pub mod infrastructure;
pub mod interface;
