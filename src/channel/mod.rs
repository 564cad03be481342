pub mod command;
pub mod discovery;
pub mod session;
pub mod telemetry;
pub mod toggles;
