pub mod chart;
pub mod companion;
pub mod types;
