pub mod btle;
pub mod constants;
pub mod listener;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod mock;
