pub mod application;
pub mod args;
pub mod printer;
pub mod types;
