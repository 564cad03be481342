use std::io;
use thiserror::Error;
use uuid::Uuid;

use crate::device::types::PeripheralId;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (bluetooth): {source}")]
    Transport { #[from] source: TransportError },

    #[error("Failed to start application (runtime): {source}")]
    Runtime { #[from] source: io::Error },

    #[error("No stick was given and none is remembered; pass --device or scan first")]
    NoDevice,

    #[error("Connection to {0} was lost")]
    ConnectionLost(PeripheralId),

    #[error("{source}")]
    Scan { #[from] source: ScanError },

    #[error("{source}")]
    Connect { #[from] source: ConnectError },

    #[error("{source}")]
    Send { #[from] source: SendError },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("Peripheral {0} is not known to the adapter")]
    UnknownPeripheral(PeripheralId),

    #[error("Characteristic {characteristic} of service {service} is not available")]
    MissingCharacteristic { service: Uuid, characteristic: Uuid },

    #[error("Operation took longer than {0} ms")]
    Deadline(u64),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scanning failed: {source}")]
    ScanFailed { #[from] source: TransportError },
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Connecting to {id} failed: {source}")]
    ConnectFailed { id: PeripheralId, source: TransportError },

    #[error("Connected to {id} but subscribing to telemetry failed: {source}")]
    SubscribeFailed { id: PeripheralId, source: TransportError },
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("No peripheral is connected")]
    NotConnected,

    #[error("Writing command failed: {source}")]
    TransportFailure { #[from] source: TransportError },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Telemetry notification carried no payload")]
    EmptyPayload,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Not a device command: {0:?}")]
    Malformed(String),
}
