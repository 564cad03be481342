use std::fmt;
use uuid::Uuid;

/// Opaque transport address of a peripheral, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        PeripheralId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(value: &str) -> Self {
        PeripheralId::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };

        f.pad(result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peripheral {
    pub id: PeripheralId,
    pub name: Option<String>,
    pub state: ConnectionState,
}

impl Peripheral {
    pub fn discovered(id: PeripheralId, name: Option<String>) -> Self {
        Peripheral { id, name, state: ConnectionState::Disconnected }
    }

    /// True if the peripheral advertised a non-empty local name.
    pub fn has_name(&self) -> bool {
        self.name.as_deref().map_or(false, |name| !name.trim().is_empty())
    }
}

/// Events pushed by a transport, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Discovered(Peripheral),
    ScanStopped,
    ValueChanged {
        peripheral: PeripheralId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    Disconnected(PeripheralId),
}
