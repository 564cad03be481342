use serde::{Deserialize, Serialize};

use crate::device::constants::{CONNECT_DEADLINE, SCAN_SECONDS, WRITE_DEADLINE};
use crate::device::types::PeripheralId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub scan_seconds: u64,
    pub write_deadline_ms: u64,
    pub connect_deadline_ms: u64,
    pub allow_duplicates: bool,
    // only report peripherals advertising the stick service; some firmware does not advertise it
    pub filter_by_service: bool,
    pub last_peripheral: Option<String>,
}

impl Config {
    pub fn last_peripheral(&self) -> Option<PeripheralId> {
        self.last_peripheral.as_deref().map(PeripheralId::from)
    }

    /// Returns true if the config changed.
    pub fn remember_peripheral(&mut self, id: &PeripheralId) -> bool {
        if self.last_peripheral.as_deref() == Some(id.as_str()) {
            return false;
        }
        self.last_peripheral = Some(id.to_string());
        true
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_seconds: SCAN_SECONDS,
            write_deadline_ms: WRITE_DEADLINE,
            connect_deadline_ms: CONNECT_DEADLINE,
            allow_duplicates: false,
            filter_by_service: false,
            last_peripheral: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"scanSeconds": 8, "lastPeripheral": "AA:BB"}"#).unwrap();

        assert_eq!(config.scan_seconds, 8);
        assert_eq!(config.write_deadline_ms, WRITE_DEADLINE);
        assert_eq!(config.last_peripheral(), Some(PeripheralId::from("AA:BB")));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"connectDeadlineMs\":10000"));
        assert!(json.contains("\"allowDuplicates\":false"));
    }

    #[test]
    fn remembering_the_same_peripheral_is_not_a_change() {
        let mut config = Config::default();
        let id = PeripheralId::from("AA:BB");

        assert!(config.remember_peripheral(&id));
        assert!(!config.remember_peripheral(&id));
    }
}
