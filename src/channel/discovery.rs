use indexmap::IndexMap;

use crate::device::types::{ConnectionState, Peripheral, PeripheralId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    StoppedWithResults,
}

/// Named peripherals found by scanning, in discovery order, at most once per id.
#[derive(Debug, Clone)]
pub struct DiscoveredList {
    peripherals: IndexMap<PeripheralId, Peripheral>,
    scan_state: ScanState,
}

impl Default for DiscoveredList {
    fn default() -> Self {
        DiscoveredList { peripherals: IndexMap::new(), scan_state: ScanState::Idle }
    }
}

impl DiscoveredList {
    pub fn new() -> Self {
        DiscoveredList::default()
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan_state
    }

    /// Forget previous results, except peripherals that are not disconnected.
    pub fn scan_started(&mut self) {
        self.peripherals.retain(|_, peripheral| peripheral.state != ConnectionState::Disconnected);
        self.scan_state = ScanState::Scanning;
    }

    pub fn scan_failed(&mut self) {
        self.scan_state = ScanState::Idle;
    }

    pub fn scan_stopped(&mut self) {
        self.scan_state = if self.peripherals.is_empty() {
            ScanState::Idle
        } else {
            ScanState::StoppedWithResults
        };
    }

    /// Returns true if the peripheral was added. Unnamed peripherals and ids already in the list
    /// are ignored.
    pub fn discovered(&mut self, peripheral: Peripheral) -> bool {
        if !peripheral.has_name() || self.peripherals.contains_key(&peripheral.id) {
            return false;
        }

        let peripheral = Peripheral::discovered(peripheral.id, peripheral.name);
        self.peripherals.insert(peripheral.id.clone(), peripheral);
        true
    }

    pub fn set_state(&mut self, id: &PeripheralId, state: ConnectionState) {
        if let Some(peripheral) = self.peripherals.get_mut(id) {
            peripheral.state = state;
        }
    }

    pub fn get(&self, id: &PeripheralId) -> Option<&Peripheral> {
        self.peripherals.get(id)
    }

    pub fn peripherals(&self) -> impl Iterator<Item = &Peripheral> {
        self.peripherals.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(id: &str, name: Option<&str>) -> Peripheral {
        Peripheral::discovered(PeripheralId::from(id), name.map(String::from))
    }

    #[test]
    fn unnamed_peripherals_are_filtered() {
        let mut list = DiscoveredList::new();
        list.scan_started();

        assert!(list.discovered(found("AA:BB", Some("Stick1"))));
        assert!(!list.discovered(found("CC:DD", None)));
        assert!(!list.discovered(found("EE:FF", Some("  "))));

        let ids: Vec<_> = list.peripherals().map(|p| (p.id.as_str(), p.name.as_deref())).collect();
        assert_eq!(ids, vec![("AA:BB", Some("Stick1"))]);
    }

    #[test]
    fn duplicate_ids_are_listed_once() {
        let mut list = DiscoveredList::new();
        list.scan_started();

        for id in ["AA:BB", "CC:DD", "AA:BB", "AA:BB", "CC:DD", "EE:FF"] {
            list.discovered(found(id, Some("Stick")));
        }

        let ids: Vec<_> = list.peripherals().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["AA:BB", "CC:DD", "EE:FF"]);
    }

    #[test]
    fn scan_state_follows_results() {
        let mut list = DiscoveredList::new();
        assert_eq!(list.scan_state(), ScanState::Idle);

        list.scan_started();
        assert_eq!(list.scan_state(), ScanState::Scanning);
        list.scan_stopped();
        assert_eq!(list.scan_state(), ScanState::Idle);

        list.scan_started();
        list.discovered(found("AA:BB", Some("Stick1")));
        list.scan_stopped();
        assert_eq!(list.scan_state(), ScanState::StoppedWithResults);
    }

    #[test]
    fn rescanning_keeps_the_connected_peripheral() {
        let mut list = DiscoveredList::new();
        list.scan_started();
        list.discovered(found("AA:BB", Some("Stick1")));
        list.discovered(found("CC:DD", Some("Stick2")));
        list.set_state(&PeripheralId::from("AA:BB"), ConnectionState::Connected);

        list.scan_started();

        assert_eq!(list.peripherals().count(), 1);
        assert_eq!(list.get(&PeripheralId::from("AA:BB")).map(|p| p.state), Some(ConnectionState::Connected));
    }
}
