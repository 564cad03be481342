use crate::channel::command::Feature;
use crate::channel::discovery::ScanState;
use crate::channel::telemetry::GaitSeries;
use crate::channel::toggles::ToggleState;
use crate::device::types::{ConnectionState, Peripheral, PeripheralId};

/// State changes published by the companion to whoever renders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ScanStateChange(ScanState),
    PeripheralFound(Peripheral),
    ConnectionChange(PeripheralId, ConnectionState),
    ToggleChange(Feature, ToggleState),
    // the command was not delivered and the switch went back to this state
    ToggleReverted(Feature, bool),
    Gait(GaitSeries),
    Notice(String),
}
