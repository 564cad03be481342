use std::time::Duration;
use futures::SinkExt;
use futures::channel::mpsc::Sender;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::types::AppEvent;
use crate::channel::command::Feature;
use crate::channel::discovery::DiscoveredList;
use crate::channel::session::Session;
use crate::channel::telemetry::GaitSeries;
use crate::channel::toggles::FeatureToggles;
use crate::config::types::Config;
use crate::device::constants::{STICK_DATA_UUID, STICK_SERVICE_UUID};
use crate::device::transport::Transport;
use crate::device::types::{ConnectionState, Peripheral, PeripheralId, TransportEvent};
use crate::error::{ConnectError, ScanError, SendError};

pub struct ScanSettings {
    pub duration: Duration,
    pub allow_duplicates: bool,
    pub services: Vec<Uuid>,
}

impl From<&Config> for ScanSettings {
    fn from(config: &Config) -> Self {
        ScanSettings {
            duration: Duration::from_secs(config.scan_seconds),
            allow_duplicates: config.allow_duplicates,
            services: if config.filter_by_service { vec![STICK_SERVICE_UUID] } else { Vec::new() },
        }
    }
}

/// Everything the companion screen shows, and the actions it offers.
pub struct Companion<T: Transport> {
    session: Session<T>,
    scan_settings: ScanSettings,
    discovered: DiscoveredList,
    toggles: FeatureToggles,
    gait: GaitSeries,

    // messages that the user must acknowledge
    notices: Vec<String>,

    senders: Vec<Sender<AppEvent>>,
}

impl<T: Transport> Companion<T> {
    pub fn new(session: Session<T>, scan_settings: ScanSettings, senders: Vec<Sender<AppEvent>>) -> Self {
        Companion {
            session,
            scan_settings,
            discovered: DiscoveredList::new(),
            toggles: FeatureToggles::new(),
            gait: GaitSeries::new(),
            notices: Vec::new(),
            senders,
        }
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn discovered(&self) -> &DiscoveredList {
        &self.discovered
    }

    pub fn peripherals(&self) -> Vec<Peripheral> {
        self.discovered.peripherals().cloned().collect()
    }

    pub fn toggles(&self) -> &FeatureToggles {
        &self.toggles
    }

    pub fn gait(&self) -> &GaitSeries {
        &self.gait
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    async fn publish(&mut self, event: AppEvent) {
        for sender in &mut self.senders {
            if let Err(err) = sender.send(event.clone()).await {
                debug!("AppEvent receiver went away: {:?}", err);
            }
        }
    }

    async fn notice(&mut self, message: String) {
        error!("{}", message);
        self.notices.push(message.clone());
        self.publish(AppEvent::Notice(message)).await;
    }

    async fn set_connection_state(&mut self, id: &PeripheralId, state: ConnectionState) {
        self.discovered.set_state(id, state);
        self.publish(AppEvent::ConnectionChange(id.clone(), state)).await;
    }

    pub async fn start_scan(&mut self) -> Result<(), ScanError> {
        self.discovered.scan_started();
        self.publish(AppEvent::ScanStateChange(self.discovered.scan_state())).await;

        let settings = &self.scan_settings;
        let result = self.session.scan(&settings.services, settings.duration, settings.allow_duplicates).await;

        if let Err(err) = result {
            self.discovered.scan_failed();
            self.publish(AppEvent::ScanStateChange(self.discovered.scan_state())).await;
            self.notice(format!("{}", err)).await;
            return Err(err);
        }

        Ok(())
    }

    pub async fn stop_scan(&mut self) -> Result<(), ScanError> {
        // the transport follows up with a ScanStopped event
        self.session.stop_scan().await
    }

    pub async fn connect(&mut self, id: &PeripheralId) -> Result<(), ConnectError> {
        if let Some(previous) = self.session.connected() {
            if &previous != id {
                self.set_connection_state(&previous, ConnectionState::Disconnected).await;
            }
        }

        self.set_connection_state(id, ConnectionState::Connecting).await;

        match self.session.connect(id).await {
            Ok(()) => {
                self.set_connection_state(id, ConnectionState::Connected).await;
                Ok(())
            },
            Err(err) => {
                self.set_connection_state(id, ConnectionState::Disconnected).await;
                self.notice(format!("{}", err)).await;
                Err(err)
            },
        }
    }

    pub async fn disconnect(&mut self) {
        match self.session.disconnect().await {
            Ok(Some(id)) => self.set_connection_state(&id, ConnectionState::Disconnected).await,
            Ok(None) => {},
            Err(err) => {
                warn!("Disconnecting failed: {:?}", err);
                // the session forgets the peripheral either way
                let ids: Vec<_> = self.discovered.peripherals()
                    .filter(|p| p.state != ConnectionState::Disconnected)
                    .map(|p| p.id.clone())
                    .collect();
                for id in ids {
                    self.set_connection_state(&id, ConnectionState::Disconnected).await;
                }
            },
        }
    }

    /// Flip a feature switch and command the stick. If the command does not reach the stick the
    /// switch goes back to the last confirmed state; the failure is only logged.
    pub async fn toggle(&mut self, feature: Feature, enabled: bool) -> Result<(), SendError> {
        self.toggles.request(feature, enabled);
        self.publish(AppEvent::ToggleChange(feature, self.toggles.get(feature))).await;

        match self.session.send(feature, enabled).await {
            Ok(()) => {
                self.toggles.confirm(feature, enabled);
                self.publish(AppEvent::ToggleChange(feature, self.toggles.get(feature))).await;
                Ok(())
            },
            Err(err) => {
                warn!("{} not switched {}: {}", feature, if enabled { "on" } else { "off" }, err);
                let reverted = self.toggles.revert(feature);
                self.publish(AppEvent::ToggleReverted(feature, reverted)).await;
                Err(err)
            },
        }
    }

    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Discovered(peripheral) => {
                if self.discovered.discovered(peripheral.clone()) {
                    info!("Found {} ({})", peripheral.name.as_deref().unwrap_or_default(), peripheral.id);
                    self.publish(AppEvent::PeripheralFound(peripheral)).await;
                }
            },
            TransportEvent::ScanStopped => {
                self.discovered.scan_stopped();
                self.publish(AppEvent::ScanStateChange(self.discovered.scan_state())).await;
            },
            TransportEvent::ValueChanged { peripheral, characteristic, value } => {
                if characteristic != STICK_DATA_UUID || self.session.connected().as_ref() != Some(&peripheral) {
                    debug!("Ignoring notification from {} {}", peripheral, characteristic);
                    return;
                }

                match self.gait.on_notification(&value) {
                    Ok(gait) => {
                        self.gait = gait;
                        self.publish(AppEvent::Gait(gait)).await;
                    },
                    Err(err) => warn!("Skipping telemetry from {}: {}", peripheral, err),
                }
            },
            TransportEvent::Disconnected(id) => {
                if self.session.peripheral_disconnected(&id) {
                    warn!("Connection to {} lost", id);
                }
                if self.discovered.get(&id).map_or(false, |p| p.state != ConnectionState::Disconnected) {
                    self.set_connection_state(&id, ConnectionState::Disconnected).await;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use futures::channel::mpsc::{channel, Receiver};
    use super::*;
    use crate::channel::discovery::ScanState;
    use crate::channel::toggles::ToggleState;
    use crate::device::mock::{Call, MockTransport, Op};

    fn companion(transport: &MockTransport) -> (Companion<MockTransport>, Receiver<AppEvent>) {
        let (tx, rx) = channel(256);
        let settings = ScanSettings::from(&Config::default());
        (Companion::new(Session::new(transport.clone()), settings, vec![tx]), rx)
    }

    fn found(id: &str, name: Option<&str>) -> TransportEvent {
        TransportEvent::Discovered(Peripheral::discovered(PeripheralId::from(id), name.map(String::from)))
    }

    fn drain(rx: &mut Receiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = rx.try_next() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn discovery_lists_named_peripherals_once() {
        let transport = MockTransport::new();
        let (mut app, _rx) = companion(&transport);

        app.start_scan().await.unwrap();
        app.handle_event(found("AA:BB", Some("Stick1"))).await;
        app.handle_event(found("CC:DD", None)).await;
        app.handle_event(found("AA:BB", Some("Stick1"))).await;
        app.handle_event(TransportEvent::ScanStopped).await;

        let list: Vec<_> = app.peripherals().into_iter().map(|p| (p.id, p.name)).collect();
        assert_eq!(list, vec![(PeripheralId::from("AA:BB"), Some("Stick1".to_string()))]);
        assert_eq!(app.discovered().scan_state(), ScanState::StoppedWithResults);
        assert!(matches!(transport.calls()[0], Call::Scan { allow_duplicates: false, .. }));
    }

    #[tokio::test]
    async fn scan_failure_raises_a_notice() {
        let transport = MockTransport::new();
        transport.fail(Op::Scan);
        let (mut app, _rx) = companion(&transport);

        assert!(app.start_scan().await.is_err());
        assert_eq!(app.discovered().scan_state(), ScanState::Idle);
        assert_eq!(app.take_notices().len(), 1);
        assert!(app.take_notices().is_empty());
    }

    #[tokio::test]
    async fn toggle_after_connect_writes_the_command() {
        let transport = MockTransport::new();
        let (mut app, _rx) = companion(&transport);
        let stick = PeripheralId::from("AA:BB");

        app.handle_event(found("AA:BB", Some("Stick1"))).await;
        app.connect(&stick).await.unwrap();
        app.toggle(Feature::Ras, true).await.unwrap();

        let writes = transport.writes();
        assert_eq!(writes.len(), 1);
        match &writes[0] {
            Call::Write { characteristic, bytes, .. } => {
                assert_eq!(*characteristic, STICK_DATA_UUID);
                assert_eq!(std::str::from_utf8(bytes).unwrap(), "RAS:1");
            },
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(app.toggles().get(Feature::Ras), ToggleState { intended: true, confirmed: true });
        assert_eq!(app.discovered().get(&stick).map(|p| p.state), Some(ConnectionState::Connected));
    }

    #[tokio::test]
    async fn failed_toggle_reverts_the_switch() {
        let transport = MockTransport::new();
        transport.fail(Op::Write);
        let (mut app, mut rx) = companion(&transport);

        app.connect(&PeripheralId::from("AA:BB")).await.unwrap();
        drain(&mut rx);

        assert!(app.toggle(Feature::Haptic, true).await.is_err());

        assert_eq!(app.toggles().get(Feature::Haptic), ToggleState { intended: false, confirmed: false });
        assert!(app.take_notices().is_empty());
        assert_eq!(drain(&mut rx), vec![
            AppEvent::ToggleChange(Feature::Haptic, ToggleState { intended: true, confirmed: false }),
            AppEvent::ToggleReverted(Feature::Haptic, false),
        ]);
    }

    #[tokio::test]
    async fn toggle_without_connection_sends_nothing() {
        let transport = MockTransport::new();
        let (mut app, _rx) = companion(&transport);

        let result = app.toggle(Feature::Laser, true).await;

        assert!(matches!(result, Err(SendError::NotConnected)));
        assert!(transport.writes().is_empty());
        assert!(!app.toggles().get(Feature::Laser).intended);
    }

    #[tokio::test]
    async fn subscribe_failure_is_one_connect_failure() {
        let transport = MockTransport::new();
        transport.fail(Op::Subscribe);
        let (mut app, _rx) = companion(&transport);
        let stick = PeripheralId::from("AA:BB");
        app.handle_event(found("AA:BB", Some("Stick1"))).await;

        let result = app.connect(&stick).await;

        assert!(matches!(result, Err(ConnectError::SubscribeFailed { .. })));
        assert_eq!(app.discovered().get(&stick).map(|p| p.state), Some(ConnectionState::Disconnected));
        assert_eq!(app.take_notices().len(), 1);
    }

    #[tokio::test]
    async fn telemetry_feeds_the_gait_window() {
        let transport = MockTransport::new();
        let (mut app, mut rx) = companion(&transport);
        let stick = PeripheralId::from("AA:BB");
        app.connect(&stick).await.unwrap();

        for value in [vec![5], vec![], vec![9, 1]] {
            app.handle_event(TransportEvent::ValueChanged {
                peripheral: stick.clone(),
                characteristic: STICK_DATA_UUID,
                value,
            }).await;
        }
        // other peripherals and characteristics are not ours
        app.handle_event(TransportEvent::ValueChanged {
            peripheral: PeripheralId::from("CC:DD"),
            characteristic: STICK_DATA_UUID,
            value: vec![77],
        }).await;
        app.handle_event(TransportEvent::ValueChanged {
            peripheral: stick.clone(),
            characteristic: STICK_SERVICE_UUID,
            value: vec![78],
        }).await;

        let samples = app.gait().samples();
        assert_eq!(samples.len(), 10);
        assert_eq!(&samples[8..], &[5, 9]);

        let gait_events = drain(&mut rx).into_iter().filter(|e| matches!(e, AppEvent::Gait(_))).count();
        assert_eq!(gait_events, 2);
    }

    #[tokio::test]
    async fn link_loss_marks_the_peripheral_disconnected() {
        let transport = MockTransport::new();
        let (mut app, _rx) = companion(&transport);
        let stick = PeripheralId::from("AA:BB");
        app.handle_event(found("AA:BB", Some("Stick1"))).await;
        app.connect(&stick).await.unwrap();

        app.handle_event(TransportEvent::Disconnected(stick.clone())).await;

        assert!(!app.session().is_connected());
        assert_eq!(app.discovered().get(&stick).map(|p| p.state), Some(ConnectionState::Disconnected));
        assert!(matches!(app.toggle(Feature::Ras, true).await, Err(SendError::NotConnected)));
    }

    #[tokio::test]
    async fn events_reach_every_sender() {
        let transport = MockTransport::new();
        let (tx1, mut rx1) = channel(16);
        let (tx2, mut rx2) = channel(16);
        let settings = ScanSettings::from(&Config::default());
        let mut app = Companion::new(Session::new(transport.clone()), settings, vec![tx1, tx2]);

        app.handle_event(TransportEvent::ScanStopped).await;

        assert_eq!(rx1.next().await, Some(AppEvent::ScanStateChange(ScanState::Idle)));
        assert_eq!(rx2.next().await, Some(AppEvent::ScanStateChange(ScanState::Idle)));
    }
}
