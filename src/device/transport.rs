use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::device::types::{PeripheralId, TransportEvent};
use crate::error::TransportError;

/// The bluetooth capabilities the command & telemetry channel relies on.
///
/// Every request completes (or fails) on its own; none of them block the others, so callers may
/// have several in flight at once. Asynchronous results such as discoveries and notifications
/// are delivered through [`Transport::events`].
pub trait Transport: Clone + Send + Sync + 'static {
    /// Start scanning for peripherals that advertise one of `services`. The transport stops the
    /// scan by itself after `duration` and then emits [`TransportEvent::ScanStopped`].
    fn scan(
        &self,
        services: &[Uuid],
        duration: Duration,
        allow_duplicates: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn stop_scan(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn connect(&self, id: &PeripheralId) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disconnect(&self, id: &PeripheralId) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Must complete before [`Transport::subscribe`] is called for the same peripheral.
    fn retrieve_services(&self, id: &PeripheralId) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn subscribe(
        &self,
        id: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn write(
        &self,
        id: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Register a new listener. It receives every event emitted after this call, in order.
    fn events(&self) -> UnboundedReceiver<TransportEvent>;
}

/// Fan-out of transport events to any number of listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<UnboundedSender<TransportEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn listen(&self) -> UnboundedReceiver<TransportEvent> {
        let (tx, rx) = unbounded();
        self.listeners.lock().expect("Failed to lock EventBus listeners").push(tx);
        rx
    }

    pub fn emit(&self, event: TransportEvent) {
        let mut listeners = self.listeners.lock().expect("Failed to lock EventBus listeners");
        // listeners whose receiver was dropped are removed here
        listeners.retain(|listener| listener.unbounded_send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("Failed to lock EventBus listeners").len()
    }
}
