use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use futures::channel::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::device::transport::{EventBus, Transport};
use crate::device::types::{PeripheralId, TransportEvent};
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Scan { services: Vec<Uuid>, duration: Duration, allow_duplicates: bool },
    StopScan,
    Connect(PeripheralId),
    Disconnect(PeripheralId),
    RetrieveServices(PeripheralId),
    Subscribe { id: PeripheralId, service: Uuid, characteristic: Uuid },
    Write { id: PeripheralId, service: Uuid, characteristic: Uuid, bytes: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Scan,
    Connect,
    Disconnect,
    RetrieveServices,
    Subscribe,
    Write,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    failing: HashSet<Op>,
    hanging: HashSet<Op>,
}

/// Records every request and answers from a script of failing/hanging operations.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    bus: EventBus,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    pub fn fail(&self, op: Op) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn hang(&self, op: Op) {
        self.state.lock().unwrap().hanging.insert(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|call| matches!(call, Call::Write { .. })).collect()
    }

    pub fn emit(&self, event: TransportEvent) {
        self.bus.emit(event);
    }

    async fn record(&self, call: Call, op: Option<Op>) -> Result<(), TransportError> {
        let (fails, hangs) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            match op {
                Some(op) => (state.failing.contains(&op), state.hanging.contains(&op)),
                None => (false, false),
            }
        };

        if hangs {
            futures::future::pending::<()>().await;
        }
        if fails {
            return Err(TransportError::Btle { source: btleplug::Error::NotConnected });
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    async fn scan(&self, services: &[Uuid], duration: Duration, allow_duplicates: bool) -> Result<(), TransportError> {
        let call = Call::Scan { services: services.to_vec(), duration, allow_duplicates };
        self.record(call, Some(Op::Scan)).await
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.record(Call::StopScan, None).await?;
        self.bus.emit(TransportEvent::ScanStopped);
        Ok(())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<(), TransportError> {
        self.record(Call::Connect(id.clone()), Some(Op::Connect)).await
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<(), TransportError> {
        self.record(Call::Disconnect(id.clone()), Some(Op::Disconnect)).await
    }

    async fn retrieve_services(&self, id: &PeripheralId) -> Result<(), TransportError> {
        self.record(Call::RetrieveServices(id.clone()), Some(Op::RetrieveServices)).await
    }

    async fn subscribe(&self, id: &PeripheralId, service: Uuid, characteristic: Uuid) -> Result<(), TransportError> {
        let call = Call::Subscribe { id: id.clone(), service, characteristic };
        self.record(call, Some(Op::Subscribe)).await
    }

    async fn write(&self, id: &PeripheralId, service: Uuid, characteristic: Uuid, bytes: &[u8]) -> Result<(), TransportError> {
        let call = Call::Write { id: id.clone(), service, characteristic, bytes: bytes.to_vec() };
        self.record(call, Some(Op::Write)).await
    }

    fn events(&self) -> UnboundedReceiver<TransportEvent> {
        self.bus.listen()
    }
}
