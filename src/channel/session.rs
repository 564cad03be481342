use std::sync::{Arc, Mutex};
use std::time::Duration;
use log::{info, warn};
use tokio::time::{timeout, timeout_at, Instant};
use uuid::Uuid;

use crate::channel::command::{Command, Feature};
use crate::device::constants::{CONNECT_DEADLINE, STICK_DATA_UUID, STICK_SERVICE_UUID, WRITE_DEADLINE};
use crate::device::transport::Transport;
use crate::device::types::PeripheralId;
use crate::error::{ConnectError, ScanError, SendError, TransportError};

/// The connection to at most one smart stick.
///
/// Clones share the same connected peripheral, so a clone can be handed to a task that sends
/// commands while another one connects or disconnects.
#[derive(Clone)]
pub struct Session<T: Transport> {
    transport: T,
    connected: Arc<Mutex<Option<PeripheralId>>>,
    write_deadline: Duration,
    connect_deadline: Duration,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Session {
            transport,
            connected: Arc::new(Mutex::new(None)),
            write_deadline: Duration::from_millis(WRITE_DEADLINE),
            connect_deadline: Duration::from_millis(CONNECT_DEADLINE),
        }
    }

    pub fn with_deadlines(mut self, write_deadline: Duration, connect_deadline: Duration) -> Self {
        self.write_deadline = write_deadline;
        self.connect_deadline = connect_deadline;
        self
    }

    pub fn connected(&self) -> Option<PeripheralId> {
        self.connected.lock().expect("Failed to lock Session connected").clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected().is_some()
    }

    fn set_connected(&self, id: Option<PeripheralId>) {
        *self.connected.lock().expect("Failed to lock Session connected") = id;
    }

    pub async fn scan(&self, services: &[Uuid], duration: Duration, allow_duplicates: bool) -> Result<(), ScanError> {
        info!("Scanning for {} s...", duration.as_secs());
        self.transport.scan(services, duration, allow_duplicates).await?;
        Ok(())
    }

    pub async fn stop_scan(&self) -> Result<(), ScanError> {
        self.transport.stop_scan().await?;
        Ok(())
    }

    /// Connect, retrieve services and subscribe to telemetry as one step.
    ///
    /// If anything after the transport connect fails, the peripheral is disconnected again so
    /// that the session never ends up half connected.
    pub async fn connect(&self, id: &PeripheralId) -> Result<(), ConnectError> {
        match self.connected() {
            Some(current) if &current == id => {
                info!("Already connected to {}", id);
                return Ok(());
            },
            Some(_) => {
                if let Err(err) = self.disconnect().await {
                    warn!("Failed to disconnect previous peripheral: {:?}", err);
                }
            },
            None => {},
        }

        let deadline = Instant::now() + self.connect_deadline;
        let deadline_error = || TransportError::Deadline(millis(self.connect_deadline));
        let connect_failed = |source: TransportError| ConnectError::ConnectFailed { id: id.clone(), source };

        timeout_at(deadline, self.transport.connect(id))
            .await
            .map_err(|_| deadline_error())
            .and_then(|result| result)
            .map_err(connect_failed)?;

        info!("Connected to {}; retrieving services...", id);

        let result = match timeout_at(deadline, self.transport.retrieve_services(id)).await {
            Err(_) => Err(connect_failed(deadline_error())),
            Ok(Err(source)) => Err(connect_failed(source)),
            Ok(Ok(())) => {
                match timeout_at(deadline, self.transport.subscribe(id, STICK_SERVICE_UUID, STICK_DATA_UUID)).await {
                    Err(_) => Err(ConnectError::SubscribeFailed { id: id.clone(), source: deadline_error() }),
                    Ok(Err(source)) => Err(ConnectError::SubscribeFailed { id: id.clone(), source }),
                    Ok(Ok(())) => Ok(()),
                }
            },
        };

        match result {
            Ok(()) => {
                info!("Peripheral {} ready", id);
                self.set_connected(Some(id.clone()));
                Ok(())
            },
            Err(err) => {
                warn!("{}", err);
                self.set_connected(None);
                if let Err(disconnect_err) = self.disconnect_peripheral(id).await {
                    warn!("Failed to disconnect after failed connect: {:?}", disconnect_err);
                }
                Err(err)
            },
        }
    }

    /// Returns the peripheral that was connected, if any. The session is disconnected afterwards
    /// even if the transport reports an error.
    pub async fn disconnect(&self) -> Result<Option<PeripheralId>, TransportError> {
        let current = self.connected.lock().expect("Failed to lock Session connected").take();

        if let Some(id) = &current {
            info!("Disconnecting from {}", id);
            self.disconnect_peripheral(id).await?;
        }

        Ok(current)
    }

    // a dead link must not stall the caller, so this shares the connect deadline
    async fn disconnect_peripheral(&self, id: &PeripheralId) -> Result<(), TransportError> {
        match timeout(self.connect_deadline, self.transport.disconnect(id)).await {
            Err(_) => Err(TransportError::Deadline(millis(self.connect_deadline))),
            Ok(result) => result,
        }
    }

    /// The transport reported that `id` dropped its connection. Returns true if it was ours.
    pub fn peripheral_disconnected(&self, id: &PeripheralId) -> bool {
        let mut connected = self.connected.lock().expect("Failed to lock Session connected");
        if connected.as_ref() == Some(id) {
            *connected = None;
            return true;
        }
        false
    }

    /// Write one feature command to the connected stick. Sends are not queued; concurrent sends
    /// race at the transport.
    pub async fn send(&self, feature: Feature, enabled: bool) -> Result<(), SendError> {
        let id = self.connected().ok_or(SendError::NotConnected)?;
        let command = Command::new(feature, enabled);
        let bytes = command.encode();

        info!("Sending {} to {}", command, id);

        let result = match timeout(self.write_deadline, self.transport.write(&id, STICK_SERVICE_UUID, STICK_DATA_UUID, &bytes)).await {
            Err(_) => Err(TransportError::Deadline(millis(self.write_deadline))),
            Ok(result) => result,
        };

        if let Err(err) = result {
            warn!("Failed to send {} to data characteristic: {:?}", command, err);
            return Err(SendError::TransportFailure { source: err });
        }

        Ok(())
    }
}
