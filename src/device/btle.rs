use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral as BtlePeripheral};
use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::device::transport::{EventBus, Transport};
use crate::device::types::{Peripheral, PeripheralId, TransportEvent};
use crate::error::TransportError;

/// The running scan, numbered so that the timer of a replaced scan can not end its successor.
#[derive(Default)]
struct ScanSlot {
    current: Mutex<Option<(u64, CancellationToken)>>,
    counter: AtomicU64,
}

impl ScanSlot {
    /// Make a new scan the running one, cancelling the scan it replaces.
    fn begin(&self, parent: &CancellationToken) -> (u64, CancellationToken) {
        let scan = self.counter.fetch_add(1, Ordering::SeqCst);
        let cancel = parent.child_token();
        let previous = self.current.lock().expect("Failed to lock scan state").replace((scan, cancel.clone()));
        if let Some((_, previous)) = previous {
            previous.cancel();
        }
        (scan, cancel)
    }

    /// Forget `scan` if it is still the running one. Returns false if another scan took its place.
    fn end(&self, scan: u64) -> bool {
        let mut current = self.current.lock().expect("Failed to lock scan state");
        if current.as_ref().map_or(false, |(running, _)| *running == scan) {
            current.take();
            return true;
        }
        false
    }

    /// Cancel and forget the running scan, whichever it is.
    fn stop(&self) {
        let current = self.current.lock().expect("Failed to lock scan state").take();
        if let Some((_, current)) = current {
            current.cancel();
        }
    }

    fn is_active(&self) -> bool {
        self.current.lock().expect("Failed to lock scan state").is_some()
    }
}

struct BtleInner {
    adapters: Vec<Adapter>,
    bus: EventBus,
    // cancelled when the transport is shut down
    cancel: CancellationToken,
    scan: ScanSlot,
    allow_duplicates: AtomicBool,
    // peripherals already reported (with a name) during the current scan
    reported: Mutex<HashSet<PeripheralId>>,
    notification_tasks: Mutex<HashMap<PeripheralId, CancellationToken>>,
}

/// A [`Transport`] backed by the platform bluetooth stack through btleplug.
#[derive(Clone)]
pub struct BtleTransport {
    inner: Arc<BtleInner>,
}

fn to_peripheral_id(id: &btleplug::platform::PeripheralId) -> PeripheralId {
    PeripheralId::new(id.to_string())
}

impl BtleTransport {
    pub async fn new(cancel: CancellationToken) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        if adapters.is_empty() {
            return Err(TransportError::NoAdapter);
        }

        for adapter in &adapters {
            info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        }

        let transport = BtleTransport {
            inner: Arc::new(BtleInner {
                adapters,
                bus: EventBus::new(),
                cancel,
                scan: ScanSlot::default(),
                allow_duplicates: AtomicBool::new(false),
                reported: Mutex::new(HashSet::new()),
                notification_tasks: Mutex::new(HashMap::new()),
            }),
        };

        for adapter in &transport.inner.adapters {
            let events = adapter.events().await?;
            transport.central_events_task(adapter.clone(), events);
        }

        Ok(transport)
    }

    fn central_events_task(
        &self,
        adapter: Adapter,
        mut events: std::pin::Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
    ) {
        let transport = self.clone();
        let cancel = self.inner.cancel.clone();

        spawn(async move {
            'mainloop: loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break 'mainloop;
                    },
                    event = events.next() => match event {
                        None => break 'mainloop,
                        Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                            transport.report_discovery(&adapter, &id).await;
                        },
                        Some(CentralEvent::DeviceDisconnected(id)) => {
                            let id = to_peripheral_id(&id);
                            info!("Peripheral {} disconnected", id);
                            transport.stop_notifications(&id);
                            transport.inner.bus.emit(TransportEvent::Disconnected(id));
                        },
                        Some(_) => {},
                    }
                }
            }
            debug!("Adapter event task stopped");
        });
    }

    async fn report_discovery(&self, adapter: &Adapter, id: &btleplug::platform::PeripheralId) {
        if !self.inner.scan.is_active() {
            return;
        }

        let peripheral = match adapter.peripheral(id).await {
            Ok(peripheral) => peripheral,
            Err(err) => {
                warn!("Could not look up discovered peripheral: {:?}", err);
                return;
            },
        };

        let name = match peripheral.properties().await {
            Ok(Some(properties)) => properties.local_name,
            Ok(None) => None,
            Err(err) => {
                warn!("Could not query peripheral for properties: {:?}", err);
                return;
            },
        };

        let id = to_peripheral_id(id);

        if name.is_some() && !self.inner.allow_duplicates.load(Ordering::SeqCst) {
            let mut reported = self.inner.reported.lock().expect("Failed to lock reported set");
            if !reported.insert(id.clone()) {
                return;
            }
        }

        debug!("Discovered {} {:?}", id, name);
        self.inner.bus.emit(TransportEvent::Discovered(Peripheral::discovered(id, name)));
    }

    async fn find_peripheral(&self, id: &PeripheralId) -> Result<BtlePeripheral, TransportError> {
        for adapter in &self.inner.adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            if let Some(peripheral) = peripherals.into_iter().find(|p| p.id().to_string() == id.as_str()) {
                return Ok(peripheral);
            }
        }

        Err(TransportError::UnknownPeripheral(id.clone()))
    }

    fn find_characteristic(
        peripheral: &BtlePeripheral,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic, TransportError> {
        peripheral.services()
            .iter()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.uuid == characteristic)
            .cloned()
            .ok_or(TransportError::MissingCharacteristic { service, characteristic })
    }

    async fn stop_adapters(&self) -> Result<(), TransportError> {
        for adapter in &self.inner.adapters {
            adapter.stop_scan().await?;
        }
        Ok(())
    }

    fn stop_notifications(&self, id: &PeripheralId) {
        let task = self.inner.notification_tasks.lock().expect("Failed to lock notification tasks").remove(id);
        if let Some(cancel) = task {
            cancel.cancel();
        }
    }

    fn read_notifications_task(&self, id: PeripheralId, peripheral: BtlePeripheral, characteristic: Uuid) {
        let cancel = self.inner.cancel.child_token();
        let previous = self.inner.notification_tasks
            .lock()
            .expect("Failed to lock notification tasks")
            .insert(id.clone(), cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let bus = self.inner.bus.clone();

        spawn(async move {
            let mut notification_stream = match peripheral.notifications().await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("Could not get notification stream of {}: {:?}", id, err);
                    return;
                },
            };

            'mainloop: loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break 'mainloop;
                    },
                    data = notification_stream.next() => match data {
                        None => break 'mainloop,
                        Some(data) => {
                            if data.uuid == characteristic {
                                bus.emit(TransportEvent::ValueChanged {
                                    peripheral: id.clone(),
                                    characteristic: data.uuid,
                                    value: data.value,
                                });
                            }
                        },
                    }
                }
            }

            info!("Notification task for {} stopped", id);
        });
    }
}

impl Transport for BtleTransport {
    async fn scan(&self, services: &[Uuid], duration: Duration, allow_duplicates: bool) -> Result<(), TransportError> {
        let filter = ScanFilter {
            services: services.to_vec(),
        };

        self.inner.allow_duplicates.store(allow_duplicates, Ordering::SeqCst);
        self.inner.reported.lock().expect("Failed to lock reported set").clear();

        let (scan, scan_cancel) = self.inner.scan.begin(&self.inner.cancel);

        for adapter in &self.inner.adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            if let Err(err) = adapter.start_scan(filter.clone()).await {
                self.inner.scan.end(scan);
                return Err(err.into());
            }
        }

        let transport = self.clone();
        spawn(async move {
            tokio::select! {
                _ = scan_cancel.cancelled() => {},
                _ = sleep(duration) => {
                    if !transport.inner.scan.end(scan) {
                        debug!("Scan {} was replaced before its window elapsed", scan);
                        return;
                    }

                    if let Err(err) = transport.stop_adapters().await {
                        warn!("Failed to stop scanning: {:?}", err);
                    }
                    info!("Scan window elapsed");
                    transport.inner.bus.emit(TransportEvent::ScanStopped);
                },
            }
        });

        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.inner.scan.stop();

        self.stop_adapters().await?;
        self.inner.bus.emit(TransportEvent::ScanStopped);
        Ok(())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        info!("Connecting to peripheral {}...", id);
        peripheral.connect().await?;
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<(), TransportError> {
        self.stop_notifications(id);
        let peripheral = self.find_peripheral(id).await?;
        info!("Disconnecting from peripheral {}...", id);
        peripheral.disconnect().await?;
        Ok(())
    }

    async fn retrieve_services(&self, id: &PeripheralId) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        info!("Discovering services of {}...", id);
        peripheral.discover_services().await?;
        Ok(())
    }

    async fn subscribe(&self, id: &PeripheralId, service: Uuid, characteristic: Uuid) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        let data_char = Self::find_characteristic(&peripheral, service, characteristic)?;

        info!("Subscribing to characteristic {:?} {:?}", service, characteristic);
        peripheral.subscribe(&data_char).await?;
        self.read_notifications_task(id.clone(), peripheral, characteristic);
        Ok(())
    }

    async fn write(&self, id: &PeripheralId, service: Uuid, characteristic: Uuid, bytes: &[u8]) -> Result<(), TransportError> {
        let peripheral = self.find_peripheral(id).await?;
        let data_char = Self::find_characteristic(&peripheral, service, characteristic)?;
        peripheral.write(&data_char, bytes, WriteType::WithResponse).await?;
        Ok(())
    }

    fn events(&self) -> UnboundedReceiver<TransportEvent> {
        self.inner.bus.listen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_scan_cancels_the_previous_one() {
        let parent = CancellationToken::new();
        let slot = ScanSlot::default();

        let (_, first) = slot.begin(&parent);
        let (_, second) = slot.begin(&parent);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(slot.is_active());
    }

    #[test]
    fn stale_timer_does_not_end_the_next_scan() {
        let parent = CancellationToken::new();
        let slot = ScanSlot::default();

        let (first, _) = slot.begin(&parent);
        let (second, _) = slot.begin(&parent);

        assert!(!slot.end(first));
        assert!(slot.is_active());
        assert!(slot.end(second));
        assert!(!slot.is_active());
    }

    #[test]
    fn stop_cancels_whatever_runs() {
        let parent = CancellationToken::new();
        let slot = ScanSlot::default();
        let (scan, cancel) = slot.begin(&parent);

        slot.stop();

        assert!(cancel.is_cancelled());
        assert!(!slot.end(scan));
    }
}
