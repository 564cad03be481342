use futures::StreamExt;
use log::{debug, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::transport::Transport;
use crate::device::types::TransportEvent;

/// A registered transport event handler.
///
/// The handler runs on its own task from [`EventScope::register`] until [`EventScope::close`]
/// returns (or the scope is dropped). Once `close` has returned the handler is never invoked
/// again.
pub struct EventScope {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl EventScope {
    pub fn register<T, F>(transport: &T, cancel: CancellationToken, mut handler: F) -> EventScope
    where
        T: Transport,
        F: FnMut(TransportEvent) + Send + 'static,
    {
        let mut events = transport.events();
        let task_cancel = cancel.clone();

        let handle = spawn(async move {
            'mainloop: loop {
                tokio::select! {
                    biased;

                    _ = task_cancel.cancelled() => {
                        break 'mainloop;
                    },
                    event = events.next() => match event {
                        Some(event) => handler(event),
                        None => break 'mainloop,
                    },
                }
            }
            debug!("Event listener stopped");
        });

        EventScope { cancel, handle: Some(handle) }
    }

    /// Deregister the handler and wait for its task to finish.
    pub async fn close(mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("Event listener task failed: {:?}", err);
            }
        }
    }
}

impl Drop for EventScope {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use super::*;
    use crate::device::mock::MockTransport;
    use crate::device::types::PeripheralId;

    #[tokio::test(start_paused = true)]
    async fn handler_stops_after_close() {
        let transport = MockTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();

        let scope = EventScope::register(&transport, CancellationToken::new(), move |event| {
            seen2.lock().unwrap().push(event);
        });

        transport.emit(TransportEvent::ScanStopped);
        tokio::time::sleep(Duration::from_millis(20)).await;
        scope.close().await;

        transport.emit(TransportEvent::Disconnected(PeripheralId::from("AA:BB")));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*seen.lock().unwrap(), vec![TransportEvent::ScanStopped]);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancel_deregisters() {
        let transport = MockTransport::new();
        let cancel = CancellationToken::new();
        let count = Arc::new(Mutex::new(0));
        let count2 = count.clone();

        let scope = EventScope::register(&transport, cancel.child_token(), move |_| {
            *count2.lock().unwrap() += 1;
        });

        cancel.cancel();
        scope.close().await;
        transport.emit(TransportEvent::ScanStopped);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*count.lock().unwrap(), 0);
    }
}
