use futures::StreamExt;
use futures::channel::mpsc::{channel, Sender};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::chart::{render_chart, CHART_HEIGHT};
use crate::app::types::AppEvent;
use crate::channel::discovery::ScanState;

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// One line of output for an event, or None for events that are not shown.
pub fn describe(event: &AppEvent) -> Option<String> {
    let line = match event {
        AppEvent::ScanStateChange(ScanState::Scanning) => "Scanning…".to_string(),
        AppEvent::ScanStateChange(ScanState::StoppedWithResults) => "Scan finished".to_string(),
        AppEvent::ScanStateChange(ScanState::Idle) => "Scan finished, no sticks found".to_string(),
        AppEvent::PeripheralFound(peripheral) => format!(
            "Found {} ({})",
            peripheral.name.as_deref().unwrap_or_default(),
            peripheral.id,
        ),
        AppEvent::ConnectionChange(id, state) => format!("{}: {}", id, state),
        AppEvent::ToggleChange(feature, state) => {
            if state.is_pending() {
                format!("{} switching {}…", feature, on_off(state.intended))
            } else {
                format!("{} is {}", feature, on_off(state.confirmed))
            }
        },
        AppEvent::ToggleReverted(feature, enabled) => {
            format!("{} could not be switched; still {}", feature, on_off(*enabled))
        },
        // notices are shown by the application, which also waits for them to be acknowledged
        AppEvent::Gait(_) | AppEvent::Notice(_) => return None,
    };

    Some(line)
}

/// Print app events to stdout until cancelled. With `show_chart` every gait update redraws the
/// chart.
pub fn printer_task(cancel: CancellationToken, show_chart: bool) -> (Sender<AppEvent>, JoinHandle<()>) {
    let (tx, mut rx) = channel::<AppEvent>(128);

    let handle = spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = rx.next() => match event {
                    None => break 'mainloop,
                    Some(AppEvent::Gait(series)) => {
                        if show_chart {
                            println!("{}", render_chart(&series, CHART_HEIGHT));
                        }
                    },
                    Some(event) => {
                        if let Some(line) = describe(&event) {
                            println!("{}", line);
                        }
                    },
                },
            }
        }
    });

    (tx, handle)
}
