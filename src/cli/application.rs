use std::time::Duration;
use futures::StreamExt;
use futures::channel::mpsc::{unbounded, Sender, UnboundedReceiver, UnboundedSender};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::app::chart::{render_chart, CHART_HEIGHT};
use crate::app::companion::{Companion, ScanSettings};
use crate::app::types::AppEvent;
use crate::channel::command::Feature;
use crate::channel::discovery::ScanState;
use crate::channel::session::Session;
use crate::cli::args::{Args, CliCommand};
use crate::cli::printer::printer_task;
use crate::cli::types::{Input, Message, HELP};
use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::btle::BtleTransport;
use crate::device::listener::EventScope;
use crate::device::transport::Transport;
use crate::device::types::{PeripheralId, TransportEvent};
use crate::error::{AppRunError, SendError};

pub struct CliApplication<T: Transport> {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    config_io: ConfigIO,
    config: Config,

    companion: Companion<T>,
    events_scope: Option<EventScope>,
    messages: UnboundedReceiver<Message>,
    message_sender: UnboundedSender<Message>,

    // a notice was shown and the next input line acknowledges it
    awaiting_ack: bool,
}

impl<T: Transport> CliApplication<T> {
    pub fn new(
        app_cancel: CancellationToken,
        transport: T,
        config_io: ConfigIO,
        config: Config,
        senders: Vec<Sender<AppEvent>>,
    ) -> Self {
        let session = Session::new(transport.clone()).with_deadlines(
            Duration::from_millis(config.write_deadline_ms),
            Duration::from_millis(config.connect_deadline_ms),
        );
        let companion = Companion::new(session, ScanSettings::from(&config), senders);

        let (message_sender, messages) = unbounded::<Message>();
        let transport_sender = message_sender.clone();
        let events_scope = EventScope::register(&transport, app_cancel.child_token(), move |event| {
            // the receiver only goes away on shutdown
            let _ = transport_sender.unbounded_send(Message::Transport(event));
        });

        CliApplication {
            app_cancel,
            config_io,
            config,
            companion,
            events_scope: Some(events_scope),
            messages,
            message_sender,
            awaiting_ack: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn companion(&self) -> &Companion<T> {
        &self.companion
    }

    pub async fn run(&mut self, command: CliCommand) -> Result<(), AppRunError> {
        match command {
            CliCommand::Scan => self.run_scan().await,
            CliCommand::Toggle { feature, state, device } => self.run_toggle(feature, state.enabled(), device).await,
            CliCommand::Monitor { device, seconds } => self.run_monitor(device, seconds).await,
            CliCommand::Interactive => self.run_interactive().await,
        }
    }

    /// Handle transport events until `done` returns true for one of them, or no more events can
    /// arrive.
    async fn pump_until<F>(&mut self, mut done: F)
    where
        F: FnMut(&Companion<T>, &TransportEvent) -> bool,
    {
        while let Some(message) = self.messages.next().await {
            if let Message::Transport(event) = message {
                self.companion.handle_event(event.clone()).await;
                if done(&self.companion, &event) {
                    return;
                }
            }
        }
    }

    async fn remember(&mut self, id: &PeripheralId) {
        if self.config.remember_peripheral(id) {
            if let Err(err) = self.config_io.save(&self.config).await {
                error!("Failed to save config: {:?}", &err);
            }
        }
    }

    /// Connect to `device`, or the remembered stick. Scans first if the stick has not been seen
    /// yet.
    pub async fn find_and_connect(&mut self, device: Option<String>) -> Result<PeripheralId, AppRunError> {
        let id = device
            .map(PeripheralId::new)
            .or_else(|| self.config.last_peripheral())
            .ok_or(AppRunError::NoDevice)?;

        if self.companion.discovered().get(&id).is_none() {
            self.companion.start_scan().await?;

            let wanted = id.clone();
            self.pump_until(|_, event| match event {
                TransportEvent::Discovered(peripheral) => peripheral.id == wanted,
                TransportEvent::ScanStopped => true,
                _ => false,
            }).await;

            if self.companion.discovered().scan_state() == ScanState::Scanning {
                if let Err(err) = self.companion.stop_scan().await {
                    warn!("Failed to stop scanning: {:?}", err);
                }
            }

            if self.companion.discovered().get(&id).is_none() {
                warn!("{} was not seen while scanning; trying to connect anyway", id);
            }
        }

        self.companion.connect(&id).await?;
        self.remember(&id).await;
        Ok(id)
    }

    async fn run_scan(&mut self) -> Result<(), AppRunError> {
        self.companion.start_scan().await?;
        self.pump_until(|_, event| *event == TransportEvent::ScanStopped).await;
        self.print_list();
        Ok(())
    }

    async fn run_toggle(&mut self, feature: Feature, enabled: bool, device: Option<String>) -> Result<(), AppRunError> {
        self.find_and_connect(device).await?;
        let result = self.companion.toggle(feature, enabled).await;
        self.companion.disconnect().await;
        result?;
        Ok(())
    }

    async fn run_monitor(&mut self, device: Option<String>, seconds: Option<u64>) -> Result<(), AppRunError> {
        let id = self.find_and_connect(device).await?;
        let deadline = seconds.map(|seconds| Instant::now() + Duration::from_secs(seconds));

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        'mainloop: loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted");
                    break 'mainloop;
                },
                _ = async {
                    match deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => futures::future::pending().await,
                    }
                } => {
                    break 'mainloop;
                },
                message = self.messages.next() => match message {
                    None => break 'mainloop,
                    Some(Message::Transport(event)) => {
                        let lost = event == TransportEvent::Disconnected(id.clone());
                        self.companion.handle_event(event).await;
                        if lost {
                            return Err(AppRunError::ConnectionLost(id));
                        }
                    },
                    Some(_) => {},
                },
            }
        }

        self.companion.disconnect().await;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<(), AppRunError> {
        let stdin_handle = stdin_task(self.app_cancel.child_token(), self.message_sender.clone());
        println!("{}", HELP);

        if let Some(id) = self.config.last_peripheral() {
            println!("Last stick: {} (connect {})", id, id);
        }

        while let Some(message) = self.messages.next().await {
            match message {
                Message::Transport(event) => self.companion.handle_event(event).await,
                Message::InputClosed => break,
                Message::Input(line) => {
                    if self.awaiting_ack {
                        self.awaiting_ack = false;
                        continue;
                    }

                    match Input::parse(&line) {
                        Err(message) => println!("{}", message),
                        Ok(Input::Quit) => break,
                        Ok(input) => self.handle_input(input).await,
                    }
                    self.show_notices();
                },
            }
        }

        stdin_handle.abort();
        Ok(())
    }

    async fn handle_input(&mut self, input: Input) {
        match input {
            Input::Scan => {
                // failures become notices
                let _ = self.companion.start_scan().await;
            },
            Input::StopScan => {
                if let Err(err) = self.companion.stop_scan().await {
                    warn!("Failed to stop scanning: {:?}", err);
                }
            },
            Input::List => self.print_list(),
            Input::Connect(target) => {
                let id = self.resolve_target(&target);
                if self.companion.connect(&id).await.is_ok() {
                    self.remember(&id).await;
                }
            },
            Input::Disconnect => self.companion.disconnect().await,
            Input::Toggle(feature, enabled) => {
                if let Err(SendError::NotConnected) = self.companion.toggle(feature, enabled).await {
                    println!("Not connected to a stick");
                }
            },
            Input::Chart => println!("{}", render_chart(self.companion.gait(), CHART_HEIGHT)),
            Input::Status => self.print_status(),
            Input::Help => println!("{}", HELP),
            Input::Quit | Input::Empty => {},
        }
    }

    // "2" picks the second listed stick, anything else is taken as an id
    fn resolve_target(&self, target: &str) -> PeripheralId {
        if let Ok(index) = target.parse::<usize>() {
            if let Some(peripheral) = index.checked_sub(1).and_then(|i| self.companion.peripherals().into_iter().nth(i)) {
                return peripheral.id;
            }
        }
        PeripheralId::new(target)
    }

    fn show_notices(&mut self) {
        let notices = self.companion.take_notices();
        if notices.is_empty() {
            return;
        }

        for notice in &notices {
            println!("!! {}", notice);
        }
        println!("(press enter to continue)");
        self.awaiting_ack = true;
    }

    fn print_list(&self) {
        let peripherals = self.companion.peripherals();
        if peripherals.is_empty() {
            println!("No sticks found");
            return;
        }

        for (index, peripheral) in peripherals.iter().enumerate() {
            println!(
                "{:>2}. {:<24} {:<40} {}",
                index + 1,
                peripheral.name.as_deref().unwrap_or_default(),
                peripheral.id,
                peripheral.state,
            );
        }
    }

    fn print_status(&self) {
        match self.companion.session().connected() {
            Some(id) => println!("Connected to {}, last gait sample {}", id, self.companion.gait().latest()),
            None => println!("Not connected"),
        }

        for feature in Feature::ALL {
            let state = self.companion.toggles().get(feature);
            let pending = if state.is_pending() { " (pending)" } else { "" };
            println!("{:<7} {}{}", feature, if state.intended { "on" } else { "off" }, pending);
        }
    }

    /// Deregister from the transport and disconnect. Events that arrive afterwards are not
    /// handled.
    pub async fn shutdown(mut self) {
        if let Some(scope) = self.events_scope.take() {
            scope.close().await;
        }
        self.companion.disconnect().await;
    }
}

fn stdin_task(cancel: CancellationToken, sender: UnboundedSender<Message>) -> JoinHandle<()> {
    spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                line = lines.next_line() => {
                    let message = match line {
                        Ok(Some(line)) => Message::Input(line),
                        Ok(None) => Message::InputClosed,
                        Err(err) => {
                            warn!("Failed to read from stdin: {:?}", err);
                            Message::InputClosed
                        },
                    };

                    let closed = matches!(message, Message::InputClosed);
                    if sender.unbounded_send(message).is_err() || closed {
                        break 'mainloop;
                    }
                },
            }
        }
    })
}

pub async fn run_cli(args: Args) -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync()?;
    let mut instance_lock = config_io.instance_lock()?;
    let _lock_guard = instance_lock.acquire()?;
    let config = config_io.read_or_default().await;

    let command = args.command.unwrap_or(CliCommand::Interactive);
    let show_chart = matches!(command, CliCommand::Monitor { .. });

    let app_cancel = CancellationToken::new();
    let (printer_sender, printer_handle) = printer_task(app_cancel.child_token(), show_chart);
    let transport = BtleTransport::new(app_cancel.clone()).await?;

    let mut app = CliApplication::new(app_cancel.clone(), transport, config_io.clone(), config, vec![printer_sender]);
    let result = app.run(command).await;
    app.shutdown().await;

    // the printer stops once every sender is gone
    if let Err(err) = printer_handle.await {
        warn!("Printer task failed: {:?}", err);
    }
    app_cancel.cancel();

    result
}
