use clap::{Parser, Subcommand, ValueEnum};

use crate::channel::command::Feature;

#[derive(Parser, Debug)]
#[command(name = "smartstick", version, about = "Companion for the smart stick: scan, connect, switch cueing features and watch gait telemetry")]
pub struct Args {
    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Scan for nearby peripherals and list the named ones
    Scan,

    /// Switch one feature of the stick on or off
    Toggle {
        /// ras, haptic or laser
        feature: Feature,

        state: Switch,

        /// Peripheral id; defaults to the last connected stick
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Connect and chart gait telemetry until interrupted
    Monitor {
        /// Peripheral id; defaults to the last connected stick
        #[arg(short, long)]
        device: Option<String>,

        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// Read commands from stdin (default)
    Interactive,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn enabled(&self) -> bool {
        *self == Switch::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toggle() {
        let args = Args::try_parse_from(["smartstick", "toggle", "haptic", "on", "--device", "AA:BB"]).unwrap();

        match args.command {
            Some(CliCommand::Toggle { feature, state, device }) => {
                assert_eq!(feature, Feature::Haptic);
                assert!(state.enabled());
                assert_eq!(device.as_deref(), Some("AA:BB"));
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_feature() {
        assert!(Args::try_parse_from(["smartstick", "toggle", "buzzer", "on"]).is_err());
    }

    #[test]
    fn interactive_is_optional() {
        let args = Args::try_parse_from(["smartstick", "-v"]).unwrap();
        assert!(args.verbose);
        assert!(args.command.is_none());
    }
}
