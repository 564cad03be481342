use crate::channel::command::{Command, Feature};
use crate::device::types::TransportEvent;

#[derive(Debug, Clone)]
pub enum Message {
    Transport(TransportEvent),
    Input(String),
    InputClosed,
}

/// A line typed in interactive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Scan,
    StopScan,
    List,
    // index into the list (1 based) or a peripheral id
    Connect(String),
    Disconnect,
    Toggle(Feature, bool),
    Chart,
    Status,
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
commands:
  scan                      scan for nearby sticks
  stop                      stop scanning
  list                      show discovered sticks
  connect <number|id>       connect to a stick and start telemetry
  disconnect                disconnect from the stick
  ras|haptic|laser on|off   switch a feature
  RAS:1, HAP:0, ...         send a device command as is
  chart                     show the gait chart
  status                    show connection and switch state
  quit";

impl Input {
    pub fn parse(line: &str) -> Result<Input, String> {
        let words: Vec<&str> = line.split_whitespace().collect();

        let input = match words.as_slice() {
            [] => Input::Empty,
            ["scan"] => Input::Scan,
            ["stop"] => Input::StopScan,
            ["list"] | ["ls"] => Input::List,
            ["connect", target] => Input::Connect(target.to_string()),
            ["disconnect"] => Input::Disconnect,
            ["chart"] => Input::Chart,
            ["status"] => Input::Status,
            ["help"] | ["?"] => Input::Help,
            ["quit"] | ["exit"] | ["q"] => Input::Quit,
            [literal] if literal.contains(':') => {
                let command = Command::parse(literal).map_err(|err| err.to_string())?;
                Input::Toggle(command.feature, command.enabled)
            },
            [feature, state] => {
                let feature = feature.parse::<Feature>().map_err(|err| err.to_string())?;
                let enabled = match *state {
                    "on" | "1" => true,
                    "off" | "0" => false,
                    _ => return Err(format!("Expected on or off, got {}", state)),
                };
                Input::Toggle(feature, enabled)
            },
            _ => return Err(format!("Unknown command: {}", line.trim())),
        };

        Ok(input)
    }
}
