//! Operator console.
//!
//! Reads one command per line and dispatches it to the control surface:
//! `start`, `stop`, `restart`, `status`, `prices`, `quit` (also `exit`).
//! Every command yields a one-line or multi-line reply; nothing here can panic the
//! process.
use std::io::{BufRead, Write};

use log::{info, warn};
use market_common::Result;
use strum_macros::{Display, EnumString};

use crate::control::{ControlError, SimulationController};

/// Commands understood by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ConsoleCommand {
    /// Start the simulation.
    Start,
    /// Stop the simulation.
    Stop,
    /// Restart the simulation.
    Restart,
    /// Print configuration and live state as JSON.
    Status,
    /// Print current prices.
    Prices,
    /// Leave the console.
    #[strum(to_string = "quit", serialize = "exit")]
    Quit,
}

/// Run `command` and render the reply.
pub fn execute(controller: &SimulationController, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Start => render(controller.start().map(|outcome| outcome.to_string())),
        ConsoleCommand::Stop => render(controller.stop().map(|outcome| outcome.to_string())),
        ConsoleCommand::Restart => render(controller.restart().map(|()| String::from("restarted"))),
        ConsoleCommand::Status => match serde_json::to_string_pretty(&controller.status()) {
            Ok(json) => json,
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Prices => match controller.current_prices() {
            Ok(instruments) => instruments
                .iter()
                .map(|i| format!("{:<6} {:>12} (prev {})", i.symbol, i.current_price, i.previous_price))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("error: {}", e),
        },
        ConsoleCommand::Quit => String::from("bye"),
    }
}

fn render(result: std::result::Result<String, ControlError>) -> String {
    match result {
        Ok(reply) => reply,
        Err(e) => format!("error: {}", e),
    }
}

/// Serve commands from `input` until `quit` or end of input.
///
/// Returns true when the operator asked to quit, false when the input ran out.
pub fn run_console<R: BufRead, W: Write>(controller: &SimulationController, input: R, mut output: W) -> Result<bool> {
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let command = match trimmed.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(_) => {
                warn!("Unknown console command: {}", trimmed);
                writeln!(output, "unknown command '{}'; try start, stop, restart, status, prices, quit", trimmed)?;
                continue;
            }
        };
        info!("Console command: {}", command);
        writeln!(output, "{}", execute(controller, command))?;
        if command == ConsoleCommand::Quit {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use crate::store::InMemoryInstrumentStore;
    use chrono::Utc;
    use market_common::SimulationConfig;
    use std::sync::Arc;

    fn controller() -> SimulationController {
        SimulationController::builder(
            SimulationConfig {
                interval_seconds: 60.0,
                ..SimulationConfig::default()
            },
            Arc::new(InMemoryInstrumentStore::with_default_listing(Utc::now())),
            Arc::new(BroadcastHub::default()),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn commands_parse_case_insensitively() {
        assert_eq!("RESTART".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Restart);
        assert_eq!("exit".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
        assert!("launch".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn script_drives_the_controller() {
        let controller = controller();
        let script = "start\nstart\nbogus\nstop\nstop\nquit\nstart\n";
        let mut output = Vec::new();

        let quit = run_console(&controller, script.as_bytes(), &mut output).unwrap();

        assert!(quit);
        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "started");
        assert_eq!(lines[1], "already-running");
        assert!(lines[2].starts_with("unknown command"));
        assert_eq!(lines[3], "stopped");
        assert_eq!(lines[4], "already-stopped");
        assert_eq!(lines[5], "bye");
        assert_eq!(lines.len(), 6);
        assert!(!controller.is_running());
        controller.shutdown().unwrap();
    }

    #[test]
    fn end_of_input_is_not_a_quit() {
        let controller = controller();
        let mut output = Vec::new();
        assert!(!run_console(&controller, "status\n".as_bytes(), &mut output).unwrap());
        assert!(String::from_utf8(output).unwrap().contains("\"isRunning\": false"));
    }

    #[test]
    fn prices_lists_every_instrument() {
        let controller = controller();
        let reply = execute(&controller, ConsoleCommand::Prices);
        assert_eq!(reply.lines().count(), 8);
        assert!(reply.starts_with("AAPL"));
    }
}
