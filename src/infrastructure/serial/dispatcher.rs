//! Command Dispatcher
//!
//! Turns a decoded serial line into a call on the [`LedClient`]. Nothing
//! escapes this boundary: parse failures and BLE write failures come back
//! as a [`DispatchOutcome`] and are logged here.

use crate::domain::command::{AckFormat, Command, CommandTable};
use crate::domain::error::ParseError;
use crate::domain::led::LedClient;
use crate::domain::settings::ProtocolSettings;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The client accepted the command.
    Applied {
        command: Command,
        ack: Option<String>,
    },
    Unrecognized(String),
    /// Known prefix, malformed payload. Nothing was written.
    Rejected(ParseError),
    /// The client write itself failed.
    Failed { command: Command, error: String },
}

impl DispatchOutcome {
    pub fn ack(&self) -> Option<&str> {
        match self {
            Self::Applied { ack, .. } => ack.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: CommandTable,
    ack_format: AckFormat,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(CommandTable::standard(), AckFormat::default())
    }
}

impl Dispatcher {
    pub fn new(table: CommandTable, ack_format: AckFormat) -> Self {
        Self { table, ack_format }
    }

    pub fn from_settings(settings: &ProtocolSettings) -> Self {
        let table = settings.command_table();
        debug!(
            "Command table ready (case-insensitive: {}, {} alias(es), ack {:?})",
            table.is_case_insensitive(),
            settings.aliases.len(),
            settings.ack_format
        );
        Self::new(table, settings.ack_format)
    }

    pub async fn dispatch(&self, line: &str, client: &dyn LedClient) -> DispatchOutcome {
        let command = match self.table.parse(line) {
            Ok(Command::Unrecognized(raw)) => {
                info!("Received unrecognized command: {}", raw);
                return DispatchOutcome::Unrecognized(raw);
            }
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                return DispatchOutcome::Rejected(e);
            }
        };

        let result = match &command {
            Command::Power(state) => {
                info!("Arduino requested power {}", state);
                client.write_power(*state).await
            }
            Command::Mode(mode) => {
                info!("Arduino requested mode change to {}", mode);
                client.write_mode(*mode).await
            }
            Command::Color { r, g, b } => {
                info!("Arduino requested color change to RGB({},{},{})", r, g, b);
                client.write_color(*r, *g, *b).await
            }
            Command::Unrecognized(_) => Ok(()),
        };

        match result {
            Ok(()) => DispatchOutcome::Applied {
                ack: command.ack(self.ack_format),
                command,
            },
            Err(e) => {
                warn!("Error processing Arduino command {:?}: {:#}", command, e);
                DispatchOutcome::Failed {
                    command,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::led::testing::{LedCall, RecordingLedClient};
    use crate::domain::led::PowerState;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_power_variants_write_once_and_ack() {
        let dispatcher = Dispatcher::default();
        for word in ["ON", "POWER_ON", "TURN_ON", "POWER:ON", "LED:ON", "power:on"] {
            let client = RecordingLedClient::default();
            let outcome = dispatcher.dispatch(word, &client).await;
            assert_eq!(client.calls(), vec![LedCall::Power(PowerState::On)], "{}", word);
            assert_eq!(outcome.ack(), Some("ACK:POWER:ON"));
        }
    }

    #[tokio::test]
    async fn test_color_scenario() {
        let dispatcher = Dispatcher::default();
        let client = RecordingLedClient::default();
        let outcome = dispatcher.dispatch("COLOR:10,20,30", &client).await;
        assert_eq!(client.calls(), vec![LedCall::Color(10, 20, 30)]);
        assert_eq!(outcome.ack(), Some("ACK:COLOR:10,20,30"));
    }

    #[tokio::test]
    async fn test_color_is_not_clamped() {
        let dispatcher = Dispatcher::default();
        let client = RecordingLedClient::default();
        dispatcher.dispatch("COLOR_-1,256,1000", &client).await;
        assert_eq!(client.calls(), vec![LedCall::Color(-1, 256, 1000)]);
    }

    #[tokio::test]
    async fn test_mode_scenario_short_ack() {
        let dispatcher = Dispatcher::new(CommandTable::standard(), AckFormat::Short);
        let client = RecordingLedClient::default();
        let outcome = dispatcher.dispatch("MODE:3", &client).await;
        assert_eq!(client.calls(), vec![LedCall::Mode(3)]);
        assert_eq!(outcome.ack(), Some("ACK:MODE:3"));

        let outcome = dispatcher.dispatch("OFF", &client).await;
        assert_eq!(outcome.ack(), Some("ACK:OFF"));
    }

    #[tokio::test]
    async fn test_garbage_and_malformed_make_no_calls() {
        let dispatcher = Dispatcher::default();
        let client = RecordingLedClient::default();

        let outcome = dispatcher.dispatch("garbage", &client).await;
        assert_eq!(outcome, DispatchOutcome::Unrecognized("garbage".to_string()));

        for line in ["COLOR:1,2", "MODE:abc", "COLOR_a,b,c"] {
            let outcome = dispatcher.dispatch(line, &client).await;
            assert!(matches!(outcome, DispatchOutcome::Rejected(_)), "{}", line);
            assert_eq!(outcome.ack(), None);
        }

        assert!(client.calls().is_empty());
    }

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_garbage_logs_exactly_one_entry() {
        let captured = CaptureWriter::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let dispatcher = Dispatcher::default();
        let client = RecordingLedClient::default();
        dispatcher.dispatch("garbage", &client).await;

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1, "{}", output);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("unrecognized command: garbage"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_client_failure_is_contained() {
        let dispatcher = Dispatcher::default();
        let client = RecordingLedClient::failing();
        let outcome = dispatcher.dispatch("ON", &client).await;
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert_eq!(outcome.ack(), None);
    }

    #[tokio::test]
    async fn test_disabled_ack() {
        let dispatcher = Dispatcher::new(CommandTable::standard(), AckFormat::Disabled);
        let client = RecordingLedClient::default();
        let outcome = dispatcher.dispatch("ON", &client).await;
        assert!(matches!(outcome, DispatchOutcome::Applied { ack: None, .. }));
        assert_eq!(client.calls().len(), 1);
    }
}
