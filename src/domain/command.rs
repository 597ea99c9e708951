//! Arduino Command Protocol
//!
//! The Arduino sends one newline-terminated command per line. Several
//! firmware revisions spoke slightly different dialects of the same small
//! protocol, so every spelling lives in a [`CommandTable`] as data:
//!
//! ```text
//! POWER_ON | TURN_ON | ON | POWER:ON | LED:ON        -> power on
//! POWER_OFF | TURN_OFF | OFF | POWER:OFF | LED:OFF   -> power off
//! MODE_<n> | MODE:<n>                                -> mode n
//! COLOR_<r>,<g>,<b> | COLOR:<r>,<g>,<b>              -> color
//! ```

use crate::domain::error::ParseError;
use crate::domain::led::PowerState;
use serde::{Deserialize, Serialize};

/// A decoded line from the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Power(PowerState),
    Color { r: i32, g: i32, b: i32 },
    Mode(i32),
    Unrecognized(String),
}

impl Command {
    /// Acknowledgment line to echo back, without the trailing newline.
    pub fn ack(&self, format: AckFormat) -> Option<String> {
        if format == AckFormat::Disabled {
            return None;
        }

        match self {
            Self::Power(state) => {
                let word = match state {
                    PowerState::On => "ON",
                    PowerState::Off => "OFF",
                };
                Some(match format {
                    AckFormat::Short => format!("ACK:{}", word),
                    _ => format!("ACK:POWER:{}", word),
                })
            }
            Self::Mode(mode) => Some(format!("ACK:MODE:{}", mode)),
            Self::Color { r, g, b } => Some(format!("ACK:COLOR:{},{},{}", r, g, b)),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Shape of the acknowledgment written back over serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckFormat {
    /// Never acknowledge.
    Disabled,
    /// `ACK:ON` / `ACK:OFF`
    Short,
    /// `ACK:POWER:ON` / `ACK:POWER:OFF`
    #[default]
    Long,
}

/// Canonical action a pattern resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    PowerOn,
    PowerOff,
    Mode,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
}

/// User-defined alias stored in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAlias {
    pub pattern: String,
    #[serde(default)]
    pub prefix: bool,
    pub action: CommandKind,
}

/// Pattern -> action lookup table.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<(Pattern, CommandKind)>,
    case_insensitive: bool,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl CommandTable {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            entries: Vec::new(),
            case_insensitive,
        }
    }

    /// Every dialect observed on the Arduino firmware, case-insensitive.
    pub fn standard() -> Self {
        let mut table = Self::new(true);
        for word in ["POWER_ON", "TURN_ON", "ON", "POWER:ON", "LED:ON"] {
            table.push(Pattern::Exact(word.to_string()), CommandKind::PowerOn);
        }
        for word in ["POWER_OFF", "TURN_OFF", "OFF", "POWER:OFF", "LED:OFF"] {
            table.push(Pattern::Exact(word.to_string()), CommandKind::PowerOff);
        }
        for prefix in ["MODE_", "MODE:"] {
            table.push(Pattern::Prefix(prefix.to_string()), CommandKind::Mode);
        }
        for prefix in ["COLOR_", "COLOR:"] {
            table.push(Pattern::Prefix(prefix.to_string()), CommandKind::Color);
        }
        table
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_aliases(mut self, aliases: &[CommandAlias]) -> Self {
        for alias in aliases {
            let pattern = if alias.prefix {
                Pattern::Prefix(alias.pattern.clone())
            } else {
                Pattern::Exact(alias.pattern.clone())
            };
            self.push(pattern, alias.action);
        }
        self
    }

    pub fn push(&mut self, pattern: Pattern, kind: CommandKind) {
        self.entries.push((pattern, kind));
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Decode one line.
    ///
    /// Exact patterns are tried before prefixes. A line that matches nothing
    /// is `Ok(Command::Unrecognized)`; a recognised prefix with a bad
    /// payload is an error.
    pub fn parse(&self, line: &str) -> Result<Command, ParseError> {
        let raw = line.trim();

        if let Some(kind) = self.match_exact(raw) {
            return match kind {
                CommandKind::PowerOn => Ok(Command::Power(PowerState::On)),
                CommandKind::PowerOff => Ok(Command::Power(PowerState::Off)),
                // An exact pattern mapped to a payload command has no payload.
                CommandKind::Mode => Err(ParseError::InvalidMode {
                    raw: raw.to_string(),
                }),
                CommandKind::Color => Err(ParseError::InvalidColor {
                    raw: raw.to_string(),
                }),
            };
        }

        if let Some((payload, kind)) = self.match_prefix(raw) {
            return match kind {
                CommandKind::PowerOn => Ok(Command::Power(PowerState::On)),
                CommandKind::PowerOff => Ok(Command::Power(PowerState::Off)),
                CommandKind::Mode => parse_mode(raw, payload),
                CommandKind::Color => parse_color(raw, payload),
            };
        }

        Ok(Command::Unrecognized(raw.to_string()))
    }

    fn match_exact(&self, raw: &str) -> Option<CommandKind> {
        self.entries.iter().find_map(|(pattern, kind)| match pattern {
            Pattern::Exact(word) if self.eq(raw, word) => Some(*kind),
            _ => None,
        })
    }

    fn match_prefix<'a>(&self, raw: &'a str) -> Option<(&'a str, CommandKind)> {
        self.entries.iter().find_map(|(pattern, kind)| match pattern {
            Pattern::Prefix(prefix) if raw.len() >= prefix.len() => {
                let head = raw.get(..prefix.len())?;
                if self.eq(head, prefix) {
                    Some((&raw[prefix.len()..], *kind))
                } else {
                    None
                }
            }
            _ => None,
        })
    }

    fn eq(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}

fn parse_mode(raw: &str, payload: &str) -> Result<Command, ParseError> {
    payload
        .trim()
        .parse::<i32>()
        .map(Command::Mode)
        .map_err(|_| ParseError::InvalidMode {
            raw: raw.to_string(),
        })
}

fn parse_color(raw: &str, payload: &str) -> Result<Command, ParseError> {
    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() != 3 {
        return Err(ParseError::WrongFieldCount {
            raw: raw.to_string(),
            expected: 3,
            found: fields.len(),
        });
    }

    let mut rgb = [0i32; 3];
    for (slot, field) in rgb.iter_mut().zip(&fields) {
        *slot = field
            .trim()
            .parse::<i32>()
            .map_err(|_| ParseError::InvalidColor {
                raw: raw.to_string(),
            })?;
    }

    Ok(Command::Color {
        r: rgb[0],
        g: rgb[1],
        b: rgb[2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_dialects() {
        let table = CommandTable::standard();
        for word in ["ON", "POWER_ON", "TURN_ON", "POWER:ON", "LED:ON", "power:on", "On"] {
            assert_eq!(
                table.parse(word).unwrap(),
                Command::Power(PowerState::On),
                "{}",
                word
            );
        }
        for word in ["OFF", "POWER_OFF", "TURN_OFF", "POWER:OFF", "led:off"] {
            assert_eq!(
                table.parse(word).unwrap(),
                Command::Power(PowerState::Off),
                "{}",
                word
            );
        }
    }

    #[test]
    fn test_case_sensitive_table() {
        let table = CommandTable::standard().with_case_insensitive(false);
        assert_eq!(
            table.parse("power:on").unwrap(),
            Command::Unrecognized("power:on".to_string())
        );
        assert_eq!(
            table.parse("POWER:ON").unwrap(),
            Command::Power(PowerState::On)
        );
    }

    #[test]
    fn test_color_and_mode() {
        let table = CommandTable::standard();
        assert_eq!(
            table.parse("COLOR:10,20,30\r\n").unwrap(),
            Command::Color { r: 10, g: 20, b: 30 }
        );
        assert_eq!(
            table.parse("COLOR_-5, 300,0").unwrap(),
            Command::Color { r: -5, g: 300, b: 0 }
        );
        assert_eq!(table.parse("MODE:3").unwrap(), Command::Mode(3));
        assert_eq!(table.parse("mode_12").unwrap(), Command::Mode(12));
    }

    #[test]
    fn test_malformed_payloads() {
        let table = CommandTable::standard();
        assert_eq!(
            table.parse("COLOR:1,2"),
            Err(ParseError::WrongFieldCount {
                raw: "COLOR:1,2".to_string(),
                expected: 3,
                found: 2,
            })
        );
        assert!(matches!(
            table.parse("COLOR:1,x,3"),
            Err(ParseError::InvalidColor { .. })
        ));
        assert!(matches!(
            table.parse("MODE:abc"),
            Err(ParseError::InvalidMode { .. })
        ));
        assert!(matches!(
            table.parse("MODE:"),
            Err(ParseError::InvalidMode { .. })
        ));
    }

    #[test]
    fn test_unrecognized() {
        let table = CommandTable::standard();
        assert_eq!(
            table.parse("garbage").unwrap(),
            Command::Unrecognized("garbage".to_string())
        );
        // Exact patterns do not match as prefixes.
        assert_eq!(
            table.parse("ONWARD").unwrap(),
            Command::Unrecognized("ONWARD".to_string())
        );
    }

    #[test]
    fn test_custom_alias() {
        let table = CommandTable::standard().with_aliases(&[
            CommandAlias {
                pattern: "LIGHTS_UP".to_string(),
                prefix: false,
                action: CommandKind::PowerOn,
            },
            CommandAlias {
                pattern: "RGB=".to_string(),
                prefix: true,
                action: CommandKind::Color,
            },
        ]);
        assert_eq!(
            table.parse("lights_up").unwrap(),
            Command::Power(PowerState::On)
        );
        assert_eq!(
            table.parse("RGB=1,2,3").unwrap(),
            Command::Color { r: 1, g: 2, b: 3 }
        );
    }

    #[test]
    fn test_ack_formats() {
        let on = Command::Power(PowerState::On);
        assert_eq!(on.ack(AckFormat::Long).as_deref(), Some("ACK:POWER:ON"));
        assert_eq!(on.ack(AckFormat::Short).as_deref(), Some("ACK:ON"));
        assert_eq!(on.ack(AckFormat::Disabled), None);

        let color = Command::Color { r: 10, g: 20, b: 30 };
        assert_eq!(
            color.ack(AckFormat::Short).as_deref(),
            Some("ACK:COLOR:10,20,30")
        );
        assert_eq!(
            Command::Mode(3).ack(AckFormat::Long).as_deref(),
            Some("ACK:MODE:3")
        );
        assert_eq!(
            Command::Unrecognized("x".to_string()).ack(AckFormat::Long),
            None
        );
    }
}
