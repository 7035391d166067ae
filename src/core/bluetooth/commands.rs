//! Board commands
//! A command is an opaque code string; the transport only frames it.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::bluetooth::constants::{COMMAND_TERMINATOR, STOP_COMMAND};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid command code {0:?}: expected three digits")]
pub struct InvalidCommand(pub String);

/// A command code sent to the board
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    /// Stop/idle command
    pub fn stop() -> Self {
        Self(STOP_COMMAND.to_string())
    }

    /// Parses a code typed by a user, accepting only three-digit codes.
    pub fn parse_code(input: &str) -> Result<Self, InvalidCommand> {
        static CODE: OnceLock<Regex> = OnceLock::new();
        let re = CODE.get_or_init(|| Regex::new(r"^[0-9]{3}$").expect("static regex"));
        let trimmed = input.trim();
        if re.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidCommand(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_stop(&self) -> bool {
        self.0 == STOP_COMMAND
    }

    /// Convert the command to its wire representation: UTF-8 plus a newline
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.0.len() + 1);
        data.extend_from_slice(self.0.as_bytes());
        data.push(COMMAND_TERMINATOR);
        data
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_with_trailing_newline() {
        assert_eq!(Command::from("101").to_bytes(), b"101\n".to_vec());
        assert_eq!(Command::stop().to_bytes(), b"000\n".to_vec());
    }

    #[test]
    fn transport_does_not_validate_codes() {
        // Any string goes through unchanged; only parse_code is strict.
        assert_eq!(Command::from("hello").to_bytes(), b"hello\n".to_vec());
    }

    #[test]
    fn parse_code_accepts_three_digits_only() {
        assert_eq!(Command::parse_code(" 305 ").unwrap().as_str(), "305");
        assert!(Command::parse_code("12").is_err());
        assert!(Command::parse_code("1234").is_err());
        assert!(Command::parse_code("abc").is_err());
    }

    #[test]
    fn stop_is_recognised() {
        assert!(Command::stop().is_stop());
        assert!(Command::from("000").is_stop());
        assert!(!Command::from("101").is_stop());
    }
}
