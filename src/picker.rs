//! Console device picker
//! Prints the discovered devices and reads the user's choice from stdin.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::core::bluetooth::{DeviceCandidate, DevicePicker, HostError};

#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Chosen(usize),
    Cancelled,
    Invalid,
}

/// Entries are numbered from 1; an empty line or `q` cancels.
fn parse_selection(input: &str, count: usize) -> Selection {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("q") {
        return Selection::Cancelled;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Chosen(n - 1),
        _ => Selection::Invalid,
    }
}

/// Line reader shared by everything that prompts the user, so input read
/// ahead by one prompt stays available to the next.
pub struct ConsoleInput<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl ConsoleInput {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// Next line without its terminator; `None` at end of input.
    pub async fn read_line(&self) -> io::Result<Option<String>> {
        self.lines.lock().await.next_line().await
    }
}

pub struct ConsolePicker<R = BufReader<Stdin>> {
    input: Arc<ConsoleInput<R>>,
}

impl<R> ConsolePicker<R> {
    pub fn new(input: Arc<ConsoleInput<R>>) -> Self {
        Self { input }
    }
}

#[async_trait]
impl<R> DevicePicker for ConsolePicker<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn pick(&self, candidates: &[DeviceCandidate]) -> Result<Option<usize>, HostError> {
        if candidates.is_empty() {
            println!("No Bluetooth devices found.");
            return Ok(None);
        }

        println!("Select a device:");
        for (i, candidate) in candidates.iter().enumerate() {
            let signal = match candidate.rssi {
                Some(rssi) => format!("{} dBm", rssi),
                None if candidate.is_connected => "connected".to_string(),
                None => "-".to_string(),
            };
            println!("  {:>2}) {:<28} {:<20} {}", i + 1, candidate.display_name(), candidate.id, signal);
        }

        loop {
            println!("Device number (Enter to cancel):");
            let Some(line) = self.input.read_line().await? else {
                return Ok(None);
            };
            match parse_selection(&line, candidates.len()) {
                Selection::Chosen(index) => return Ok(Some(index)),
                Selection::Cancelled => return Ok(None),
                Selection::Invalid => println!("Enter a number between 1 and {}.", candidates.len()),
            }
        }
    }
}
