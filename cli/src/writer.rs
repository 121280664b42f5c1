use crate::error::Error;
use std::io::{Stdout, Write};
use tabled::settings::{peaker::Priority, style::Style, Settings, Width};
use tabled::{Table, Tabled};
use terminal_size::{terminal_size, Width as TerminalWidth};

const DEFAULT_WIDTH: usize = 100;

/// Write all stdout outputs of ls and show commands
///
/// In either plain text mode or structured (JSON), never both.
#[derive(Default, Clone, Copy)]
pub(crate) struct Writer {
    is_structured: bool,
}

impl Writer {
    pub(crate) fn new(is_structured: bool) -> Self {
        Writer { is_structured }
    }

    /// Output plain text
    ///
    /// Prints out nothing but a warning (in warn log level) when the writer is in structured mode.
    pub(crate) fn text(&self, output: &str) -> Result<(), Error> {
        if self.is_structured {
            log::warn!("Skipping output (not structured data): {output}");
            return Ok(());
        }

        self.write(output)
    }

    /// Output serialized JSON
    ///
    /// Prints out nothing but a warning (in warn log level) when the writer is in plain text mode.
    pub(crate) fn json(&self, output: serde_json::Value) -> Result<(), Error> {
        if !self.is_structured {
            log::warn!("Skipping output (not plain text): {output}");
            return Ok(());
        }

        self.write(&format!("{output}\n"))
    }

    /// Output a table sized to the terminal, in plain text mode only
    pub(crate) fn table<T: Tabled>(&self, title: &str, rows: Vec<T>) -> Result<(), Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let width = terminal_width();

        let settings = Settings::default()
            .with(Width::wrap(width).priority(Priority::max(true)))
            .with(Width::increase(width));

        let table = Table::new(rows)
            .with(Style::modern())
            .with(settings)
            .to_string();

        self.text(&format!("{}\n{table}\n", console::style(title).bold()))
    }

    /// General method for writing to stdout
    fn write(&self, output: &str) -> Result<(), Error> {
        let mut stdout: Stdout = std::io::stdout();

        stdout.write_all(output.as_bytes()).map_err(|e| {
            log::error!("Error while writing to std*: {e:?}");

            Error::new(
                "Output error",
                Some("Failed to write to the terminal, check that the output is not closed"),
            )
        })?;

        Ok(())
    }
}

/// Width of the terminal, or a sane default when not attached to one
fn terminal_width() -> usize {
    terminal_size()
        .map(|(TerminalWidth(width), _)| width as usize)
        .unwrap_or(DEFAULT_WIDTH)
}
