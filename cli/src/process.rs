use eyre::{Context, ContextCompat};
use std::process::{Child, ExitStatus};
use std::{
    io::{BufRead, BufReader, Read, Write},
    sync::{Arc, Mutex},
};

const MAX_LINE_LEN: usize = 64;

/// A wrapper over system process
///
/// Shows the output of long running tools (e.g. docker build) in one line,
/// and keeps all of it to print in case of a failure.
pub struct Process {
    child: Child,

    // Collect all lines for later display
    stdout_lines: Arc<Mutex<Vec<String>>>,
    stderr_lines: Arc<Mutex<Vec<String>>>,
}

impl Process {
    pub fn new(child: Child) -> Self {
        Process {
            child,
            stdout_lines: Arc::new(Mutex::new(Vec::new())),
            stderr_lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a thread for printing out a line, and accumulating for later full output
    fn thread(
        &self,
        reader: BufReader<impl Read + Send + 'static>,
        lock: Arc<Mutex<Vec<String>>>,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            for line in reader.lines().map_while(Result::ok) {
                // Store the line for later output
                if let Ok(mut lines) = lock.lock() {
                    lines.push(line.clone());
                }

                // Clear the line and print normal (non-red) output
                print!("\r\x1B[K");
                print!("{}", console::style(truncate(line.trim())).dim());
                let _ = std::io::stdout().flush();
            }
        })
    }

    /// Print out process output in one line, in real-time
    pub fn log(&mut self) -> eyre::Result<ExitStatus> {
        let stdout = self
            .child
            .stdout
            .take()
            .wrap_err("Failed to capture stdout")?;

        let stderr = self
            .child
            .stderr
            .take()
            .wrap_err("Failed to capture stderr")?;

        let stdout_thread = self.thread(BufReader::new(stdout), Arc::clone(&self.stdout_lines));
        let stderr_thread = self.thread(BufReader::new(stderr), Arc::clone(&self.stderr_lines));

        // Wait for the command to complete
        let status = self.child.wait().wrap_err("Command failed to complete")?;

        // Wait for output reading threads to complete
        if stdout_thread.join().is_err() || stderr_thread.join().is_err() {
            log::warn!("Failed to read the whole output of the process");
        }

        // Clean up old output
        print!("\r\x1B[K");

        Ok(status)
    }

    /// If there was an error, print the full stderr
    pub fn print_error(&self) {
        if let Ok(lines) = self.stderr_lines.lock() {
            eprintln!(
                "\n{}\n{}",
                console::style("Error:").red().bold(),
                lines.join("\n")
            );
        }
    }
}

/// Keep the one-line output within a reasonable width, with ellipsis if necessary
fn truncate(line: &str) -> String {
    if line.chars().count() > MAX_LINE_LEN {
        format!(
            "{}...",
            line.chars().take(MAX_LINE_LEN - 3).collect::<String>()
        )
    } else {
        line.to_string()
    }
}
