//! How the user is told about an available update and asked to install it.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

use log::warn;

pub trait UpdatePrompt {
    fn notify_update_available(&mut self, current: &str, available: &str);

    /// Ask whether to install now. `false` keeps the running version.
    fn confirm_update(&mut self) -> bool;

    fn update_failed(&mut self, details: &str);
}

impl<P: UpdatePrompt + ?Sized> UpdatePrompt for Box<P> {
    fn notify_update_available(&mut self, current: &str, available: &str) {
        (**self).notify_update_available(current, available);
    }

    fn confirm_update(&mut self) -> bool {
        (**self).confirm_update()
    }

    fn update_failed(&mut self, details: &str) {
        (**self).update_failed(details);
    }
}

/// Prompts on a terminal. Generic over the streams so it can be driven from
/// buffers.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{question} [y/N] ")?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

impl<R: BufRead, W: Write> UpdatePrompt for TerminalPrompt<R, W> {
    fn notify_update_available(&mut self, current: &str, available: &str) {
        let _ = writeln!(
            self.output,
            "A new version is available: {available} (running {current})"
        );
    }

    fn confirm_update(&mut self) -> bool {
        self.ask("Download and install it now?").unwrap_or_else(|error| {
            warn!("Could not read update confirmation: {error}");
            false
        })
    }

    fn update_failed(&mut self, details: &str) {
        let _ = writeln!(self.output, "Update failed: {details}");
    }
}

/// Accepts every update without asking. Used for `--yes`.
pub struct AutoConfirm<W = Stdout> {
    output: W,
}

impl AutoConfirm<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> AutoConfirm<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<W: Write> UpdatePrompt for AutoConfirm<W> {
    fn notify_update_available(&mut self, current: &str, available: &str) {
        let _ = writeln!(self.output, "Updating from {current} to {available}");
    }

    fn confirm_update(&mut self) -> bool {
        true
    }

    fn update_failed(&mut self, details: &str) {
        let _ = writeln!(self.output, "Update failed: {details}");
    }
}
