//! Console sink: writes formatted bytes to stdout/stderr (or an arbitrary
//! stream, for testing), coloring output when the destination is a TTY.

use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;

use crate::error::Result;
use crate::record::Record;
use crate::sink::Sink;

/// An ANSI foreground color for TTY output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    /// The terminal's default foreground.
    Default,
}

impl Color {
    fn escape(self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Green => "\x1b[32m",
            Color::Yellow => "\x1b[33m",
            Color::Blue => "\x1b[34m",
            Color::Default => "\x1b[39m",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Where a [`ConsoleSink`] writes.
pub enum ConsoleStream {
    Stdout,
    Stderr,
    /// An arbitrary stream, for testing; never treated as a TTY.
    Custom(Mutex<Box<dyn Write + Send>>),
}

impl ConsoleStream {
    fn is_tty(&self) -> bool {
        match self {
            ConsoleStream::Stdout => io::stdout().is_terminal(),
            ConsoleStream::Stderr => io::stderr().is_terminal(),
            ConsoleStream::Custom(_) => false,
        }
    }

    fn write_line(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            // `Stdout`/`Stderr` are locked per-write: the process-wide lock
            // `std::io::Stdout`/`Stderr` already serialize prevents
            // character interleaving when multiple threads write to the
            // same terminal.
            ConsoleStream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.write_all(b"\n")
            }
            ConsoleStream::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(bytes)?;
                out.write_all(b"\n")
            }
            ConsoleStream::Custom(w) => {
                let mut w = w.lock().expect("console stream mutex poisoned");
                w.write_all(bytes)?;
                w.write_all(b"\n")
            }
        }
    }
}

/// Maps a record to the color its formatted output should be bracketed
/// with when writing to a TTY.
pub type ColorMapFn = Box<dyn Fn(&Record<'_>) -> Color + Send + Sync>;

/// Writes formatted records to a terminal, with optional severity-driven
/// coloring.
pub struct ConsoleSink {
    stream: ConsoleStream,
    is_tty: bool,
    color_map: Option<ColorMapFn>,
}

impl ConsoleSink {
    /// A sink writing to stdout with no coloring.
    pub fn stdout() -> Self {
        ConsoleSink::new(ConsoleStream::Stdout, None)
    }

    /// A sink writing to stderr with no coloring.
    pub fn stderr() -> Self {
        ConsoleSink::new(ConsoleStream::Stderr, None)
    }

    /// A sink writing to an arbitrary stream, for tests. Never
    /// color-escaped, since it is never treated as a TTY.
    pub fn custom(writer: Box<dyn Write + Send>) -> Self {
        ConsoleSink::new(ConsoleStream::Custom(Mutex::new(writer)), None)
    }

    /// Attaches a severity-to-color mapping, consulted only when the
    /// destination is a TTY.
    pub fn with_colors(mut self, map: impl Fn(&Record<'_>) -> Color + Send + Sync + 'static) -> Self {
        self.color_map = Some(Box::new(map));
        self
    }

    fn new(stream: ConsoleStream, color_map: Option<ColorMapFn>) -> Self {
        // TTY-ness is checked exactly once, at construction, not on every
        // `emit`.
        let is_tty = stream.is_tty();
        ConsoleSink {
            stream,
            is_tty,
            color_map,
        }
    }
}

impl Sink for ConsoleSink {
    fn emit(&self, record: &Record<'_>, formatted: &[u8]) -> Result<()> {
        if !self.is_tty || self.color_map.is_none() {
            self.stream.write_line(formatted)?;
            return Ok(());
        }
        let color = (self.color_map.as_ref().unwrap())(record);
        let mut line = Vec::with_capacity(formatted.len() + 16);
        line.extend_from_slice(color.escape().as_bytes());
        line.extend_from_slice(formatted);
        line.extend_from_slice(RESET.as_bytes());
        self.stream.write_line(&line)?;
        Ok(())
    }
}
