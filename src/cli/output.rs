//! Operator-facing terminal output.
//!
//! Every line carries a colored marker so a long release log can be scanned
//! by eye. Errors go to stderr and ignore `--quiet`; everything else goes to
//! stdout.

use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// ASCII BEL, rung to get the operator's attention on late failures
const BELL: &str = "\x07";

/// Kind of line, selecting its marker and color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Success,
    Warning,
    Error,
    Progress,
    Verbose,
}

impl Marker {
    fn symbol(self) -> &'static str {
        match self {
            Marker::Success => "✓",
            Marker::Warning => "⚠",
            Marker::Error => "✗",
            Marker::Progress => "⋯",
            Marker::Verbose => "→",
        }
    }

    fn color(self) -> Color {
        match self {
            Marker::Success => Color::Green,
            Marker::Warning => Color::Yellow,
            Marker::Error => Color::Red,
            Marker::Progress => Color::Magenta,
            Marker::Verbose => Color::Blue,
        }
    }

    /// Warnings and errors color the whole line, not just the marker
    fn tints_message(self) -> bool {
        matches!(self, Marker::Warning | Marker::Error)
    }
}

/// Writes marked lines to the terminal, honouring `--verbose` and `--quiet`
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    /// A step finished
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.marked(Marker::Success, message)
    }

    /// Something went wrong but the run continues
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.marked(Marker::Warning, message)
    }

    /// A step is starting
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.marked(Marker::Progress, message)
    }

    /// Detail shown only with `--verbose`
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.marked(Marker::Verbose, message)
    }

    /// Fatal problem, always shown on stderr
    pub fn error(&self, message: &str) {
        let stderr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = stderr.buffer();
        let printed = write_marked(&mut buffer, Marker::Error, message)
            .and_then(|()| stderr.print(&buffer));
        if printed.is_err() {
            let _ = writeln!(std::io::stderr(), "{} {}", Marker::Error.symbol(), message);
        }
    }

    /// Header for a stage with many lines of its own
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut buffer = self.stdout.buffer();
        writeln!(buffer)?;
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
        writeln!(buffer, "═══ {} ═══", title)?;
        buffer.reset()?;
        self.stdout.print(&buffer)
    }

    /// Sub-item of the previous line
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.plain(&format!("    {}", message))
    }

    /// Unmarked line
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        self.plain(message)
    }

    /// Ring the terminal bell on stderr, even when quiet
    pub fn bell(&self) {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{}", BELL);
        let _ = stderr.flush();
    }

    fn marked(&self, marker: Marker, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.stdout.buffer();
        write_marked(&mut buffer, marker, message)?;
        self.stdout.print(&buffer)
    }

    fn plain(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.stdout.buffer();
        writeln!(buffer, "{}", message)?;
        self.stdout.print(&buffer)
    }
}

fn write_marked(buffer: &mut Buffer, marker: Marker, message: &str) -> std::io::Result<()> {
    buffer.set_color(ColorSpec::new().set_fg(Some(marker.color())).set_bold(true))?;
    write!(buffer, "{}", marker.symbol())?;
    buffer.reset()?;
    if marker.tints_message() {
        buffer.set_color(ColorSpec::new().set_fg(Some(marker.color())))?;
    }
    writeln!(buffer, " {}", message)?;
    buffer.reset()
}
