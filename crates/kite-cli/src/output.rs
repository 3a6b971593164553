//! Colored terminal output and the stderr logger.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Level selected by `-v` / `-q`
pub fn level_filter(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// `log` backend writing `[LEVEL] target: message` lines to stderr
struct StderrLogger {
    level: LevelFilter,
    choice: ColorChoice,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug => Color::Cyan,
            Level::Trace => Color::Magenta,
        };
        let mut stderr = StandardStream::stderr(self.choice);
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(true);
        let _ = stderr.set_color(&spec);
        let _ = write!(stderr, "[{:<5}]", record.level());
        let _ = stderr.reset();
        let _ = writeln!(stderr, " {}: {}", record.target(), record.args());
    }

    fn flush(&self) {}
}

/// Install the stderr logger
pub fn init_logger(level: LevelFilter, choice: ColorChoice) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(StderrLogger { level, choice }))?;
    log::set_max_level(level);
    Ok(())
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    fn styled(stream: &mut StandardStream, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = stream.set_color(&spec);
        let _ = write!(stream, "{}", text);
        let _ = stream.reset();
    }

    /// Green bold status word followed by a plain message line.
    pub fn status(&mut self, word: &str, message: &str) {
        Self::styled(&mut self.stdout, word, Some(Color::Green), true);
        let _ = writeln!(self.stdout, " {}", message);
    }

    /// Cyan heading line.
    pub fn heading(&mut self, text: &str) {
        Self::styled(&mut self.stdout, text, Some(Color::Cyan), true);
        let _ = writeln!(self.stdout);
    }

    /// Plain line.
    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.stdout, "{}", text);
    }

    /// `error: message` on stderr.
    pub fn stderr_error(&mut self, message: &str) {
        Self::styled(&mut self.stderr, "error", Some(Color::Red), true);
        let _ = writeln!(self.stderr, ": {}", message);
    }

    /// Hint line on stderr.
    pub fn stderr_hint(&mut self, text: &str) {
        Self::styled(&mut self.stderr, "hint", Some(Color::Yellow), true);
        let _ = writeln!(self.stderr, ": {}", text);
    }

    /// Flush stdout.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(0, false), LevelFilter::Warn);
        assert_eq!(level_filter(1, false), LevelFilter::Info);
        assert_eq!(level_filter(5, false), LevelFilter::Trace);
        assert_eq!(level_filter(3, true), LevelFilter::Error);
    }
}
