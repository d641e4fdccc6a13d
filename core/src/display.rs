//! Rendering of consumed messages

use chrono::SecondsFormat;
use kafkacli_client::Message;
use parking_lot::Mutex;
use std::io::{self, Write};

/// Output layout selected with `consume -p`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    Pretty,
    #[default]
    Compact,
}

pub trait MessageFormatter: Send + Sync {
    fn format(&self, message: &Message, out: &mut dyn Write) -> io::Result<()>;
}

fn timestamp(message: &Message) -> String {
    message
        .timestamp
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

fn text(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Multi-line block with a separator, quoted headers, key and payload
#[derive(Debug, Default)]
pub struct PrettyFormatter;

impl MessageFormatter for PrettyFormatter {
    fn format(&self, message: &Message, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "---------------- [{}] {}/{} ----------------",
            timestamp(message),
            message.topic,
            message.partition
        )?;
        writeln!(out, "(Headers):")?;
        for header in &message.headers {
            writeln!(out, "- {:?}: {:?}", text(&header.key), text(&header.value))?;
        }
        if let Some(key) = &message.key {
            writeln!(out, "\n(Key): {}", text(key))?;
        }
        write!(out, "\n(Payload):\n{}\n\n", text(&message.value))
    }
}

/// Header line followed by `Headers:` and `Message[key]: value`
#[derive(Debug, Default)]
pub struct CompactFormatter;

impl MessageFormatter for CompactFormatter {
    fn format(&self, message: &Message, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "[{}] {}/{}----------------",
            timestamp(message),
            message.topic,
            message.partition
        )?;
        write!(out, "Headers:")?;
        for header in &message.headers {
            write!(out, " {}={}", text(&header.key), text(&header.value))?;
        }
        writeln!(out)?;
        write!(out, "Message")?;
        if let Some(key) = &message.key {
            write!(out, "[{}]", text(key))?;
        }
        writeln!(out, ": {}", text(&message.value))
    }
}

/// Formatter plus a shared writer. A message is written and flushed under the
/// lock, so output from different partitions never interleaves.
pub struct MessageDisplay {
    formatter: Box<dyn MessageFormatter>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl MessageDisplay {
    pub fn new(mode: DisplayMode, out: Box<dyn Write + Send>) -> Self {
        let formatter: Box<dyn MessageFormatter> = match mode {
            DisplayMode::Pretty => Box::new(PrettyFormatter),
            DisplayMode::Compact => Box::new(CompactFormatter),
        };
        Self {
            formatter,
            out: Mutex::new(out),
        }
    }

    pub fn stdout(mode: DisplayMode) -> Self {
        Self::new(mode, Box::new(io::stdout()))
    }

    pub fn show(&self, message: &Message) -> io::Result<()> {
        let mut out = self.out.lock();
        self.formatter.format(message, &mut *out)?;
        out.flush()
    }

    /// Write a free-form line, such as the consume banner
    pub fn line(&self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{}", line)?;
        out.flush()
    }
}
