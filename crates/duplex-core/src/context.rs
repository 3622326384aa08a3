//! I/O channels and the per-invocation tool context.
//!
//! The primary channel carries exactly one JSON value per direct invocation,
//! or one JSON value per line for streaming and session events; the
//! secondary channel carries notification lines only. Both flush on every
//! write so a caller reading line-by-line sees events as they happen.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use duplex_types::ToolError;

use crate::notify::Notifier;
use crate::sample::{self, SampleRequest, SamplingConfig};

/// A shared, line-flushed JSON output channel.
#[derive(Clone)]
pub struct OutputChannel {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputChannel {
    /// Channel over the process stdout.
    pub fn stdout() -> Self {
        Self::from_writer(Box::new(io::stdout()))
    }

    /// Channel over the process stderr.
    pub fn stderr() -> Self {
        Self::from_writer(Box::new(io::stderr()))
    }

    /// Channel over an arbitrary writer.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// In-memory channel for tests; the handle reads back what was written.
    pub fn buffer() -> (Self, BufferHandle) {
        let handle = BufferHandle::default();
        (Self::from_writer(Box::new(handle.clone())), handle)
    }

    fn with_writer(&self, f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> io::Result<()> {
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("output channel poisoned"))?;
        f(writer.as_mut())
    }

    /// Write one compact JSON value as a line and flush.
    pub fn write_json(&self, value: &impl Serialize) -> io::Result<()> {
        let line = serde_json::to_string(value)?;
        self.with_writer(|w| {
            writeln!(w, "{line}")?;
            w.flush()
        })
    }

    /// Write one pretty-printed JSON value and flush.
    pub fn write_pretty(&self, value: &impl Serialize) -> io::Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        self.with_writer(|w| {
            writeln!(w, "{text}")?;
            w.flush()
        })
    }

    /// Write plain text (human help) with a trailing newline and flush.
    pub fn write_text(&self, text: &str) -> io::Result<()> {
        self.with_writer(|w| {
            writeln!(w, "{text}")?;
            w.flush()
        })
    }
}

/// Shared byte buffer backing a test [`OutputChannel`].
#[derive(Clone, Default)]
pub struct BufferHandle(Arc<Mutex<Vec<u8>>>);

impl BufferHandle {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => String::new(),
        }
    }

    /// Non-empty lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Write for BufferHandle {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .0
            .lock()
            .map_err(|_| io::Error::other("buffer poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The line-oriented input channel used by sessions and stdin sampling.
#[derive(Clone)]
pub struct InputChannel {
    inner: Arc<tokio::sync::Mutex<Box<dyn AsyncBufRead + Send + Unpin>>>,
}

impl InputChannel {
    /// Channel over the process stdin.
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    /// Channel over an arbitrary async reader.
    pub fn from_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(Box::new(reader))),
        }
    }

    /// Pre-scripted input for tests.
    pub fn scripted(text: impl Into<String>) -> Self {
        Self::from_reader(BufReader::new(io::Cursor::new(text.into().into_bytes())))
    }

    /// Read one line, without its terminator. `None` means end of input.
    pub async fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.inner.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// Per-invocation context handed to tools.
///
/// Cheap to clone; the clone shares the same channels. The sampling
/// transport is set by the dispatcher (from `--sample-via`) before the tool
/// runs and is never mutated afterwards.
#[derive(Clone)]
pub struct ToolContext {
    out: OutputChannel,
    errs: OutputChannel,
    input: InputChannel,
    sampling: SamplingConfig,
}

impl ToolContext {
    /// Context over the real process streams.
    pub fn stdio() -> Self {
        Self::new(OutputChannel::stdout(), OutputChannel::stderr(), InputChannel::stdin())
    }

    /// Context over explicit channels.
    pub fn new(out: OutputChannel, errs: OutputChannel, input: InputChannel) -> Self {
        Self {
            out,
            errs,
            input,
            sampling: SamplingConfig::default(),
        }
    }

    /// The primary (result/event) channel.
    pub fn out(&self) -> &OutputChannel {
        &self.out
    }

    /// The secondary (notification) channel.
    pub fn errs(&self) -> &OutputChannel {
        &self.errs
    }

    /// The line-oriented input channel.
    pub fn input(&self) -> &InputChannel {
        &self.input
    }

    /// Fire-and-forget notifier on the secondary channel.
    pub fn notify(&self) -> Notifier {
        Notifier::new(self.errs.clone())
    }

    /// The configured sampling transport.
    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    /// Set the sampling transport for this invocation.
    pub fn set_sampling(&mut self, config: SamplingConfig) {
        self.sampling = config;
    }

    /// Request a completion from the invoking agent. Blocks until the
    /// response arrives over the configured transport.
    pub async fn sample(&self, request: SampleRequest) -> Result<String, ToolError> {
        sample::sample(self, request).await
    }
}
