//! Downstream event sinks: a JSON-lines log, a tracing sink, and a fan-out.
//!
//! Every device has its own sink, but the three devices usually share one log
//! file.  [`JsonLinesSink`] therefore writes through a [`SharedWriter`], a
//! cloneable handle around one writer.  Lines from different devices may
//! interleave, but each line is written whole.
//!
//! # Line format
//!
//! ```json
//! {"seq":17,"device":"keyboard","type":"KEY","code":30,"value":1}
//! ```
//!
//! `seq` counts events per sink, starting at 0, so a reader can tell whether a
//! device's stream has gaps.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};
use vhid_core::{DeviceClass, EventSink, NormalizedEvent};

/// A writer shared by several sinks.
#[derive(Debug)]
pub struct SharedWriter<W>(Arc<Mutex<W>>);

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<W: Write> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }

    /// Runs `f` with exclusive access to the writer.
    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        let mut writer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut writer)
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.with(|w| w.flush())
    }
}

impl SharedWriter<BufWriter<File>> {
    /// Opens `path` for appending, creating it if needed.
    pub fn append(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

#[derive(Serialize)]
struct EventLine {
    seq: u64,
    device: DeviceClass,
    #[serde(rename = "type")]
    kind: &'static str,
    code: u16,
    value: i32,
}

/// Writes each event as one JSON object per line.
///
/// Flushes at every sync marker so a frame is on disk as soon as it is
/// complete.  Write failures are logged once and counted; the sink keeps
/// accepting events.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: SharedWriter<W>,
    seq: u64,
    failures: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: SharedWriter<W>) -> Self {
        Self {
            writer,
            seq: 0,
            failures: 0,
        }
    }

    /// Events that could not be written.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn write_line(&mut self, event: &NormalizedEvent) -> std::io::Result<()> {
        let line = EventLine {
            seq: self.seq,
            device: event.device,
            kind: event.kind.label(),
            code: event.code,
            value: event.value,
        };
        self.writer.with(|w| -> std::io::Result<()> {
            serde_json::to_writer(&mut *w, &line)?;
            w.write_all(b"\n")?;
            if event.is_sync() {
                w.flush()?;
            }
            Ok(())
        })
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: NormalizedEvent) {
        if let Err(e) = self.write_line(&event) {
            if self.failures == 0 {
                warn!(device = event.device.as_str(), "event log write failed: {e}");
            }
            self.failures += 1;
        }
        self.seq += 1;
    }
}

/// Logs every non-sync event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: NormalizedEvent) {
        if !event.is_sync() {
            debug!(
                device = event.device.as_str(),
                kind = event.kind.label(),
                code = event.code,
                value = event.value,
                "event"
            );
        }
    }
}

/// Forwards each event to every inner sink, in order.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Fanout {
    fn emit(&mut self, event: NormalizedEvent) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }
}
