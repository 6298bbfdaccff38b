/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use flume::{Receiver, Sender, TrySendError};
use slog::{Drain, KV, Level, OwnedKVList, Record};

const CHANNEL_CAPACITY: usize = 1024;

/// Counters of the stderr drain, shared with its IO thread.
#[derive(Default)]
pub struct StderrLogStats {
    total: AtomicU64,
    written: AtomicU64,
    written_bytes: AtomicU64,
    format_failed: AtomicU64,
    overflow: AtomicU64,
    closed: AtomicU64,
    io_failed: AtomicU64,
}

impl StderrLogStats {
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn written_bytes(&self) -> u64 {
        self.written_bytes.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.format_failed.load(Ordering::Relaxed)
            + self.overflow.load(Ordering::Relaxed)
            + self.closed.load(Ordering::Relaxed)
            + self.io_failed.load(Ordering::Relaxed)
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

struct LogLine {
    level: Level,
    message: String,
    kv_pairs: Vec<(String, String)>,
    location: Option<String>,
}

struct KvCollector {
    kv_pairs: Vec<(String, String)>,
}

impl slog::Serializer for KvCollector {
    fn emit_arguments(&mut self, key: slog::Key, val: &fmt::Arguments<'_>) -> slog::Result {
        self.kv_pairs.push((key.to_string(), val.to_string()));
        Ok(())
    }
}

/// Formats records on the calling thread and hands them to a dedicated
/// writer thread. Never blocks: a record that finds the channel full is
/// dropped and counted.
pub struct StderrDrain {
    sender: Sender<LogLine>,
    append_code_position: bool,
    stats: Arc<StderrLogStats>,
}

impl StderrDrain {
    /// Start the writer thread and return the drain feeding it.
    pub fn spawn(thread_name: &str, append_code_position: bool) -> io::Result<Self> {
        let (sender, receiver) = flume::bounded(CHANNEL_CAPACITY);
        let stats = Arc::new(StderrLogStats::default());

        let writer_stats = Arc::clone(&stats);
        std::thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || write_loop(&receiver, io::stderr(), &writer_stats))?;

        Ok(StderrDrain {
            sender,
            append_code_position,
            stats,
        })
    }

    pub fn stats(&self) -> Arc<StderrLogStats> {
        Arc::clone(&self.stats)
    }

    fn format(&self, record: &Record, logger_values: &OwnedKVList) -> Result<LogLine, slog::Error> {
        let mut collector = KvCollector {
            kv_pairs: Vec::new(),
        };
        logger_values.serialize(record, &mut collector)?;
        record.kv().serialize(record, &mut collector)?;

        Ok(LogLine {
            level: record.level(),
            message: record.msg().to_string(),
            kv_pairs: collector.kv_pairs,
            location: self
                .append_code_position
                .then(|| format!("{}:{}", record.file(), record.line())),
        })
    }
}

impl Drain for StderrDrain {
    type Ok = ();
    type Err = slog::Error;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), slog::Error> {
        self.stats.total.fetch_add(1, Ordering::Relaxed);

        let line = match self.format(record, logger_values) {
            Ok(line) => line,
            Err(e) => {
                self.stats.format_failed.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };
        match self.sender.try_send(line) {
            Ok(_) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.overflow.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.closed.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

/// Write lines until every sender is gone, flushing once the queue is empty.
fn write_loop<IO: Write>(receiver: &Receiver<LogLine>, mut io: IO, stats: &StderrLogStats) {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    while let Ok(line) = receiver.recv() {
        let mut next = Some(line);
        while let Some(line) = next {
            buf.clear();
            let _ = write_plain(&mut buf, &line);
            match io.write_all(&buf) {
                Ok(_) => {
                    stats.written.fetch_add(1, Ordering::Relaxed);
                    stats
                        .written_bytes
                        .fetch_add(buf.len() as u64, Ordering::Relaxed);
                }
                Err(_) => {
                    stats.io_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            next = receiver.try_recv().ok();
        }
        let _ = io.flush();
    }
}

fn write_plain<IO: Write>(io: &mut IO, line: &LogLine) -> io::Result<()> {
    write!(io, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.6f"))?;
    write!(io, " {}", line.level.as_str())?;
    for (k, v) in &line.kv_pairs {
        write!(io, " {k}: {v},")?;
    }
    if line.message.is_empty() {
        write!(io, " ()")?;
    } else {
        write!(io, " {}", line.message)?;
    }
    if let Some(location) = &line.location {
        write!(io, " <{location}>")?;
    }
    writeln!(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{Logger, o};

    fn drain_with_capacity(
        capacity: usize,
        append_code_position: bool,
    ) -> (StderrDrain, Receiver<LogLine>) {
        let (sender, receiver) = flume::bounded(capacity);
        let drain = StderrDrain {
            sender,
            append_code_position,
            stats: Arc::new(StderrLogStats::default()),
        };
        (drain, receiver)
    }

    #[test]
    fn format_and_write() {
        let (drain, receiver) = drain_with_capacity(4, false);
        let stats = drain.stats();
        let logger = Logger::root(drain.fuse(), o!("daemon" => "test"));

        slog::warn!(logger, "flush failed"; "path" => "/tmp/x");
        drop(logger);

        let mut out = Vec::new();
        write_loop(&receiver, &mut out, &stats);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(" WARN "));
        assert!(text.contains(" daemon: test,"));
        assert!(text.contains(" path: /tmp/x,"));
        assert!(text.ends_with(" flush failed\n"));
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.written(), 1);
        assert_eq!(stats.written_bytes(), text.len() as u64);
        assert_eq!(stats.dropped(), 0);
    }

    #[test]
    fn code_position() {
        let (drain, receiver) = drain_with_capacity(1, true);
        let logger = Logger::root(drain.fuse(), o!());
        slog::info!(logger, "");

        let line = receiver.try_recv().unwrap();
        assert!(line.location.unwrap().contains("stderr.rs:"));
        let mut buf = Vec::new();
        write_plain(
            &mut buf,
            &LogLine {
                level: Level::Info,
                message: String::new(),
                kv_pairs: Vec::new(),
                location: None,
            },
        )
        .unwrap();
        assert!(String::from_utf8(buf).unwrap().ends_with(" INFO ()\n"));
    }

    #[test]
    fn overflow_is_counted() {
        let (drain, _receiver) = drain_with_capacity(1, false);
        let stats = drain.stats();
        let logger = Logger::root(drain.fuse(), o!());

        slog::info!(logger, "first");
        slog::info!(logger, "second");
        slog::info!(logger, "third");

        assert_eq!(stats.total(), 3);
        assert_eq!(stats.overflow(), 2);
        assert_eq!(stats.dropped(), 2);
    }

    #[test]
    fn closed_is_counted() {
        let (drain, receiver) = drain_with_capacity(1, false);
        let stats = drain.stats();
        drop(receiver);
        let logger = Logger::root(drain.fuse(), o!());

        slog::error!(logger, "lost");
        assert_eq!(stats.dropped(), 1);
        assert_eq!(stats.written(), 0);
    }
}
