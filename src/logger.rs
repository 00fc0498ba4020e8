use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 1000;

/// Log level enum for type-safe logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Log entry with optional structured context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Stage or component that emitted the entry
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

/// Simple circular buffer for fixed-size log storage
struct CircularBuffer {
    buffer: Vec<LogEntry>,
    head: usize,
    size: usize,
    capacity: usize,
}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            head: 0,
            size: 0,
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, item: LogEntry) {
        if self.size < self.capacity {
            self.buffer.push(item);
            self.size += 1;
        } else {
            self.buffer[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    fn to_vec(&self) -> Vec<LogEntry> {
        if self.size < self.capacity {
            self.buffer.clone()
        } else {
            // Return items in chronological order
            let mut result = Vec::with_capacity(self.size);
            result.extend_from_slice(&self.buffer[self.head..]);
            result.extend_from_slice(&self.buffer[..self.head]);
            result
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
        self.size = 0;
    }
}

/// Logging handle of one pipeline run
///
/// Cloned into every stage through the pipeline context. Entries are kept in
/// memory for the run summary and forwarded to `tracing` tagged with the run
/// id, so nothing here depends on a process-wide logger being installed.
#[derive(Clone)]
pub struct RunLogger {
    run_id: Uuid,
    job: String,
    buffer: Arc<Mutex<CircularBuffer>>,
    min_level: Arc<AtomicU8>,
}

impl RunLogger {
    pub fn new(job: impl Into<String>) -> Self {
        Self::with_capacity(job, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(job: impl Into<String>, capacity: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job: job.into(),
            buffer: Arc::new(Mutex::new(CircularBuffer::new(capacity))),
            min_level: Arc::new(AtomicU8::new(LogLevel::Debug as u8)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn log(&self, level: LogLevel, message: &str, source: &str) {
        self.record(level, message, source, None);
    }

    /// Log with context (structured logging)
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: &str,
        source: &str,
        context: HashMap<String, serde_json::Value>,
    ) {
        self.record(level, message, source, Some(context));
    }

    pub fn debug(&self, source: &str, message: &str) {
        self.log(LogLevel::Debug, message, source);
    }

    pub fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, message, source);
    }

    pub fn warn(&self, source: &str, message: &str) {
        self.log(LogLevel::Warn, message, source);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, message, source);
    }

    fn record(
        &self,
        level: LogLevel,
        message: &str,
        source: &str,
        context: Option<HashMap<String, serde_json::Value>>,
    ) {
        if (level as u8) < self.min_level.load(Ordering::Relaxed) {
            return;
        }

        let run_id = self.run_id.to_string();
        let ctx = context
            .as_ref()
            .and_then(|c| serde_json::to_string(c).ok())
            .unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(run_id = %run_id, source, context = %ctx, "{}", message),
            LogLevel::Info => tracing::info!(run_id = %run_id, source, context = %ctx, "{}", message),
            LogLevel::Warn => tracing::warn!(run_id = %run_id, source, context = %ctx, "{}", message),
            LogLevel::Error => tracing::error!(run_id = %run_id, source, context = %ctx, "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            source: source.to_string(),
            context,
        };
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(entry);
        }
    }

    /// Set minimum log level (runtime filtering)
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer.lock().map(|b| b.to_vec()).unwrap_or_default()
    }

    /// Entries at or above `level`
    pub fn entries_at_least(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level >= level)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }
}

impl std::fmt::Debug for RunLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLogger")
            .field("run_id", &self.run_id)
            .field("job", &self.job)
            .field("min_level", &self.min_level())
            .finish()
    }
}

/// Install the process-wide subscriber for a command
///
/// Events go to `<log_dir>/<job>/<job>_<YYYYMMDD_HHMMSS>.log`; warnings and
/// errors are echoed to stderr. `RUST_LOG` overrides the default `info`
/// filter. Keep the returned guard alive until the command finishes.
pub fn init_tracing(log_dir: &Path, job: &str) -> std::io::Result<WorkerGuard> {
    let dir = log_dir.join(job);
    std::fs::create_dir_all(&dir)?;
    let file_name = format!("{}_{}.log", job, Local::now().format("%Y%m%d_%H%M%S"));
    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    Ok(guard)
}
