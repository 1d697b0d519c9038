use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

pub const DEFAULT_LOG_CAPACITY: usize = 200;
pub const DEFAULT_LOG_DISPLAY: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bounded, append-only operator log. Oldest lines are evicted once the
/// capacity is exceeded.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    capacity: usize,
    lines: VecDeque<String>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Stamps `msg` with the local time and appends it.
    pub fn push(&mut self, msg: impl AsRef<str>) {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        self.lines.push_back(format!("[{timestamp}] {}", msg.as_ref()));
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// The newest `n` lines, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }
}

/// Cloneable handle over a [`LogBuffer`], shared by the controller and the
/// encoder output relay.
#[derive(Debug, Clone, Default)]
pub struct SharedLog {
    inner: Arc<TokioMutex<LogBuffer>>,
}

impl SharedLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(TokioMutex::new(LogBuffer::new(capacity))),
        }
    }

    pub async fn push(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        info!(target: "operator_log", "{msg}");
        self.inner.lock().await.push(msg);
    }

    pub async fn recent(&self, n: usize) -> Vec<String> {
        self.inner.lock().await.recent(n)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
