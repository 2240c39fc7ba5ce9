use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader as TokioBufReader};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of lines kept in memory before the oldest are dropped.
pub const LOG_CAPACITY: usize = 3000;

/// Prefix for every line captured from the gateway's stdout/stderr.
pub const GATEWAY_TAG: &str = "[gateway]";

/// Longest gateway output line kept as one entry; longer runs are split.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.text
        )
    }
}

// ---------------------------------------------------------------------------
// LogRing: bounded in-memory buffer shared by the supervisor and the API
// ---------------------------------------------------------------------------

/// Append-only ring of timestamped lines. Cloning shares the same buffer.
///
/// The lock is private to the ring, so a reader copying the buffer never
/// holds up a supervisor state transition.
#[derive(Debug, Clone)]
pub struct LogRing {
    entries: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRing {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Timestamp `text` and append it, evicting from the front when full.
    pub fn push(&self, text: impl Into<String>) {
        let text = text.into();
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        // Stamp under the lock so timestamps stay monotonic with insertion order.
        entries.push_back(LogEntry {
            timestamp: Local::now(),
            text,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Copy of the current buffer, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.iter().cloned().collect()
    }

    /// Copy of the current buffer rendered as `[HH:MM:SS] text` lines.
    pub fn lines(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries.iter().map(ToString::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// spawn_log_copier: tokio task that reads piped child output into the ring
// ---------------------------------------------------------------------------

pub fn spawn_log_copier(
    stream: LogStream,
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
    ring: LogRing,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_log_copier(reader, &ring).await {
            tracing::warn!(?stream, error = %e, "gateway output reader failed");
        }
    })
}

async fn run_log_copier(
    reader: impl tokio::io::AsyncRead + Unpin,
    ring: &LogRing,
) -> io::Result<()> {
    let mut buf_reader = TokioBufReader::new(reader);
    let mut line = Vec::new();
    let mut split = false;
    loop {
        line.clear();
        let n = (&mut buf_reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            break; // EOF, child exited
        }

        let complete = line.ends_with(b"\n");
        // Newline right after a split chunk ends that chunk, not a new line.
        if split && line.as_slice() == b"\n" {
            split = false;
            continue;
        }
        split = !complete;

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);
        ring.push(format!("{GATEWAY_TAG} {text}"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_constant() {
        assert_eq!(LOG_CAPACITY, 3000);
        assert_eq!(LogRing::new().capacity(), 3000);
    }

    #[test]
    fn test_push_and_read_in_order() {
        let ring = LogRing::new();
        ring.push("first");
        ring.push("second");
        let texts: Vec<_> = ring.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_overflow_evicts_exactly_the_oldest() {
        let ring = LogRing::new();
        for i in 0..LOG_CAPACITY {
            ring.push(format!("line{i}"));
        }
        assert_eq!(ring.len(), LOG_CAPACITY);

        ring.push("line3000");
        let entries = ring.entries();
        assert_eq!(entries.len(), LOG_CAPACITY);
        assert_eq!(entries[0].text, "line1");
        assert_eq!(entries[LOG_CAPACITY - 1].text, "line3000");
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.text, format!("line{}", i + 1));
        }
    }

    #[test]
    fn test_small_ring_keeps_newest() {
        let ring = LogRing::with_capacity(3);
        for i in 1..=10 {
            ring.push(format!("{i}"));
        }
        let texts: Vec<_> = ring.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["8", "9", "10"]);
    }

    #[test]
    fn test_timestamps_are_non_decreasing() {
        let ring = LogRing::new();
        for i in 0..100 {
            ring.push(format!("{i}"));
        }
        let entries = ring.entries();
        for pair in entries.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_line_format() {
        let ring = LogRing::new();
        ring.push("Dashboard started on port 18080");
        let lines = ring.lines();
        let re = regex::Regex::new(r"^\[\d{2}:\d{2}:\d{2}\] Dashboard started on port 18080$")
            .unwrap();
        assert!(re.is_match(&lines[0]), "unexpected line: {}", lines[0]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let ring = LogRing::new();
        ring.push("a");
        let snapshot = ring.lines();
        ring.push("b");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_clones_share_the_buffer() {
        let ring = LogRing::new();
        let other = ring.clone();
        other.push("shared");
        assert_eq!(ring.len(), 1);
        assert!(!ring.is_empty());
    }

    #[test]
    fn test_concurrent_writers_never_exceed_capacity() {
        let ring = LogRing::with_capacity(100);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ring = ring.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        ring.push(format!("t{t}-{i}"));
                        assert!(ring.len() <= 100);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ring.len(), 100);
    }

    // ── Copier ──────────────────────────────────────────────────────

    async fn copy_through(input: &[u8]) -> Vec<String> {
        let ring = LogRing::new();
        let reader = std::io::Cursor::new(input.to_vec());
        run_log_copier(reader, &ring).await.unwrap();
        ring.entries().into_iter().map(|e| e.text).collect()
    }

    #[tokio::test]
    async fn test_copier_tags_each_line() {
        let texts = copy_through(b"hello\nworld\n").await;
        assert_eq!(texts, vec!["[gateway] hello", "[gateway] world"]);
    }

    #[tokio::test]
    async fn test_copier_keeps_unterminated_last_line() {
        let texts = copy_through(b"one\ntwo").await;
        assert_eq!(texts, vec!["[gateway] one", "[gateway] two"]);
    }

    #[tokio::test]
    async fn test_copier_strips_crlf() {
        let texts = copy_through(b"windows\r\n").await;
        assert_eq!(texts, vec!["[gateway] windows"]);
    }

    #[tokio::test]
    async fn test_copier_tolerates_invalid_utf8() {
        let texts = copy_through(b"bad \xff byte\n").await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("[gateway] bad "));
        assert!(texts[0].ends_with(" byte"));
    }

    #[tokio::test]
    async fn test_copier_splits_runaway_line() {
        let mut input = vec![b'x'; MAX_LINE_BYTES * 3 + 10];
        input.extend_from_slice(b"\nafter\n");
        let texts = copy_through(&input).await;

        assert_eq!(texts.len(), 5);
        let prefix = format!("{GATEWAY_TAG} ");
        for chunk in &texts[..3] {
            assert_eq!(chunk.len(), prefix.len() + MAX_LINE_BYTES);
        }
        assert_eq!(texts[3], format!("{prefix}{}", "x".repeat(10)));
        assert_eq!(texts[4], "[gateway] after");
    }

    #[tokio::test]
    async fn test_copier_line_of_exactly_max_bytes() {
        let mut input = vec![b'y'; MAX_LINE_BYTES];
        input.extend_from_slice(b"\nnext\n");
        let texts = copy_through(&input).await;
        assert_eq!(texts.len(), 2, "no empty entry for the trailing newline");
        assert!(texts[0].ends_with('y'));
        assert_eq!(texts[1], "[gateway] next");
    }

    #[tokio::test]
    async fn test_copier_empty_input() {
        assert!(copy_through(b"").await.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_copier_finishes_at_eof() {
        let ring = LogRing::new();
        let reader = std::io::Cursor::new(b"from task\n".to_vec());
        spawn_log_copier(LogStream::Stderr, reader, ring.clone())
            .await
            .unwrap();
        assert_eq!(ring.entries()[0].text, "[gateway] from task");
    }
}
