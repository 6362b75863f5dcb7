//! The aggregating output sink: a fan-out publisher of line chunks
//! that also retains the full concatenation, so `current()` is always a
//! self-contained snapshot even with no subscribers.

use std::sync::Mutex;

use peasant_types::LineSink;
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

pub struct OutputSink {
    current: Mutex<String>,
    sender: broadcast::Sender<String>,
}

impl OutputSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            current: Mutex::new(String::new()),
            sender,
        }
    }

    /// The full concatenation of every line pushed so far, each newline-terminated.
    pub fn current(&self) -> String {
        self.current.lock().expect("output sink lock poisoned").clone()
    }

    /// Subscribe to chunks published after this call. Chunks published
    /// before subscribing are not replayed; `current()` is the way to catch up.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    fn push(&self, chunk: &str) {
        // Append under the lock first, then broadcast — so no subscriber can
        // observe the broadcast message before `current()` already reflects it.
        let mut current = self.current.lock().expect("output sink lock poisoned");
        current.push_str(chunk);
        current.push('\n');
        // A send with no receivers is not an error; late subscribers only lose
        // the chunk, `current()` remains valid per C3's retention guarantee.
        let _ = self.sender.send(chunk.to_string());
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSink for OutputSink {
    fn push_line(&self, line: String) {
        self.push(&line);
    }
}
