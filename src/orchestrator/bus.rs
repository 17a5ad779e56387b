//! Message bus seam used by the orchestrator.
//!
//! Received messages stay invisible to later receives until they are deleted
//! or released back to their queue, for every implementation in this module.

use glob::glob;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const SPOOL_POLL_INTERVAL: Duration = Duration::from_millis(50);
const INFLIGHT_DIR: &str = ".inflight";

#[derive(Debug, Error)]
pub enum BusError {
    #[error("message bus unavailable: {0}")]
    Unavailable(String),

    #[error("unknown receipt {receipt} for {queue}")]
    UnknownReceipt { queue: String, receipt: String },

    #[error("spool I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One received message. The receipt is only meaningful to the bus that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub receipt: String,
    pub body: String,
}

pub trait MessageBus {
    /// Publish a payload and return the message id assigned by the bus
    fn publish(&self, topic: &str, payload: &str) -> Result<String, BusError>;

    /// Receive up to `max_messages`, waiting at most `wait` when the queue is empty
    fn receive(&self, queue: &str, max_messages: usize, wait: Duration) -> Result<Vec<Envelope>, BusError>;

    fn delete(&self, queue: &str, receipt: &str) -> Result<(), BusError>;

    /// Return a received message to the back of its queue so another consumer can take it
    fn release(&self, queue: &str, receipt: &str) -> Result<(), BusError>;
}

impl<B: MessageBus + ?Sized> MessageBus for &B {
    fn publish(&self, topic: &str, payload: &str) -> Result<String, BusError> {
        (**self).publish(topic, payload)
    }

    fn receive(&self, queue: &str, max_messages: usize, wait: Duration) -> Result<Vec<Envelope>, BusError> {
        (**self).receive(queue, max_messages, wait)
    }

    fn delete(&self, queue: &str, receipt: &str) -> Result<(), BusError> {
        (**self).delete(queue, receipt)
    }

    fn release(&self, queue: &str, receipt: &str) -> Result<(), BusError> {
        (**self).release(queue, receipt)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    published: HashMap<String, Vec<String>>,
    queues: HashMap<String, VecDeque<Envelope>>,
    inflight: HashMap<String, HashMap<String, Envelope>>,
}

/// Process-local bus. Clones share the same queues, so a test can keep a
/// handle and feed results while the orchestrator polls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    inner: Arc<(Mutex<MemoryState>, Condvar)>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, BusError> {
        self.inner
            .0
            .lock()
            .map_err(|_| BusError::Unavailable("in-memory bus lock poisoned".to_string()))
    }

    /// Enqueue a raw body on a queue, as a subscribed topic would
    pub fn push(&self, queue: &str, body: impl Into<String>) -> Result<(), BusError> {
        let mut state = self.lock()?;
        state.queues.entry(queue.to_string()).or_default().push_back(Envelope {
            receipt: Uuid::new_v4().to_string(),
            body: body.into(),
        });
        self.inner.1.notify_all();
        Ok(())
    }

    /// Every payload published to a topic, oldest first
    pub fn published(&self, topic: &str) -> Vec<String> {
        self.lock()
            .map(|state| state.published.get(topic).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Messages neither received nor deleted yet
    pub fn pending(&self, queue: &str) -> usize {
        self.lock()
            .map(|state| state.queues.get(queue).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Messages received but not deleted
    pub fn inflight(&self, queue: &str) -> usize {
        self.lock()
            .map(|state| state.inflight.get(queue).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<String, BusError> {
        let mut state = self.lock()?;
        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push(payload.to_string());
        Ok(Uuid::new_v4().to_string())
    }

    fn receive(&self, queue: &str, max_messages: usize, wait: Duration) -> Result<Vec<Envelope>, BusError> {
        let deadline = Instant::now() + wait;
        let mut state = self.lock()?;

        loop {
            let available = state.queues.get(queue).map_or(0, VecDeque::len);
            if available > 0 {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let (guard, _) = self
                .inner
                .1
                .wait_timeout(state, deadline - now)
                .map_err(|_| BusError::Unavailable("in-memory bus lock poisoned".to_string()))?;
            state = guard;
        }

        let mut received = Vec::new();
        if let Some(pending) = state.queues.get_mut(queue) {
            while received.len() < max_messages {
                match pending.pop_front() {
                    Some(envelope) => received.push(envelope),
                    None => break,
                }
            }
        }

        let inflight = state.inflight.entry(queue.to_string()).or_default();
        for envelope in &received {
            inflight.insert(envelope.receipt.clone(), envelope.clone());
        }
        Ok(received)
    }

    fn delete(&self, queue: &str, receipt: &str) -> Result<(), BusError> {
        let mut state = self.lock()?;
        state
            .inflight
            .get_mut(queue)
            .and_then(|inflight| inflight.remove(receipt))
            .map(|_| ())
            .ok_or_else(|| BusError::UnknownReceipt {
                queue: queue.to_string(),
                receipt: receipt.to_string(),
            })
    }

    fn release(&self, queue: &str, receipt: &str) -> Result<(), BusError> {
        let mut state = self.lock()?;
        let envelope = state
            .inflight
            .get_mut(queue)
            .and_then(|inflight| inflight.remove(receipt))
            .ok_or_else(|| BusError::UnknownReceipt {
                queue: queue.to_string(),
                receipt: receipt.to_string(),
            })?;
        state.queues.entry(queue.to_string()).or_default().push_back(envelope);
        self.inner.1.notify_all();
        Ok(())
    }
}

/// Directory-backed bus: one directory per topic or queue, one JSON file per message.
///
/// Files are consumed in name order. Receiving moves a file into the queue's
/// `.inflight/` directory and the receipt is that new path.
#[derive(Debug, Clone)]
pub struct SpoolBus {
    root: PathBuf,
}

impl SpoolBus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn channel_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Drop a message file into a queue, as a subscribed topic would
    pub fn push(&self, queue: &str, body: &str) -> Result<PathBuf, BusError> {
        let dir = self.channel_dir(queue);
        write_message(&dir, body)
    }

    fn list_messages(&self, queue: &str) -> Vec<PathBuf> {
        let pattern = self.channel_dir(queue).join("*.json");
        let mut files: Vec<PathBuf> = match glob(&pattern.to_string_lossy()) {
            Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }

    fn claim(&self, queue: &str, path: &Path) -> Result<Option<Envelope>, BusError> {
        let inflight_dir = self.channel_dir(queue).join(INFLIGHT_DIR);
        fs::create_dir_all(&inflight_dir).map_err(|source| BusError::Io {
            path: inflight_dir.clone(),
            source,
        })?;

        let Some(file_name) = path.file_name() else {
            return Ok(None);
        };
        let claimed = inflight_dir.join(file_name);

        // Another consumer may have claimed the file between listing and renaming
        if fs::rename(path, &claimed).is_err() {
            debug!("Message {} was claimed by another consumer", path.display());
            return Ok(None);
        }

        let body = fs::read_to_string(&claimed).map_err(|source| BusError::Io {
            path: claimed.clone(),
            source,
        })?;

        Ok(Some(Envelope {
            receipt: claimed.to_string_lossy().into_owned(),
            body,
        }))
    }

    fn inflight_path(&self, queue: &str, receipt: &str) -> Result<PathBuf, BusError> {
        let path = PathBuf::from(receipt);
        let inflight_dir = self.channel_dir(queue).join(INFLIGHT_DIR);
        if path.parent() != Some(inflight_dir.as_path()) {
            return Err(BusError::UnknownReceipt {
                queue: queue.to_string(),
                receipt: receipt.to_string(),
            });
        }
        Ok(path)
    }
}

/// Fresh `{stamp}-{uuid}` stem; name order is arrival order
fn message_stem() -> String {
    format!("{}-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%6f"), Uuid::new_v4())
}

fn write_message(dir: &Path, body: &str) -> Result<PathBuf, BusError> {
    fs::create_dir_all(dir).map_err(|source| BusError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = message_stem();
    let staging = dir.join(format!(".{}.tmp", stem));
    let target = dir.join(format!("{}.json", stem));

    fs::write(&staging, body).map_err(|source| BusError::Io {
        path: staging.clone(),
        source,
    })?;
    fs::rename(&staging, &target).map_err(|source| BusError::Io {
        path: target.clone(),
        source,
    })?;
    Ok(target)
}

impl MessageBus for SpoolBus {
    fn publish(&self, topic: &str, payload: &str) -> Result<String, BusError> {
        let path = write_message(&self.channel_dir(topic), payload)?;
        Ok(path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    fn receive(&self, queue: &str, max_messages: usize, wait: Duration) -> Result<Vec<Envelope>, BusError> {
        let deadline = Instant::now() + wait;

        loop {
            let mut received = Vec::new();
            for path in self.list_messages(queue) {
                if received.len() >= max_messages {
                    break;
                }
                if let Some(envelope) = self.claim(queue, &path)? {
                    received.push(envelope);
                }
            }

            let now = Instant::now();
            if !received.is_empty() || now >= deadline {
                return Ok(received);
            }
            thread::sleep(SPOOL_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn delete(&self, queue: &str, receipt: &str) -> Result<(), BusError> {
        let path = self.inflight_path(queue, receipt)?;
        fs::remove_file(&path).map_err(|source| BusError::Io { path, source })
    }

    fn release(&self, queue: &str, receipt: &str) -> Result<(), BusError> {
        let path = self.inflight_path(queue, receipt)?;
        // Renamed with a new stamp so it sorts after messages already waiting
        let target = self.channel_dir(queue).join(format!("{}.json", message_stem()));
        fs::rename(&path, &target).map_err(|source| BusError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_in_memory_receive_hides_until_delete() {
        let bus = InMemoryBus::new();
        bus.push("results", "one").unwrap();
        bus.push("results", "two").unwrap();
        bus.push("results", "three").unwrap();

        let batch = bus.receive("results", 2, Duration::ZERO).unwrap();
        assert_eq!(batch.iter().map(|e| e.body.as_str()).collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(bus.pending("results"), 1);
        assert_eq!(bus.inflight("results"), 2);

        bus.delete("results", &batch[0].receipt).unwrap();
        assert_eq!(bus.inflight("results"), 1);
        assert!(bus.delete("results", &batch[0].receipt).is_err());
    }

    #[test]
    fn test_in_memory_release_requeues_at_back() {
        let bus = InMemoryBus::new();
        bus.push("results", "foreign").unwrap();
        bus.push("results", "mine").unwrap();

        let batch = bus.receive("results", 1, Duration::ZERO).unwrap();
        assert_eq!(batch[0].body, "foreign");
        bus.release("results", &batch[0].receipt).unwrap();
        assert_eq!(bus.inflight("results"), 0);
        assert_eq!(bus.pending("results"), 2);

        let batch = bus.receive("results", 10, Duration::ZERO).unwrap();
        assert_eq!(batch.iter().map(|e| e.body.as_str()).collect::<Vec<_>>(), vec!["mine", "foreign"]);
        assert!(bus.release("results", "unknown").is_err());
    }

    #[test]
    fn test_in_memory_receive_waits_when_empty() {
        let bus = InMemoryBus::new();
        let started = Instant::now();
        let batch = bus.receive("results", 10, Duration::from_millis(100)).unwrap();
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_in_memory_receive_wakes_on_push() {
        let bus = InMemoryBus::new();
        let producer = bus.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.push("results", "late").unwrap();
        });

        let batch = bus.receive("results", 10, Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "late");
    }

    #[test]
    fn test_in_memory_publish_records_payload() {
        let bus = InMemoryBus::new();
        let id = bus.publish("trigger", "{}").unwrap();
        assert!(!id.is_empty());
        assert_eq!(bus.published("trigger"), vec!["{}"]);
        assert!(bus.published("other").is_empty());
    }

    #[test]
    fn test_spool_round_trip() {
        let temp_dir = tempdir().unwrap();
        let bus = SpoolBus::new(temp_dir.path());

        bus.publish("trigger", r#"{"uuid":"x"}"#).unwrap();
        let published: Vec<_> = fs::read_dir(bus.channel_dir("trigger")).unwrap().collect();
        assert_eq!(published.len(), 1);

        bus.push("results", "first").unwrap();
        bus.push("results", "second").unwrap();

        let batch = bus.receive("results", 10, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].body, "first");
        assert_eq!(batch[1].body, "second");

        // Claimed messages are not received twice
        assert!(bus.receive("results", 10, Duration::ZERO).unwrap().is_empty());

        for envelope in &batch {
            bus.delete("results", &envelope.receipt).unwrap();
            assert!(!Path::new(&envelope.receipt).exists());
        }
    }

    #[test]
    fn test_spool_release_makes_message_visible_again() {
        let temp_dir = tempdir().unwrap();
        let bus = SpoolBus::new(temp_dir.path());
        bus.push("results", "foreign").unwrap();

        let batch = bus.receive("results", 10, Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 1);
        bus.release("results", &batch[0].receipt).unwrap();
        assert!(!Path::new(&batch[0].receipt).exists());

        let again = bus.receive("results", 10, Duration::ZERO).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].body, "foreign");
        assert_ne!(again[0].receipt, batch[0].receipt);
    }

    #[test]
    fn test_spool_rejects_foreign_receipt() {
        let temp_dir = tempdir().unwrap();
        let bus = SpoolBus::new(temp_dir.path());
        let outside = temp_dir.path().join("elsewhere.json");
        fs::write(&outside, "{}").unwrap();

        let result = bus.delete("results", &outside.to_string_lossy());
        assert!(matches!(result, Err(BusError::UnknownReceipt { .. })));
        assert!(outside.exists());
    }

    #[test]
    fn test_spool_missing_queue_is_empty() {
        let temp_dir = tempdir().unwrap();
        let bus = SpoolBus::new(temp_dir.path());
        assert!(bus.receive("nothing", 10, Duration::ZERO).unwrap().is_empty());
    }
}
