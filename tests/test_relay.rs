// Integration tests for the streaming relay
// This file should be run with cargo test --test test_relay

#[path = "../src/env.rs"]
mod env;

#[path = "../src/artifacts/mod.rs"]
mod artifacts;

#[path = "../src/relay/mod.rs"]
mod relay;

use artifacts::{ArtifactConfig, ArtifactStore};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use relay::{ClientChannel, RelayConfig, RelayError, RelayOutcome, StreamRelay};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    });
}

/// Client channel that records every event it is given
struct RecordingChannel {
    events: Mutex<Vec<(String, Value)>>,
    closed_tx: watch::Sender<bool>,
}

impl RecordingChannel {
    fn new() -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            closed_tx,
        })
    }

    fn disconnect(&self) {
        self.closed_tx.send_replace(true);
    }

    fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }

    fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl ClientChannel for RecordingChannel {
    async fn emit(&self, event: &str, payload: Value) -> Result<(), RelayError> {
        if *self.closed_tx.borrow() {
            return Err(RelayError::ChannelClosed);
        }
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }

    async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

/// Records events, but holds every `artifactCreated` until the gate opens
struct GatedChannel {
    inner: Arc<RecordingChannel>,
    gate: Semaphore,
}

impl GatedChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: RecordingChannel::new(),
            gate: Semaphore::new(0),
        })
    }

    fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS);
    }
}

#[async_trait]
impl ClientChannel for GatedChannel {
    async fn emit(&self, event: &str, payload: Value) -> Result<(), RelayError> {
        if event == "artifactCreated" {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| RelayError::ChannelClosed)?;
        }
        self.inner.emit(event, payload).await
    }

    async fn closed(&self) {
        self.inner.closed().await
    }
}

fn fragment(content: &str, done: bool) -> Value {
    json!({
        "model": "llama3",
        "created_at": "2024-05-01T12:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": done
    })
}

fn line(value: &Value) -> Vec<u8> {
    let mut bytes = serde_json::to_vec(value).unwrap();
    bytes.push(b'\n');
    bytes
}

type Chunk = Result<Vec<u8>, std::io::Error>;

fn create_relay(dir: &Path) -> StreamRelay {
    let store = ArtifactStore::new(ArtifactConfig::with_root(dir.join("artifacts")));
    StreamRelay::new(Arc::new(store), RelayConfig::default())
}

#[cfg(test)]
mod relay_tests {
    use super::*;

    /// A malformed line between two good fragments is dropped, the rest kept in order
    #[tokio::test]
    async fn test_malformed_line_dropped_in_order() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = RecordingChannel::new();

        let first = fragment("Hello", false);
        let second = fragment(" world", true);
        let chunks: Vec<Chunk> = vec![
            Ok(line(&first)),
            Ok(b"{not json at all\n".to_vec()),
            Ok(line(&second)),
        ];

        let outcome = relay.relay(stream::iter(chunks), channel.clone()).await;

        let events = channel.events();
        assert_eq!(
            channel.names(),
            vec!["messageResponse", "messageResponse", "messageComplete"]
        );
        assert_eq!(events[0].1, first);
        assert_eq!(events[1].1, second);

        let RelayOutcome::Completed(summary) = outcome else {
            panic!("expected completion, got {:?}", outcome);
        };
        assert_eq!(summary.content, "Hello world");
        assert_eq!(summary.fragments, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.artifacts, 0);
    }

    #[tokio::test]
    async fn test_fragment_split_across_reads() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = RecordingChannel::new();

        let first = line(&fragment("split", false));
        let last = serde_json::to_vec(&fragment("", true)).unwrap();
        let (a, rest) = first.split_at(7);
        let (b, c) = rest.split_at(10);
        let chunks: Vec<Chunk> = vec![
            Ok(a.to_vec()),
            Ok(b.to_vec()),
            Ok(c.to_vec()),
            // Final record without a trailing newline
            Ok(last),
        ];

        let outcome = relay.relay(stream::iter(chunks), channel.clone()).await;

        assert_eq!(
            channel.names(),
            vec!["messageResponse", "messageResponse", "messageComplete"]
        );
        assert_eq!(channel.events()[0].1["message"]["content"], "split");
        assert!(matches!(outcome, RelayOutcome::Completed(s) if s.fragments == 2));
    }

    #[tokio::test]
    async fn test_upstream_error_ends_relay() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = RecordingChannel::new();

        let chunks: Vec<Chunk> = vec![
            Ok(line(&fragment("partial", false))),
            Err(std::io::Error::other("connection reset")),
            Ok(line(&fragment("never seen", false))),
        ];

        let outcome = relay.relay(stream::iter(chunks), channel.clone()).await;

        assert_eq!(channel.names(), vec!["messageResponse", "messageError"]);
        assert_eq!(channel.events()[1].1, json!({"error": "connection reset"}));
        assert_eq!(outcome, RelayOutcome::Failed("connection reset".to_string()));
    }

    #[tokio::test]
    async fn test_fenced_block_becomes_artifact() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = RecordingChannel::new();

        let chunks: Vec<Chunk> = vec![
            Ok(line(&fragment("Try this:\n```python\nprint(1)\n```\n", false))),
            Ok(line(&fragment("", true))),
        ];

        let outcome = relay.relay(stream::iter(chunks), channel.clone()).await;

        let events = channel.events();
        let created: Vec<&Value> = events
            .iter()
            .filter(|(name, _)| name == "artifactCreated")
            .map(|(_, payload)| payload)
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0]["kind"], "code");
        assert_eq!(created[0]["mimeType"], "text/x-python");
        assert!(created[0]["name"].as_str().unwrap().ends_with(".py"));
        assert!(created[0].get("content").is_none());

        // Content events keep their order around the notification
        let content: Vec<&str> = events
            .iter()
            .filter(|(name, _)| name != "artifactCreated")
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(
            content,
            vec!["messageResponse", "messageResponse", "messageComplete"]
        );

        let stored = relay.store().list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            relay.store().read(&stored[0].id).await.unwrap(),
            b"print(1)\n"
        );
        assert!(matches!(outcome, RelayOutcome::Completed(s) if s.artifacts == 1));
    }

    /// A save whose notification is stuck must not hold back later fragments
    #[tokio::test]
    async fn test_slow_artifact_notification_does_not_block_stream() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = GatedChannel::new();

        let chunks: Vec<Chunk> = vec![
            Ok(line(&fragment("```bash\necho hi\n```\n", false))),
            Ok(line(&fragment("after the block", false))),
            Ok(line(&fragment("", true))),
        ];

        let task = {
            let channel = channel.clone();
            tokio::spawn(async move { relay.relay(stream::iter(chunks), channel).await })
        };

        let expected = vec![
            "messageResponse",
            "messageResponse",
            "messageResponse",
            "messageComplete",
        ];
        let mut forwarded = false;
        for _ in 0..40 {
            if channel.inner.names() == expected {
                forwarded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(forwarded, "stream stalled: {:?}", channel.inner.names());
        assert!(!task.is_finished());

        channel.open();
        let outcome = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        let names = channel.inner.names();
        assert_eq!(names.len(), 5);
        assert_eq!(names[4], "artifactCreated");
        assert!(matches!(outcome, RelayOutcome::Completed(s) if s.artifacts == 1));
    }

    #[tokio::test]
    async fn test_disconnect_stops_relay() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = RecordingChannel::new();

        let chunks: Vec<Chunk> = vec![Ok(line(&fragment("first", false)))];
        // Upstream that never finishes on its own
        let upstream = stream::iter(chunks).chain(stream::pending());

        let task = {
            let channel = channel.clone();
            tokio::spawn(async move { relay.relay(upstream, channel).await })
        };

        for _ in 0..100 {
            if !channel.events().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        channel.disconnect();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("relay did not stop after disconnect")
            .unwrap();

        assert_eq!(outcome, RelayOutcome::Disconnected);
        assert_eq!(channel.names(), vec!["messageResponse"]);
    }

    #[tokio::test]
    async fn test_oversized_and_blank_lines_skipped() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(ArtifactConfig::with_root(dir.path().join("artifacts")));
        let relay = StreamRelay::new(Arc::new(store), RelayConfig { max_line_bytes: 256 });
        let channel = RecordingChannel::new();

        let huge = line(&fragment(&"x".repeat(1000), false));
        let chunks: Vec<Chunk> = vec![
            Ok(b"\n\n".to_vec()),
            Ok(huge),
            Ok(line(&fragment("ok", true))),
        ];

        let outcome = relay.relay(stream::iter(chunks), channel.clone()).await;

        assert_eq!(channel.names(), vec!["messageResponse", "messageComplete"]);
        let RelayOutcome::Completed(summary) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(summary.content, "ok");
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_empty_upstream_completes() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let relay = create_relay(dir.path());
        let channel = RecordingChannel::new();

        let outcome = relay
            .relay(stream::iter(Vec::<Chunk>::new()), channel.clone())
            .await;

        assert_eq!(channel.names(), vec!["messageComplete"]);
        assert_eq!(
            outcome,
            RelayOutcome::Completed(relay::RelaySummary::default())
        );
    }
}
