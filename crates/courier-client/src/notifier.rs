use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courier_core::{ChangeRecord, NotificationDelta, RefreshSnapshot, Sequence};
use tokio::sync::watch;

/// Receives notification changes as the notifier applies them.
///
/// Callbacks run while the notifier holds its apply lock; they must not call
/// back into the notifier.
pub trait NotificationListener: Send + Sync {
    fn on_change(&self, _sequence: Sequence, _change: &ChangeRecord) {}

    fn on_refresh(&self, _snapshot: &RefreshSnapshot) {}
}

/// Read-only view of the last notification sequence applied.
#[derive(Debug, Clone)]
pub struct SequenceReader(watch::Receiver<Option<Sequence>>);

impl SequenceReader {
    pub fn current(&self) -> Option<Sequence> {
        *self.0.borrow()
    }
}

/// Applies deltas and refreshes in sequence order.
///
/// The notifier is the only writer of the sequence register; everything else
/// reads it through a [`SequenceReader`].
pub struct Notifier {
    sequence: watch::Sender<Option<Sequence>>,
    inner: Mutex<NotifierInner>,
}

#[derive(Default)]
struct NotifierInner {
    listeners: Vec<Arc<dyn NotificationListener>>,
    baseline: Option<RefreshSnapshot>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sequence, _) = watch::channel(None);
        Self {
            sequence,
            inner: Mutex::new(NotifierInner::default()),
        }
    }

    pub fn current_sequence(&self) -> Option<Sequence> {
        *self.sequence.borrow()
    }

    pub fn sequence_reader(&self) -> SequenceReader {
        SequenceReader(self.sequence.subscribe())
    }

    pub fn add_listener(&self, listener: Arc<dyn NotificationListener>) {
        self.lock().listeners.push(listener);
    }

    /// Latest refresh applied, if any.
    pub fn baseline(&self) -> Option<RefreshSnapshot> {
        self.lock().baseline.clone()
    }

    /// Applies `delta` unless its sequence is not newer than the last one seen.
    ///
    /// Returns whether the delta was applied.
    pub fn handle_delta(&self, delta: &NotificationDelta) -> bool {
        let inner = self.lock();

        if let Some(last) = self.current_sequence()
            && delta.sequence <= last
        {
            tracing::debug!(
                sequence = delta.sequence.0,
                last_seen = last.0,
                "discarding stale notification"
            );
            return false;
        }

        for change in &delta.changes {
            for listener in &inner.listeners {
                listener.on_change(delta.sequence, change);
            }
        }
        self.sequence.send_replace(Some(delta.sequence));

        tracing::trace!(
            sequence = delta.sequence.0,
            changes = delta.changes.len(),
            "applied notification"
        );
        true
    }

    /// Replaces the baseline and the sequence, whatever was seen before.
    pub fn handle_refresh(&self, snapshot: &RefreshSnapshot) {
        let mut inner = self.lock();

        for listener in &inner.listeners {
            listener.on_refresh(snapshot);
        }
        inner.baseline = Some(snapshot.clone());
        self.sequence.send_replace(Some(snapshot.sequence));

        tracing::debug!(sequence = snapshot.sequence.0, "applied refresh");
    }

    fn lock(&self) -> MutexGuard<'_, NotifierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use courier_core::{ChangeRecord, NotificationDelta, RefreshSnapshot, Sequence};
    use serde_json::json;

    use super::{NotificationListener, Notifier};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u64, String)>>,
        refreshes: Mutex<Vec<u64>>,
    }

    impl NotificationListener for Recorder {
        fn on_change(&self, sequence: Sequence, change: &ChangeRecord) {
            let label = match change {
                ChangeRecord::Created { object, .. } | ChangeRecord::Modified { object, .. } => {
                    object["id"].as_str().unwrap_or_default().to_string()
                }
                ChangeRecord::Deleted { ids } => ids.join(","),
            };
            self.seen.lock().expect("recorder lock").push((sequence.0, label));
        }

        fn on_refresh(&self, snapshot: &RefreshSnapshot) {
            self.refreshes
                .lock()
                .expect("recorder lock")
                .push(snapshot.sequence.0);
        }
    }

    fn delta(sequence: u64, ids: &[&str]) -> NotificationDelta {
        NotificationDelta {
            sequence: Sequence(sequence),
            changes: ids
                .iter()
                .map(|id| ChangeRecord::Modified {
                    kind: "m".to_string(),
                    object: json!({ "id": id }),
                })
                .collect(),
        }
    }

    fn refresh(sequence: u64) -> RefreshSnapshot {
        RefreshSnapshot {
            sequence: Sequence(sequence),
            state: json!({}),
        }
    }

    #[test]
    fn first_delta_applies_when_nothing_seen() {
        let notifier = Notifier::new();
        assert_eq!(notifier.current_sequence(), None);

        assert!(notifier.handle_delta(&delta(3, &["a"])));
        assert_eq!(notifier.current_sequence(), Some(Sequence(3)));
    }

    #[test]
    fn stale_and_duplicate_deltas_leave_state_unchanged() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        notifier.add_listener(recorder.clone());

        assert!(notifier.handle_delta(&delta(5, &["a"])));
        assert!(!notifier.handle_delta(&delta(4, &["old"])));
        assert!(!notifier.handle_delta(&delta(5, &["dup"])));

        assert_eq!(notifier.current_sequence(), Some(Sequence(5)));
        let seen = recorder.seen.lock().expect("recorder lock").clone();
        assert_eq!(seen, vec![(5, "a".to_string())]);
    }

    #[test]
    fn changes_apply_in_list_order() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        notifier.add_listener(recorder.clone());

        notifier.handle_delta(&delta(1, &["x", "y", "z"]));

        let labels: Vec<String> = recorder
            .seen
            .lock()
            .expect("recorder lock")
            .iter()
            .map(|(_, label)| label.clone())
            .collect();
        assert_eq!(labels, ["x", "y", "z"]);
    }

    #[test]
    fn refresh_wins_even_when_older() {
        let notifier = Notifier::new();
        let recorder = Arc::new(Recorder::default());
        notifier.add_listener(recorder.clone());

        notifier.handle_delta(&delta(10, &["a"]));
        notifier.handle_refresh(&refresh(2));

        assert_eq!(notifier.current_sequence(), Some(Sequence(2)));
        assert_eq!(
            notifier.baseline().map(|snapshot| snapshot.sequence),
            Some(Sequence(2))
        );
        assert_eq!(*recorder.refreshes.lock().expect("recorder lock"), vec![2]);

        assert!(notifier.handle_delta(&delta(3, &["b"])));
        assert_eq!(notifier.current_sequence(), Some(Sequence(3)));
    }

    #[test]
    fn reader_observes_committed_sequence() {
        let notifier = Notifier::new();
        let reader = notifier.sequence_reader();

        notifier.handle_delta(&delta(8, &[]));

        assert_eq!(reader.current(), Some(Sequence(8)));
    }
}
