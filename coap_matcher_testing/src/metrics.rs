//! Helpers for asserting on counters recorded through `metrics`.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Create a debugging recorder and the snapshotter reading it.
#[must_use]
pub fn debugging_recorder() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Counter values captured from one snapshot.
#[derive(Debug, Default)]
pub struct Counters {
    entries: Vec<(String, Vec<(String, String)>, u64)>,
}

impl Counters {
    /// Take a snapshot of every counter `snapshotter` has seen.
    #[must_use]
    pub fn capture(snapshotter: &Snapshotter) -> Self {
        let entries = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => {
                    let labels = key
                        .key()
                        .labels()
                        .map(|label| (label.key().to_owned(), label.value().to_owned()))
                        .collect();
                    Some((key.key().name().to_owned(), labels, count))
                }
                _ => None,
            })
            .collect();
        Self { entries }
    }

    /// Value of counter `name` carrying label `key=value`, or zero when absent.
    #[must_use]
    pub fn value(&self, name: &str, key: &str, value: &str) -> u64 {
        self.entries
            .iter()
            .filter(|(n, labels, _)| {
                n == name && labels.iter().any(|(k, v)| k == key && v == value)
            })
            .map(|(_, _, count)| count)
            .sum()
    }
}
