use std::collections::HashSet;

/// Threads and channels already turned into a conversation unit during one
/// run.
///
/// Callers check and then mark in two separate steps. That is only sound
/// because a run drives its discovery paths strictly one after another; the
/// ledger is never shared across runs or threads.
#[derive(Debug, Default)]
pub struct DedupLedger {
    threads: HashSet<String>,
    channels: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_thread(&self, thread_id: &str) -> bool {
        self.threads.contains(thread_id)
    }

    pub fn mark_thread(&mut self, thread_id: &str) {
        self.threads.insert(thread_id.to_string());
    }

    pub fn seen_channel(&self, channel_id: &str) -> bool {
        self.channels.contains(channel_id)
    }

    pub fn mark_channel(&mut self, channel_id: &str) {
        self.channels.insert(channel_id.to_string());
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
