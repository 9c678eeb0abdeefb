/// Numbers outgoing poll requests so late responses can be recognized.
///
/// Only the response to the most recently issued request is applied;
/// anything older, or anything issued before an [`invalidate`](Self::invalidate),
/// is stale.
#[derive(Debug)]
pub struct PollSequence {
    issued: u64,
    completed: bool,
}

impl Default for PollSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl PollSequence {
    pub fn new() -> Self {
        Self {
            issued: 0,
            completed: true,
        }
    }

    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.completed = false;
        self.issued
    }

    /// Marks `seq` as answered. Returns `false` when the response is stale.
    pub fn complete(&mut self, seq: u64) -> bool {
        if seq != self.issued {
            return false;
        }
        self.completed = true;
        true
    }

    /// Orphans every in-flight request.
    pub fn invalidate(&mut self) {
        self.issued += 1;
        self.completed = true;
    }

    /// True while the latest request has not been answered.
    pub fn in_flight(&self) -> bool {
        !self.completed
    }
}
