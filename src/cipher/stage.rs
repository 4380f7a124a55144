use std::fmt;

/// Where a single encrypt/decrypt invocation is
///
/// `Idle -> KeyDerivation -> Streaming -> Finalizing -> Done | Failed`.
/// A failed invocation is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    KeyDerivation,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::KeyDerivation => "key derivation",
            Stage::Streaming => "streaming",
            Stage::Finalizing => "finalizing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of one invocation and logs transitions
#[derive(Debug)]
pub(crate) struct StageTracker {
    current: Stage,
}

impl StageTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: Stage::Idle,
        }
    }

    pub(crate) fn current(&self) -> Stage {
        self.current
    }

    pub(crate) fn enter(&mut self, next: Stage) {
        debug_assert!(!self.current.is_terminal(), "stage {} is terminal", self.current);
        tracing::trace!(from = %self.current, to = %next, "stage");
        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_walks_stages() {
        let mut tracker = StageTracker::new();
        assert_eq!(tracker.current(), Stage::Idle);

        for stage in [Stage::KeyDerivation, Stage::Streaming, Stage::Finalizing, Stage::Done] {
            tracker.enter(stage);
            assert_eq!(tracker.current(), stage);
        }
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(Stage::KeyDerivation.to_string(), "key derivation");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }
}
