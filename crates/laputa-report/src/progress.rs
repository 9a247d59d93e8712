//! Progress Types
//!
//! Returned by every resumable driver after each bounded slice of work.

use serde::{Deserialize, Serialize};

/// Position of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCursor {
    pub trial: u32,
    pub stage: u32,
    pub step: u32,
}

/// Outcome of one slice of work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Progress {
    /// More work remains. `fraction` is in [0, 1].
    Running { cursor: StepCursor, fraction: f64 },
    /// All trials have been run and final statistics recorded.
    Finished,
    /// The cancel flag was raised between slices.
    Cancelled,
}

impl Progress {
    pub fn is_finished(&self) -> bool {
        matches!(self, Progress::Finished)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Progress::Running { .. })
    }

    /// Completed fraction, 1.0 once finished.
    pub fn fraction(&self) -> f64 {
        match self {
            Progress::Running { fraction, .. } => *fraction,
            Progress::Finished => 1.0,
            Progress::Cancelled => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let running = Progress::Running {
            cursor: StepCursor::default(),
            fraction: 0.25,
        };
        assert!(running.is_running());
        assert_eq!(running.fraction(), 0.25);
        assert!(Progress::Finished.is_finished());
        assert_eq!(Progress::Finished.fraction(), 1.0);
    }

    #[test]
    fn test_progress_serializes_state_tag() {
        let json = serde_json::to_string(&Progress::Cancelled).unwrap();
        assert_eq!(json, "{\"state\":\"cancelled\"}");
    }
}
