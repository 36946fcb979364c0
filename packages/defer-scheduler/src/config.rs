use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::queue::CoalescePolicy;

/// Which commit phase a scheduler asks its host to flush in.
///
/// `Layout` runs right after the host commits, before anything is presented.
/// `Passive` runs once the commit is fully done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Layout,
    #[default]
    Passive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    pub policy: CoalescePolicy,
    pub phase: Phase,
    /// Shows up in log records and panic messages.
    pub label: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: CoalescePolicy::default(),
            phase: Phase::default(),
            label: "scheduler".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_policy(mut self, policy: CoalescePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn from_json(source: &str) -> Result<Self, SchedulerError> {
        Ok(serde_json::from_str(source)?)
    }
}
