//! Lifecycle conditions

use crate::provider::UserVisibleState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle condition of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Create has been issued
    Creating,
    /// Provider reports the resource ready
    Available,
    /// Provider reports any state other than ready
    Unavailable,
    /// Delete has been issued
    Deleting,
}

impl Condition {
    pub fn is_ready(&self) -> bool {
        matches!(self, Condition::Available)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Creating => write!(f, "creating"),
            Condition::Available => write!(f, "available"),
            Condition::Unavailable => write!(f, "unavailable"),
            Condition::Deleting => write!(f, "deleting"),
        }
    }
}

/// Map the provider state to a condition
pub fn condition_for<S: UserVisibleState>(state: S) -> Condition {
    if state.is_ready() {
        Condition::Available
    } else {
        Condition::Unavailable
    }
}

/// A condition and when it was last entered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub condition: Condition,
    pub last_transition_time: DateTime<Utc>,
}

impl ConditionRecord {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            last_transition_time: Utc::now(),
        }
    }

    /// Replace `previous` with `condition`. The transition time is kept when
    /// the condition did not change.
    pub fn transition(previous: Option<&ConditionRecord>, condition: Condition) -> Self {
        match previous {
            Some(prev) if prev.condition == condition => prev.clone(),
            _ => Self::new(condition),
        }
    }
}
