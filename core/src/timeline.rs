use crate::activation::ActivationId;
use crate::condition::Condition;
use crate::gate::GateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 256;

/// A discrete event in an activation's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A trigger opened a new activation lifetime
    Activated {
        activation: ActivationId,
        timestamp: DateTime<Utc>,
    },
    /// The flow suspended on a gate for the first time and fired its entry effect
    GateEntered {
        activation: ActivationId,
        gate: GateId,
        timestamp: DateTime<Utc>,
    },
    GateSatisfied {
        activation: ActivationId,
        gate: GateId,
        timestamp: DateTime<Utc>,
    },
    /// A gate failed transiently and is waiting for a retry
    Held {
        activation: ActivationId,
        gate: GateId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    Blocked {
        activation: ActivationId,
        gate: GateId,
        timestamp: DateTime<Utc>,
    },
    Rewound {
        activation: ActivationId,
        gate: GateId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// The user walked away from a gate's interruption
    Abandoned {
        activation: ActivationId,
        gate: GateId,
        condition: Condition,
        timestamp: DateTime<Utc>,
    },
    Completed {
        activation: ActivationId,
        timestamp: DateTime<Utc>,
    },
    Reset {
        activation: ActivationId,
        timestamp: DateTime<Utc>,
    },
}

impl TimelineEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Activated { timestamp, .. }
            | TimelineEvent::GateEntered { timestamp, .. }
            | TimelineEvent::GateSatisfied { timestamp, .. }
            | TimelineEvent::Held { timestamp, .. }
            | TimelineEvent::Blocked { timestamp, .. }
            | TimelineEvent::Rewound { timestamp, .. }
            | TimelineEvent::Abandoned { timestamp, .. }
            | TimelineEvent::Completed { timestamp, .. }
            | TimelineEvent::Reset { timestamp, .. } => *timestamp,
        }
    }

    /// Short name of the event kind ("activated", "gate_entered", ...)
    pub fn kind(&self) -> &'static str {
        match self {
            TimelineEvent::Activated { .. } => "activated",
            TimelineEvent::GateEntered { .. } => "gate_entered",
            TimelineEvent::GateSatisfied { .. } => "gate_satisfied",
            TimelineEvent::Held { .. } => "held",
            TimelineEvent::Blocked { .. } => "blocked",
            TimelineEvent::Rewound { .. } => "rewound",
            TimelineEvent::Abandoned { .. } => "abandoned",
            TimelineEvent::Completed { .. } => "completed",
            TimelineEvent::Reset { .. } => "reset",
        }
    }
}

/// A sequential record of the most recent events a controller produced.
///
/// Once `capacity` events are held the oldest one is dropped for each new
/// push, so a long-lived controller keeps a fixed-size tail of its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    events: VecDeque<TimelineEvent>,
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Timeline {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, event: TimelineEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Event kinds in order, handy for assertions and CLI output.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(TimelineEvent::kind).collect()
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
