//! Provision/bind lifecycle state machine.
//!
//! Each orchestration run by [`BrokerClient`](crate::BrokerClient) moves through
//! these stages. Teardown edges let a failed run still unwind what it set up.
//!
//! # State Machine
//!
//! ```text
//!     ┌─────────┐
//!     │  Start  │
//!     └────┬────┘
//!          │ (provision)
//!          ▼
//!     ┌─────────────┐  (bind failed / work done)
//!     │ Provisioned │──────────────────────────────┐
//!     └────┬────────┘                              │
//!          │ (bind)                                │
//!          ▼                                       │
//!     ┌─────────┐  (work failed)                   │
//!     │  Bound  │───────────────┐                  │
//!     └────┬────┘               │                  │
//!          │ (work)             │                  │
//!          ▼                    ▼                  │
//!     ┌──────────┐  (unbind) ┌─────────┐           │
//!     │ WorkDone │──────────▶│ Unbound │           │
//!     └──────────┘           └────┬────┘           │
//!                                 │ (deprovision)  │
//!                                 ▼                ▼
//!                          ┌───────────────────────────┐
//!                          │       Deprovisioned       │
//!                          └───────────────────────────┘
//! ```
//!
//! A failed unbind does not advance the stage, so `Bound` and `WorkDone` may
//! also move straight to `Deprovisioned`.

use std::fmt;

/// A point in a provision/bind orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Nothing has been created yet.
    Start,
    /// A service instance exists.
    Provisioned,
    /// A binding to the instance exists.
    Bound,
    /// The unit of work completed successfully.
    WorkDone,
    /// The binding has been removed.
    Unbound,
    /// The instance has been removed.
    Deprovisioned,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Provisioned => "provisioned",
            Self::Bound => "bound",
            Self::WorkDone => "work_done",
            Self::Unbound => "unbound",
            Self::Deprovisioned => "deprovisioned",
        };
        f.write_str(s)
    }
}

/// A compensating step owed by an orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Remove the binding.
    Unbind,
    /// Remove the instance.
    Deprovision,
}

impl Teardown {
    /// The stage reached once this step succeeds.
    #[must_use]
    pub const fn completed_stage(self) -> Stage {
        match self {
            Self::Unbind => Stage::Unbound,
            Self::Deprovision => Stage::Deprovisioned,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unbind => "unbind",
            Self::Deprovision => "deprovision",
        }
    }
}

/// Check if a stage transition is valid.
#[must_use]
pub const fn is_valid_transition(from: Stage, to: Stage) -> bool {
    use Stage::{Bound, Deprovisioned, Provisioned, Start, Unbound, WorkDone};

    matches!(
        (from, to),
        (Start, Provisioned)
            | (Provisioned, Bound)
            | (Bound, WorkDone)
            // unbind runs whether or not the work succeeded
            | (Bound | WorkDone, Unbound)
            | (Provisioned | Bound | WorkDone | Unbound, Deprovisioned)
    )
}

/// The compensating steps still owed from `stage`, in the order they must run.
#[must_use]
pub fn pending_teardown(stage: Stage) -> Vec<Teardown> {
    match stage {
        Stage::Start | Stage::Deprovisioned => vec![],
        Stage::Provisioned | Stage::Unbound => vec![Teardown::Deprovision],
        Stage::Bound | Stage::WorkDone => vec![Teardown::Unbind, Teardown::Deprovision],
    }
}

/// Returns true once nothing is left to tear down.
#[must_use]
pub const fn is_terminal(stage: Stage) -> bool {
    matches!(stage, Stage::Deprovisioned)
}

/// Tracks the stage of a single orchestration and logs its transitions.
#[derive(Debug)]
pub struct StageTracker {
    stage: Stage,
}

impl StageTracker {
    /// Start tracking a fresh orchestration.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(Stage::Start)
    }

    /// Start tracking from a stage reached outside this orchestration.
    #[must_use]
    pub const fn starting_at(stage: Stage) -> Self {
        Self { stage }
    }

    /// Move to `to`.
    pub fn advance(&mut self, to: Stage) {
        debug_assert!(
            is_valid_transition(self.stage, to),
            "invalid stage transition {} -> {}",
            self.stage,
            to
        );
        tracing::debug!(from = %self.stage, to = %to, "Lifecycle stage changed");
        self.stage = to;
    }

    /// The current stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The compensating steps still owed.
    #[must_use]
    pub fn pending_teardown(&self) -> Vec<Teardown> {
        pending_teardown(self.stage)
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}
