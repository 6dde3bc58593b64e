use std::fmt;

use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Stages of one backup run.
///
/// A run normally walks `Idle` through `Done` in declaration order.
/// `Aborted` is terminal and can only be entered from `Initializing` or
/// `Exporting`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Initializing,
    Exporting,
    Uploading,
    Aggregating,
    Notifying,
    CleaningUp,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }

    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, Exporting)
                | (Initializing, Aborted)
                | (Exporting, Uploading)
                | (Exporting, Aborted)
                | (Uploading, Aggregating)
                | (Aggregating, Notifying)
                | (Notifying, CleaningUp)
                | (CleaningUp, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Initializing => "initializing",
            PipelineState::Exporting => "exporting",
            PipelineState::Uploading => "uploading",
            PipelineState::Aggregating => "aggregating",
            PipelineState::Notifying => "notifying",
            PipelineState::CleaningUp => "cleaning_up",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus every state visited so far.
#[derive(Debug, Clone)]
pub struct StateTracker {
    visited: Vec<PipelineState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            visited: vec![PipelineState::Idle],
        }
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PipelineState {
        self.visited
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    pub fn visited(&self) -> &[PipelineState] {
        &self.visited
    }

    pub fn transition(&mut self, next: PipelineState) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            bail!("Illegal pipeline transition {} -> {}", current, next);
        }
        debug!("Pipeline {} -> {}", current, next);
        self.visited.push(next);
        Ok(())
    }
}
