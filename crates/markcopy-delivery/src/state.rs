//! Delivery state machine — explicit states and legal transition guards.
//!
//! Every dispatch starts at `Idle` and ends at `Delivered` or
//! `TerminalFailure`. The driving loop in the coordinator calls `advance()`
//! and the machine keeps an auditable transition log.

use std::fmt;

use chrono::{DateTime, Utc};
use markcopy_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Idle,
    /// Short readiness probe against an agent that may already be loaded.
    ProbingFast,
    /// Entering (or re-entering) the inject-and-confirm path.
    ProbingSlow,
    Injecting,
    /// Polling readiness with progressive backoff after injection.
    ProbingReady,
    Delivering,
    /// A slow-path attempt failed; retry or give up.
    RetryOrFail,
    Delivered,
    TerminalFailure,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::TerminalFailure)
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::ProbingFast => "ProbingFast",
            Self::ProbingSlow => "ProbingSlow",
            Self::Injecting => "Injecting",
            Self::ProbingReady => "ProbingReady",
            Self::Delivering => "Delivering",
            Self::RetryOrFail => "RetryOrFail",
            Self::Delivered => "Delivered",
            Self::TerminalFailure => "TerminalFailure",
        };
        write!(f, "{}", name)
    }
}

/// ```text
/// Idle → ProbingFast
/// ProbingFast → Delivered | ProbingSlow
/// ProbingSlow → Injecting
/// Injecting → ProbingReady | RetryOrFail
/// ProbingReady → Delivering | RetryOrFail
/// Delivering → Delivered | RetryOrFail
/// RetryOrFail → ProbingSlow | TerminalFailure
/// ```
/// plus any non-terminal state → TerminalFailure.
fn is_legal_transition(from: DeliveryState, to: DeliveryState) -> bool {
    use DeliveryState::*;

    if to == TerminalFailure && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Idle, ProbingFast)
            | (ProbingFast, Delivered)
            | (ProbingFast, ProbingSlow)
            | (ProbingSlow, Injecting)
            | (Injecting, ProbingReady)
            | (Injecting, RetryOrFail)
            | (ProbingReady, Delivering)
            | (ProbingReady, RetryOrFail)
            | (Delivering, Delivered)
            | (Delivering, RetryOrFail)
            | (RetryOrFail, ProbingSlow)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DeliveryState,
    pub to: DeliveryState,
    /// Slow-path attempt number (0 before the slow path).
    pub attempt: u32,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// State of one dispatch.
#[derive(Debug)]
pub struct DeliveryMachine {
    current: DeliveryState,
    attempt: u32,
    transitions: Vec<TransitionRecord>,
}

impl DeliveryMachine {
    pub fn new() -> Self {
        Self {
            current: DeliveryState::Idle,
            attempt: 0,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> DeliveryState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    /// Move to `to`, or `Error::Internal` if the edge does not exist.
    pub fn advance(&mut self, to: DeliveryState, reason: Option<&str>) -> Result<()> {
        if !is_legal_transition(self.current, to) {
            return Err(Error::Internal(format!(
                "Illegal delivery transition: {} → {}",
                self.current, to
            )));
        }

        debug!(
            "Delivery transition {} → {} (attempt {})",
            self.current, to, self.attempt
        );
        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            at: Utc::now(),
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// Visited states, starting with `Idle`.
    pub fn path(&self) -> Vec<DeliveryState> {
        std::iter::once(DeliveryState::Idle)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }
}

impl Default for DeliveryMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeliveryState::*;

    #[test]
    fn test_fast_path() {
        let mut machine = DeliveryMachine::new();
        machine.advance(ProbingFast, None).unwrap();
        machine.advance(Delivered, Some("agent resident")).unwrap();
        assert!(machine.is_terminal());
        assert_eq!(machine.path(), vec![Idle, ProbingFast, Delivered]);
    }

    #[test]
    fn test_retry_loop_edges() {
        let mut machine = DeliveryMachine::new();
        for state in [ProbingFast, ProbingSlow, Injecting, RetryOrFail, ProbingSlow, Injecting] {
            machine.advance(state, None).unwrap();
        }
        machine.advance(ProbingReady, None).unwrap();
        machine.advance(Delivering, None).unwrap();
        machine.advance(Delivered, None).unwrap();
        assert_eq!(machine.transitions().len(), 9);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut machine = DeliveryMachine::new();
        assert!(machine.advance(Delivering, None).is_err());
        machine.advance(TerminalFailure, Some("restricted")).unwrap();
        assert!(machine.advance(TerminalFailure, None).is_err());
        assert!(machine.advance(ProbingFast, None).is_err());
    }
}
