use serde::{Deserialize, Serialize};

/// 识别阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IdentifierPhase {
    #[default]
    Requested,
    Sampling,
    Identifying,
    Detected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Sample buffer cleared and sampling window armed.
    Started,
    Sampled,
    WindowElapsed,
    Decoded,
    Rejected,
    ResetRequested,
}

impl IdentifierPhase {
    /// Pure transition table. Pairs not listed keep the current phase.
    pub fn transition(&self, event: PhaseEvent) -> IdentifierPhase {
        use IdentifierPhase::*;
        use PhaseEvent::*;

        match (self, event) {
            (_, ResetRequested) => Requested,
            (Requested, Started) => Sampling,
            (Sampling, Sampled) => Sampling,
            (Sampling, WindowElapsed) => Identifying,
            (Identifying, Decoded) => Detected,
            (Identifying, Rejected) => Requested,
            (phase, _) => *phase,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IdentifierPhase::Detected)
    }
}
