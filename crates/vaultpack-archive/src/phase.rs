//! Lifecycle of one pack or unpack operation
//!
//! ```text
//! Idle -> Deriving -> PerFileLoop -> Finalizing -> Done
//!   \________\____________\______________\-----> Error
//! ```
//! `Done` and `Error` are terminal.

use std::fmt;
use tracing::debug;

use vaultpack_core::{VaultError, VaultResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    Idle,
    Deriving,
    PerFileLoop,
    Finalizing,
    Done,
    Error,
}

impl OperationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Deriving),
            Self::Deriving => Some(Self::PerFileLoop),
            Self::PerFileLoop => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Done),
            Self::Done | Self::Error => None,
        }
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Deriving => "deriving",
            Self::PerFileLoop => "per-file-loop",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct PhaseTracker {
    operation: &'static str,
    phase: OperationPhase,
}

impl PhaseTracker {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            phase: OperationPhase::Idle,
        }
    }

    pub fn phase(&self) -> OperationPhase {
        self.phase
    }

    /// Move to `to`, which must be the next phase in sequence.
    pub fn advance(&mut self, to: OperationPhase) -> VaultResult<()> {
        if self.phase.next() != Some(to) {
            return Err(VaultError::Format(format!(
                "{}: illegal phase transition {} -> {}",
                self.operation, self.phase, to
            )));
        }
        debug!(operation = self.operation, from = %self.phase, to = %to, "phase");
        self.phase = to;
        Ok(())
    }

    /// Enter `Error`; a no-op once terminal.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            debug!(operation = self.operation, from = %self.phase, "phase -> error");
            self.phase = OperationPhase::Error;
        }
    }
}
