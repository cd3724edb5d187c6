//! engine::phase
//!
//! The lifecycle phase controller.
//!
//! ```text
//! Declaring --start_resolving--> Resolving --start_fetching--> Fetching
//! ```
//!
//! While `Declaring`, declarations are buffered in issue order and
//! configuration is mutable. Buffered names are only checked for
//! duplicates; token-dependent validation waits for the flush, so naming
//! tokens may still change after a declaration is buffered. Leaving `Declaring` hands the buffer back to
//! the container to be processed in that same order. Phases never go back.

use std::collections::HashSet;

use thiserror::Error;

use super::module::{Declaration, DeclareError};
use crate::core::types::{ModuleName, Phase};

/// Errors from phase-restricted operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("cannot move from phase '{from}' to '{to}'")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("{operation} is only allowed while declaring (current phase: {phase})")]
    ConfigurationClosed {
        operation: &'static str,
        phase: Phase,
    },

    #[error("{operation} is not allowed before resolution starts")]
    NotStarted { operation: &'static str },

    #[error("{} buffered declaration(s) were rejected; first: {}", .0.len(), first_message(.0))]
    Rejected(Vec<DeclareError>),
}

fn first_message(errors: &[DeclareError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

#[derive(Debug)]
pub(crate) struct PhaseController {
    phase: Phase,
    buffer: Vec<Declaration>,
    buffered_names: HashSet<String>,
}

impl Default for PhaseController {
    fn default() -> Self {
        Self {
            phase: Phase::Declaring,
            buffer: Vec::new(),
            buffered_names: HashSet::new(),
        }
    }
}

impl PhaseController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn is_declaring(&self) -> bool {
        self.phase == Phase::Declaring
    }

    /// Fail unless configuration is still open.
    pub(crate) fn require_declaring(&self, operation: &'static str) -> Result<(), PhaseError> {
        if self.is_declaring() {
            Ok(())
        } else {
            Err(PhaseError::ConfigurationClosed {
                operation,
                phase: self.phase,
            })
        }
    }

    /// Fail while configuration is still open.
    pub(crate) fn require_started(&self, operation: &'static str) -> Result<(), PhaseError> {
        if self.is_declaring() {
            Err(PhaseError::NotStarted { operation })
        } else {
            Ok(())
        }
    }

    /// Queue a declaration until resolution starts.
    ///
    /// Duplicates are detected on the name as written.
    pub(crate) fn buffer(&mut self, declaration: Declaration) -> Result<(), DeclareError> {
        if let Some(name) = declaration.name() {
            if !self.buffered_names.insert(name.to_string()) {
                return Err(DeclareError::Duplicate {
                    name: ModuleName::canonical(name),
                });
            }
        }
        self.buffer.push(declaration);
        Ok(())
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// `Declaring -> Resolving`; returns the buffered declarations in
    /// issue order.
    pub(crate) fn begin_resolving(&mut self) -> Result<Vec<Declaration>, PhaseError> {
        self.transition(Phase::Resolving)?;
        self.buffered_names.clear();
        Ok(std::mem::take(&mut self.buffer))
    }

    /// `Resolving -> Fetching`.
    pub(crate) fn begin_fetching(&mut self) -> Result<(), PhaseError> {
        self.transition(Phase::Fetching)
    }

    fn transition(&mut self, to: Phase) -> Result<(), PhaseError> {
        let allowed = matches!(
            (self.phase, to),
            (Phase::Declaring, Phase::Resolving) | (Phase::Resolving, Phase::Fetching)
        );
        if !allowed {
            return Err(PhaseError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::debug!(from = %self.phase, to = %to, "phase transition");
        self.phase = to;
        Ok(())
    }
}
