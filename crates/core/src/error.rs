// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error kinds (§7).
//!
//! Every crate in the agent funnels its failures through [`AgentError`] so
//! callers can match on [`ErrorKind`] instead of each crate inventing its
//! own taxonomy of "is this fatal" questions.

use thiserror::Error;

/// The four error kinds named in §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Process-fatal: duplicate key on ADD, delete-timer expiry, an
    /// exclusion-policy conflict detected at register time.
    InvariantViolation,
    /// Recoverable: a walker callback failed but the walk continues.
    Transient,
    /// A lookup found nothing.
    NotFound,
    /// A shard queue crossed its high-water mark; apply backpressure.
    Overload,
}

crate::simple_display! {
    ErrorKind {
        InvariantViolation => "invariant violation",
        Transient => "transient",
        NotFound => "not found",
        Overload => "overload",
    }
}

/// The error type shared across `vra-*` crates.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("overload: {0}")]
    Overload(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Transient(_) => ErrorKind::Transient,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Overload(_) => ErrorKind::Overload,
        }
    }

    /// A fatal error is one that §7 says must dump diagnostics and exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvariantViolation)
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn overload(msg: impl Into<String>) -> Self {
        Self::Overload(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
