// SPDX-License-Identifier: AGPL-3.0-only

//! Progress messages, cooperative cancellation, and the per-run context.
//!
//! A [`RunContext`] bundles everything one simulation borrows from its
//! caller: the reaction source, the cancellation signal, and the progress
//! sink. Nothing here is global; two harnesses running side by side share
//! only the (read-only) source.

use crate::constants::{
    PROGRESS_CALCULATING_ENERGY, PROGRESS_FINALIZING, PROGRESS_PREPARING_RESULTS,
};
use crate::reaction::CascadeReaction;
use crate::source::ReactionSource;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a progress message reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum ProgressPhase {
    /// A generation finished its acceptance pass.
    Generation {
        /// Reactions accepted in this generation, in acceptance order.
        reactions: Vec<CascadeReaction>,
    },
    /// The loop has stopped; energy totalling is about to start.
    Finalizing,
    /// One energy batch has been summed.
    CalculatingEnergy {
        /// Reactions summed so far.
        processed: usize,
        /// Reactions to sum.
        total: usize,
    },
    /// Involved nuclides and elements are being resolved.
    PreparingResults,
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Generation index (for finalization phases: generations executed).
    pub generation: usize,
    /// Generation budget of the run.
    pub total_generations: usize,
    /// Phase-specific payload.
    #[serde(flatten)]
    pub phase: ProgressPhase,
}

impl ProgressUpdate {
    /// Accepted-reaction count, or a negative sentinel for finalization
    /// phases (`-1` finalizing, `-2` calculating energy, `-3` preparing
    /// results).
    #[must_use]
    pub fn accepted_count(&self) -> i64 {
        match &self.phase {
            ProgressPhase::Generation { reactions } => {
                i64::try_from(reactions.len()).unwrap_or(i64::MAX)
            }
            ProgressPhase::Finalizing => PROGRESS_FINALIZING,
            ProgressPhase::CalculatingEnergy { .. } => PROGRESS_CALCULATING_ENERGY,
            ProgressPhase::PreparingResults => PROGRESS_PREPARING_RESULTS,
        }
    }

    /// Reactions accepted in this generation (empty for finalization phases).
    #[must_use]
    pub fn reactions(&self) -> &[CascadeReaction] {
        match &self.phase {
            ProgressPhase::Generation { reactions } => reactions,
            _ => &[],
        }
    }

    /// Whether this is a per-generation message.
    #[must_use]
    pub const fn is_generation(&self) -> bool {
        matches!(self.phase, ProgressPhase::Generation { .. })
    }
}

/// Polled by the simulator at generation boundaries.
pub trait CancelSignal {
    /// Whether the run should stop at this boundary.
    fn is_cancelled(&self) -> bool;
}

/// Never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared flag for cancelling a run from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next generation boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancelSignal for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one run borrows from its caller.
pub struct RunContext<'a> {
    source: &'a dyn ReactionSource,
    cancel: &'a dyn CancelSignal,
    progress: Box<dyn FnMut(ProgressUpdate) + 'a>,
}

impl<'a> RunContext<'a> {
    /// Context with a no-op progress sink.
    #[must_use]
    pub fn new(source: &'a dyn ReactionSource, cancel: &'a dyn CancelSignal) -> Self {
        Self {
            source,
            cancel,
            progress: Box::new(|_| {}),
        }
    }

    /// Replace the progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: impl FnMut(ProgressUpdate) + 'a) -> Self {
        self.progress = Box::new(sink);
        self
    }

    /// The reaction source for this run.
    #[must_use]
    pub fn source(&self) -> &'a dyn ReactionSource {
        self.source
    }

    /// Poll the cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Deliver one progress message.
    pub fn report(&mut self, update: ProgressUpdate) {
        (self.progress)(update);
    }
}

impl std::fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn update(phase: ProgressPhase) -> ProgressUpdate {
        ProgressUpdate {
            generation: 2,
            total_generations: 5,
            phase,
        }
    }

    #[test]
    fn sentinels_for_finalization_phases() {
        assert_eq!(update(ProgressPhase::Finalizing).accepted_count(), -1);
        assert_eq!(
            update(ProgressPhase::CalculatingEnergy {
                processed: 0,
                total: 0
            })
            .accepted_count(),
            -2
        );
        assert_eq!(update(ProgressPhase::PreparingResults).accepted_count(), -3);
        let g = update(ProgressPhase::Generation { reactions: vec![] });
        assert_eq!(g.accepted_count(), 0);
        assert!(g.is_generation());
    }

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
        assert!(!NeverCancel.is_cancelled());
    }

    #[test]
    fn wire_form_is_tagged() {
        let json = serde_json::to_value(update(ProgressPhase::CalculatingEnergy {
            processed: 1000,
            total: 2500,
        }))
        .unwrap();
        assert_eq!(json["phase"], "calculatingEnergy");
        assert_eq!(json["processed"], 1000);
        assert_eq!(json["totalGenerations"], 5);
    }
}
