// SPDX-License-Identifier: AGPL-3.0-only

//! Nuclide cascade: multi-generation transmutation simulator
//!
//! Starting from a set of fuel nuclides, repeatedly finds the pairwise
//! reactions possible among the active nuclides, feeds the products back
//! into the pool, and stops on a generation budget, a pool-size budget, or
//! when nothing new is produced. The reaction history is then reduced to
//! deduplicated pathways with frequency, rarity, and feedback-loop flags.
//!
//! ## Modules
//!   - `nuclide` — canonical `"E-A"` identity, fuel parsing
//!   - `reaction` — accepted reactions and collaborator row types
//!   - `source` — `ReactionSource`, the query seam
//!   - `data` — JSON-backed in-memory reaction database, integrity checks
//!   - `rules` — feedback rule engine (phase, quantum statistics, dimers)
//!   - `simulator` — the generation loop and its result
//!   - `progress` — progress messages, cancellation, per-run context
//!   - `harness` — worker thread with request/event channels
//!   - `analysis` — pathway deduplication, rarity, feedback detection
//!
//! ## Binaries
//!   - `cascade_run` — run one cascade and print results (text or JSON)
//!   - `validate_cascade` — self-contained pass/fail checks, exit 0/1

pub mod analysis;
pub mod constants;
pub mod data;
pub mod discovery;
pub mod error;
pub mod harness;
pub mod nuclide;
pub mod params;
pub mod progress;
pub mod reaction;
pub mod rules;
pub mod simulator;
pub mod source;
pub mod validation;

pub use error::{CascadeError, ErrorKind};
pub use nuclide::{parse_fuel, NuclideId};
pub use params::CascadeParams;
pub use simulator::{run_cascade, CascadeResult, TerminationReason};
