// SPDX-License-Identifier: AGPL-3.0-only

//! Cascade simulator: bounded fixed-point expansion of the active pool.
//!
//! **State machine:** `Initializing → Iterating → {Completed | Cancelled | Failed}`
//!
//! Each generation:
//! 1. stop (`max_nuclides`) if the pool has outgrown its budget
//! 2. query fusion and two-to-two candidates among the active elements
//! 3. accept candidates whose inputs are active, whose output(s) are new,
//!    and which pass the reaction-level rules
//! 4. report progress, filter the new products through the feedback rules
//! 5. admit novel products, advance the generation, and stop on
//!    `max_loops` (checked first) or `no_new_products`
//!
//! Cancellation is polled before every generation and once more before
//! finalization. A cancelled or failed run returns no partial result.

use crate::constants::ENERGY_BATCH_SIZE;
use crate::error::CascadeError;
use crate::nuclide::{parse_fuel, NuclideId};
use crate::params::CascadeParams;
use crate::progress::{NeverCancel, ProgressPhase, ProgressUpdate, RunContext};
use crate::reaction::{CascadeReaction, ElementDetails, NuclideDetails};
use crate::rules::{FeedbackEngine, FeedbackStats};
use crate::source::ReactionSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of a simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationPhase {
    /// Fuel parsed, pool seeded, no generation run yet.
    Initializing,
    /// At least one generation has run and no stop condition has fired.
    Iterating,
    /// Stopped on a termination reason; result produced.
    Completed,
    /// Cancellation observed at a generation boundary.
    Cancelled,
    /// A collaborator error aborted the run.
    Failed,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The active pool exceeded `max_nuclides`.
    MaxNuclides,
    /// A generation admitted nothing that had not been admitted before.
    NoNewProducts,
    /// The generation budget was used up.
    MaxLoops,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxNuclides => write!(f, "max_nuclides"),
            Self::NoNewProducts => write!(f, "no_new_products"),
            Self::MaxLoops => write!(f, "max_loops"),
        }
    }
}

/// Mutable state owned by exactly one run.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    active: BTreeSet<NuclideId>,
    processed: BTreeSet<NuclideId>,
    product_distribution: BTreeMap<NuclideId, usize>,
    reactions: Vec<CascadeReaction>,
    generation: usize,
    termination: Option<TerminationReason>,
}

impl SimulationState {
    fn seeded(fuel: &[NuclideId]) -> Self {
        Self {
            active: fuel.iter().cloned().collect(),
            ..Self::default()
        }
    }

    /// Nuclides eligible as reaction inputs. Never shrinks.
    #[must_use]
    pub const fn active_nuclides(&self) -> &BTreeSet<NuclideId> {
        &self.active
    }

    /// Nuclides admitted through feedback at least once.
    #[must_use]
    pub const fn processed_nuclides(&self) -> &BTreeSet<NuclideId> {
        &self.processed
    }

    /// Occurrences of each nuclide as a reaction output.
    #[must_use]
    pub const fn product_distribution(&self) -> &BTreeMap<NuclideId, usize> {
        &self.product_distribution
    }

    /// Accepted reactions in generation-then-acceptance order.
    #[must_use]
    pub fn reactions(&self) -> &[CascadeReaction] {
        &self.reactions
    }

    /// Generations completed so far.
    #[must_use]
    pub const fn generation(&self) -> usize {
        self.generation
    }

    /// Set once a stop condition fires.
    #[must_use]
    pub const fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    fn record(&mut self, reaction: &CascadeReaction, new_products: &mut BTreeSet<NuclideId>) {
        for out in &reaction.outputs {
            *self.product_distribution.entry(out.clone()).or_insert(0) += 1;
            new_products.insert(out.clone());
        }
    }
}

/// Output of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeResult {
    /// Parameters the run was started with.
    pub params: CascadeParams,
    /// Parsed fuel, order and duplicates preserved.
    pub fuel: Vec<NuclideId>,
    /// Every accepted reaction.
    pub reactions: Vec<CascadeReaction>,
    /// Output occurrence counts.
    pub product_distribution: BTreeMap<NuclideId, usize>,
    /// Reference data for nuclides referenced by any reaction.
    pub nuclides: Vec<NuclideDetails>,
    /// Reference data for chemical elements referenced by any reaction.
    pub elements: Vec<ElementDetails>,
    /// Sum of reaction energies, in acceptance order.
    #[serde(rename = "totalEnergyMeV")]
    pub total_energy_mev: f64,
    /// Generations executed.
    pub generations: usize,
    /// Wall-clock time from start to result.
    pub execution_time: Duration,
    /// Why the loop stopped.
    pub termination: TerminationReason,
    /// Feedback rule counters.
    pub feedback_stats: FeedbackStats,
}

impl CascadeResult {
    /// Plain-text report for terminals and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        use std::fmt::Write;
        let fuel: Vec<String> = self.fuel.iter().map(ToString::to_string).collect();
        let mut s = String::new();
        let _ = writeln!(s, "  Cascade summary:");
        let _ = writeln!(s, "    Fuel:              {}", fuel.join(", "));
        let _ = writeln!(s, "    Temperature:       {} K", self.params.temperature_k);
        let _ = writeln!(
            s,
            "    Generations:       {}/{} ({})",
            self.generations, self.params.max_loops, self.termination
        );
        let _ = writeln!(s, "    Reactions:         {}", self.reactions.len());
        let _ = writeln!(s, "    Distinct products: {}", self.product_distribution.len());
        let _ = writeln!(s, "    Total energy:      {:.3} MeV", self.total_energy_mev);
        let _ = writeln!(
            s,
            "    Feedback:          {}/{} products admitted",
            self.feedback_stats.products_admitted, self.feedback_stats.products_screened
        );
        for (rule, n) in &self.feedback_stats.exclusions {
            let _ = writeln!(s, "      excluded by {rule}: {n}");
        }
        let _ = writeln!(
            s,
            "    Execution time:    {:.1} ms",
            self.execution_time.as_secs_f64() * 1e3
        );
        s
    }

    /// Products ranked by occurrence count, most frequent first.
    #[must_use]
    pub fn top_products(&self, n: usize) -> Vec<(&NuclideId, usize)> {
        let mut ranked: Vec<(&NuclideId, usize)> =
            self.product_distribution.iter().map(|(k, &v)| (k, v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// One simulation run.
#[derive(Debug)]
pub struct CascadeSimulator {
    params: CascadeParams,
    fuel: Vec<NuclideId>,
    engine: FeedbackEngine,
    state: SimulationState,
    phase: SimulationPhase,
}

impl CascadeSimulator {
    /// Validate parameters, parse fuel, and seed the active pool.
    ///
    /// # Errors
    ///
    /// [`CascadeError::InvalidParameters`], [`CascadeError::InvalidNuclideFormat`]
    /// or [`CascadeError::NoValidFuel`], before any generation runs.
    pub fn new(params: CascadeParams) -> Result<Self, CascadeError> {
        params.validate()?;
        let fuel = parse_fuel(&params.fuel)?;
        let engine = FeedbackEngine::from_params(&params);
        Ok(Self {
            state: SimulationState::seeded(&fuel),
            params,
            fuel,
            engine,
            phase: SimulationPhase::Initializing,
        })
    }

    /// Replace the feedback rule set.
    #[must_use]
    pub fn with_engine(mut self, engine: FeedbackEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn phase(&self) -> SimulationPhase {
        self.phase
    }

    /// Current run state.
    #[must_use]
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Parsed fuel.
    #[must_use]
    pub fn fuel(&self) -> &[NuclideId] {
        &self.fuel
    }

    /// Run one generation. Returns the termination reason once a stop
    /// condition fires; further calls are no-ops returning the same reason.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures; the simulator is then `Failed`.
    pub fn step(
        &mut self,
        ctx: &mut RunContext<'_>,
    ) -> Result<Option<TerminationReason>, CascadeError> {
        if let Some(reason) = self.state.termination {
            return Ok(Some(reason));
        }
        match self.generation(ctx) {
            Ok(reason) => {
                self.state.termination = reason;
                self.phase = if reason.is_some() {
                    SimulationPhase::Completed
                } else {
                    SimulationPhase::Iterating
                };
                Ok(reason)
            }
            Err(e) => {
                self.phase = SimulationPhase::Failed;
                Err(e)
            }
        }
    }

    fn generation(
        &mut self,
        ctx: &mut RunContext<'_>,
    ) -> Result<Option<TerminationReason>, CascadeError> {
        let g = self.state.generation;
        if self.state.active.len() > self.params.max_nuclides {
            log::info!(
                "generation {g}: {} active nuclides exceed max {}",
                self.state.active.len(),
                self.params.max_nuclides
            );
            return Ok(Some(TerminationReason::MaxNuclides));
        }

        let elements: BTreeSet<String> = self
            .state
            .active
            .iter()
            .map(|n| n.element().to_string())
            .collect();
        let source = ctx.source();
        let fusion = source.query_fusion_reactions(&elements, self.params.min_fusion_mev)?;
        let two_to_two =
            source.query_two_to_two_reactions(&elements, self.params.min_two_to_two_mev)?;
        log::debug!(
            "generation {g}: {} elements, {} fusion and {} two-to-two candidates",
            elements.len(),
            fusion.len(),
            two_to_two.len()
        );

        let active = &self.state.active;
        let mut accepted = Vec::new();
        for c in &fusion {
            if active.contains(&c.input1)
                && active.contains(&c.input2)
                && !active.contains(&c.output)
                && self.engine.admits_reaction(&[c.input1.clone(), c.input2.clone()])
            {
                accepted.push(c.accept(g));
            }
        }
        for c in &two_to_two {
            if active.contains(&c.input1)
                && active.contains(&c.input2)
                && (!active.contains(&c.output1) || !active.contains(&c.output2))
                && self.engine.admits_reaction(&[c.input1.clone(), c.input2.clone()])
            {
                accepted.push(c.accept(g));
            }
        }

        let mut new_products = BTreeSet::new();
        for r in &accepted {
            self.state.record(r, &mut new_products);
        }
        ctx.report(ProgressUpdate {
            generation: g,
            total_generations: self.params.max_loops,
            phase: ProgressPhase::Generation {
                reactions: accepted.clone(),
            },
        });
        let n_accepted = accepted.len();
        self.state.reactions.extend(accepted);

        let admitted = self.engine.filter_products(&new_products, source)?;
        let novel = admitted.iter().any(|n| !self.state.processed.contains(n));
        if novel {
            self.state.active.extend(admitted.iter().cloned());
            self.state.processed.extend(admitted);
        }
        self.state.generation += 1;
        log::info!(
            "generation {g}: {n_accepted} reactions accepted, {} active nuclides",
            self.state.active.len()
        );

        if self.state.generation >= self.params.max_loops {
            Ok(Some(TerminationReason::MaxLoops))
        } else if novel {
            Ok(None)
        } else {
            Ok(Some(TerminationReason::NoNewProducts))
        }
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// - [`CascadeError::Cancelled`] if cancellation is observed at a
    ///   generation boundary
    /// - collaborator errors from any query, unchanged
    pub fn run(mut self, ctx: &mut RunContext<'_>) -> Result<CascadeResult, CascadeError> {
        let start = Instant::now();
        let termination = loop {
            if ctx.is_cancelled() {
                return Err(self.cancelled());
            }
            if let Some(reason) = self.step(ctx)? {
                break reason;
            }
        };
        if ctx.is_cancelled() {
            return Err(self.cancelled());
        }
        log::info!(
            "cascade stopped after {} generations: {termination}",
            self.state.generation
        );
        self.finalize(ctx, termination, start)
    }

    fn cancelled(&mut self) -> CascadeError {
        log::info!("cascade cancelled at generation {}", self.state.generation);
        self.phase = SimulationPhase::Cancelled;
        CascadeError::Cancelled
    }

    fn finalize(
        self,
        ctx: &mut RunContext<'_>,
        termination: TerminationReason,
        start: Instant,
    ) -> Result<CascadeResult, CascadeError> {
        let generations = self.state.generation;
        let total_generations = self.params.max_loops;
        let update = |phase: ProgressPhase| ProgressUpdate {
            generation: generations,
            total_generations,
            phase,
        };

        ctx.report(update(ProgressPhase::Finalizing));

        let total = self.state.reactions.len();
        let mut total_energy_mev = 0.0;
        let mut processed = 0;
        for batch in self.state.reactions.chunks(ENERGY_BATCH_SIZE) {
            total_energy_mev += batch.iter().map(|r| r.energy_mev).sum::<f64>();
            processed += batch.len();
            ctx.report(update(ProgressPhase::CalculatingEnergy { processed, total }));
        }
        if total == 0 {
            ctx.report(update(ProgressPhase::CalculatingEnergy {
                processed: 0,
                total: 0,
            }));
        }

        ctx.report(update(ProgressPhase::PreparingResults));
        let involved: BTreeSet<NuclideId> = self
            .state
            .reactions
            .iter()
            .flat_map(|r| r.inputs.iter().chain(&r.outputs))
            .cloned()
            .collect();
        let elements: BTreeSet<String> = involved
            .iter()
            .map(|n| n.chemical_element().to_string())
            .collect();
        let source = ctx.source();
        let nuclides = source.resolve_nuclide_details(&involved)?;
        let elements = source.resolve_element_details(&elements)?;

        Ok(CascadeResult {
            fuel: self.fuel,
            reactions: self.state.reactions,
            product_distribution: self.state.product_distribution,
            nuclides,
            elements,
            total_energy_mev,
            generations,
            execution_time: start.elapsed(),
            termination,
            feedback_stats: self.engine.into_stats(),
            params: self.params,
        })
    }
}

/// Run a cascade synchronously with no cancellation and no progress sink.
///
/// # Errors
///
/// Any error [`CascadeSimulator::new`] or [`CascadeSimulator::run`] returns.
pub fn run_cascade(
    params: &CascadeParams,
    source: &dyn ReactionSource,
) -> Result<CascadeResult, CascadeError> {
    let cancel = NeverCancel;
    let mut ctx = RunContext::new(source, &cancel);
    CascadeSimulator::new(params.clone())?.run(&mut ctx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::data::{DatabaseTables, ReactionDatabase};

    // H-1 + Li-7 → Be-8, then Be-8 + H-1 → B-9, then B-9 + H-1 → C-10.
    const CHAIN: &str = r#"{
        "fusion": [
            {"E1":"H","A1":1,"Z1":1,"E2":"Li","A2":7,"Z2":3,"E":"Be","A":8,"Z":4,"MeV":17.255},
            {"E1":"Be","A1":8,"Z1":4,"E2":"H","A2":1,"Z2":1,"E":"B","A":9,"Z":5,"MeV":-0.185},
            {"E1":"B","A1":9,"Z1":5,"E2":"H","A2":1,"Z2":1,"E":"C","A":10,"Z":6,"MeV":4.007}
        ]
    }"#;

    fn chain_db() -> ReactionDatabase {
        ReactionDatabase::from_tables(&DatabaseTables::from_json_str(CHAIN).unwrap())
    }

    fn params(max_loops: usize) -> CascadeParams {
        CascadeParams {
            fuel: vec!["H-1".into(), "Li7".into()],
            temperature_k: 1000.0,
            min_fusion_mev: -1.0,
            min_two_to_two_mev: 0.0,
            max_nuclides: 100,
            max_loops,
            feedback_bosons: true,
            feedback_fermions: true,
            allow_dimers: true,
            exclude_melted: false,
            exclude_boiled_off: false,
        }
    }

    #[test]
    fn chain_runs_one_link_per_generation() {
        let db = chain_db();
        let result = run_cascade(&params(10), &db).unwrap();
        let gens: Vec<usize> = result.reactions.iter().map(|r| r.generation).collect();
        assert_eq!(gens, [0, 1, 2]);
        assert_eq!(result.termination, TerminationReason::NoNewProducts);
        assert_eq!(result.generations, 4);
        assert!((result.total_energy_mev - (17.255 - 0.185 + 4.007)).abs() < 1e-12);
    }

    #[test]
    fn step_exposes_monotone_pool() {
        let db = chain_db();
        let cancel = NeverCancel;
        let mut ctx = RunContext::new(&db, &cancel);
        let mut sim = CascadeSimulator::new(params(10)).unwrap();
        assert_eq!(sim.phase(), SimulationPhase::Initializing);
        let mut sizes = vec![sim.state().active_nuclides().len()];
        while sim.step(&mut ctx).unwrap().is_none() {
            assert_eq!(sim.phase(), SimulationPhase::Iterating);
            sizes.push(sim.state().active_nuclides().len());
        }
        assert_eq!(sim.phase(), SimulationPhase::Completed);
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(sizes, [2, 3, 4, 5]);
    }

    #[test]
    fn max_loops_wins_over_no_new_products() {
        // Budget of 3: generation 2 still admits C-10 when the budget runs out.
        let db = chain_db();
        let result = run_cascade(&params(3), &db).unwrap();
        assert_eq!(result.termination, TerminationReason::MaxLoops);
        assert_eq!(result.generations, 3);

        // Budget of 4: generation 3 finds nothing new, and is also the last.
        let result = run_cascade(&params(4), &db).unwrap();
        assert_eq!(result.termination, TerminationReason::MaxLoops);
    }

    #[test]
    fn max_nuclides_stops_before_querying() {
        let db = chain_db();
        let mut p = params(10);
        p.max_nuclides = 3;
        let result = run_cascade(&p, &db).unwrap();
        assert_eq!(result.termination, TerminationReason::MaxNuclides);
        assert_eq!(result.reactions.len(), 2);
        assert_eq!(result.generations, 2);
    }

    #[test]
    fn bad_fuel_fails_before_any_generation() {
        let mut p = params(3);
        p.fuel = vec!["H".into()];
        assert!(matches!(
            CascadeSimulator::new(p),
            Err(CascadeError::InvalidNuclideFormat(_))
        ));
        let mut p = params(3);
        p.fuel = vec![" ".into()];
        assert_eq!(CascadeSimulator::new(p).unwrap_err(), CascadeError::NoValidFuel);
    }

    #[test]
    fn pre_cancelled_run_returns_nothing() {
        let db = chain_db();
        let token = crate::progress::CancellationToken::new();
        token.cancel();
        let mut ctx = RunContext::new(&db, &token);
        let err = CascadeSimulator::new(params(10)).unwrap().run(&mut ctx).unwrap_err();
        assert_eq!(err, CascadeError::Cancelled);
    }

    #[test]
    fn finalization_phases_follow_generations() {
        let db = chain_db();
        let cancel = NeverCancel;
        let mut seen = Vec::new();
        let mut ctx = RunContext::new(&db, &cancel).with_progress(|u| seen.push(u.accepted_count()));
        CascadeSimulator::new(params(10)).unwrap().run(&mut ctx).unwrap();
        drop(ctx);
        assert_eq!(seen, [1, 1, 1, 0, -1, -2, -3]);
    }

    #[test]
    fn summary_mentions_termination() {
        let db = chain_db();
        let result = run_cascade(&params(10), &db).unwrap();
        let s = result.summary();
        assert!(s.contains("no_new_products"));
        assert!(s.contains("H-1, Li-7"));
        assert_eq!(result.top_products(1).len(), 1);
    }
}
