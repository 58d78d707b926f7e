// SPDX-License-Identifier: AGPL-3.0-only

//! Feedback rule engine.
//!
//! Decides which of a generation's new products may re-enter the active
//! pool, and which candidate reactions may be accepted at all.
//!
//! **Rules, in evaluation order:**
//! - [`PhaseRule`]: products whose element is solid (below melting point) or
//!   vaporized (above boiling point) at the run temperature
//! - [`QuantumStatisticsRule`]: products whose *nuclear* class is gated off
//! - [`DimerRule`]: reactions between two identical dimer-forming nuclides
//!
//! Rules compose by AND: the first rule that excludes decides, and later
//! rules are not consulted. Missing reference data never excludes.
//! The engine only gates admissions; it never removes active nuclides.

use crate::error::CascadeError;
use crate::nuclide::NuclideId;
use crate::params::CascadeParams;
use crate::reaction::{ElementTemperature, QuantumClass, QuantumClassification};
use crate::source::ReactionSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Outcome of a single rule check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    /// Passed this rule.
    Admit,
    /// Excluded, with the reason.
    Exclude(String),
}

/// Reference data a rule needs before it can judge products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataNeeds {
    /// Element melting/boiling points.
    pub temperatures: bool,
    /// Nuclide boson/fermion classification.
    pub classifications: bool,
}

impl DataNeeds {
    fn union(self, other: Self) -> Self {
        Self {
            temperatures: self.temperatures || other.temperatures,
            classifications: self.classifications || other.classifications,
        }
    }
}

/// Reference data fetched once per generation for a product batch.
#[derive(Debug, Default)]
pub struct RuleContext {
    /// Keyed by chemical element (`"H"` for D and T).
    pub temperatures: HashMap<String, ElementTemperature>,
    /// Keyed by nuclide.
    pub classifications: HashMap<NuclideId, QuantumClassification>,
}

/// One inclusion predicate.
///
/// Both hooks default to [`RuleVerdict::Admit`], so a rule implements only
/// the side it cares about.
pub trait FeedbackRule: fmt::Debug + Send + Sync {
    /// Stable name used in [`FeedbackStats`] and log lines.
    fn name(&self) -> &'static str;

    /// Data this rule reads from [`RuleContext`].
    fn data_needs(&self) -> DataNeeds {
        DataNeeds::default()
    }

    /// Judge a candidate reaction by its input pair.
    fn check_reaction(&self, _inputs: &[NuclideId; 2]) -> RuleVerdict {
        RuleVerdict::Admit
    }

    /// Judge a new product before it re-enters the active pool.
    fn check_product(&self, _product: &NuclideId, _ctx: &RuleContext) -> RuleVerdict {
        RuleVerdict::Admit
    }
}

// ═══════════════════════════════════════════════════════════════════
// Phase (temperature) exclusion
// ═══════════════════════════════════════════════════════════════════

/// Excludes products whose element is not liquid at the run temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseRule {
    /// Run temperature (K).
    pub temperature_k: f64,
    /// Exclude when `temperature_k` < melting point.
    pub exclude_melted: bool,
    /// Exclude when `temperature_k` > boiling point.
    pub exclude_boiled_off: bool,
}

impl FeedbackRule for PhaseRule {
    fn name(&self) -> &'static str {
        "phase"
    }

    fn data_needs(&self) -> DataNeeds {
        DataNeeds {
            temperatures: self.exclude_melted || self.exclude_boiled_off,
            classifications: false,
        }
    }

    fn check_product(&self, product: &NuclideId, ctx: &RuleContext) -> RuleVerdict {
        let Some(t) = ctx.temperatures.get(product.chemical_element()) else {
            return RuleVerdict::Admit;
        };
        // Each check runs only on its own point.
        if let Some(melting) = t.melting_point_k.filter(|_| self.exclude_melted) {
            if self.temperature_k < melting {
                return RuleVerdict::Exclude(format!(
                    "{product}: T={} K below melting point {melting} K",
                    self.temperature_k
                ));
            }
        }
        if let Some(boiling) = t.boiling_point_k.filter(|_| self.exclude_boiled_off) {
            if self.temperature_k > boiling {
                return RuleVerdict::Exclude(format!(
                    "{product}: T={} K above boiling point {boiling} K",
                    self.temperature_k
                ));
            }
        }
        RuleVerdict::Admit
    }
}

// ═══════════════════════════════════════════════════════════════════
// Quantum-statistics gating
// ═══════════════════════════════════════════════════════════════════

/// Gates feedback on the nuclear boson/fermion classification.
///
/// The atomic classification is never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantumStatisticsRule {
    /// Admit nuclear bosons.
    pub feedback_bosons: bool,
    /// Admit nuclear fermions.
    pub feedback_fermions: bool,
}

impl FeedbackRule for QuantumStatisticsRule {
    fn name(&self) -> &'static str {
        "quantum-statistics"
    }

    fn data_needs(&self) -> DataNeeds {
        DataNeeds {
            temperatures: false,
            classifications: !(self.feedback_bosons && self.feedback_fermions),
        }
    }

    fn check_product(&self, product: &NuclideId, ctx: &RuleContext) -> RuleVerdict {
        match ctx.classifications.get(product).map(|c| c.nuclear) {
            Some(QuantumClass::Boson) if !self.feedback_bosons => {
                RuleVerdict::Exclude(format!("{product}: nuclear boson feedback disabled"))
            }
            Some(QuantumClass::Fermion) if !self.feedback_fermions => {
                RuleVerdict::Exclude(format!("{product}: nuclear fermion feedback disabled"))
            }
            _ => RuleVerdict::Admit,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Homonuclear-dimer restriction
// ═══════════════════════════════════════════════════════════════════

/// Excludes reactions between two identical nuclides of a diatomic element
/// unless dimers are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimerRule {
    /// Permit dimer reactions.
    pub allow_dimers: bool,
}

impl FeedbackRule for DimerRule {
    fn name(&self) -> &'static str {
        "dimer"
    }

    fn check_reaction(&self, inputs: &[NuclideId; 2]) -> RuleVerdict {
        if !self.allow_dimers && inputs[0] == inputs[1] && inputs[0].is_dimer_forming() {
            RuleVerdict::Exclude(format!("{} + {}: homonuclear dimer", inputs[0], inputs[1]))
        } else {
            RuleVerdict::Admit
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════

/// Exclusion counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    /// Candidate reactions judged.
    pub reactions_screened: usize,
    /// New products judged.
    pub products_screened: usize,
    /// New products admitted to the active pool.
    pub products_admitted: usize,
    /// Exclusions per rule name (reactions and products together).
    pub exclusions: BTreeMap<String, usize>,
}

impl FeedbackStats {
    /// Fraction of screened products that were admitted.
    #[must_use]
    pub fn admission_rate(&self) -> f64 {
        if self.products_screened == 0 {
            return 0.0;
        }
        self.products_admitted as f64 / self.products_screened as f64
    }

    /// Exclusions recorded for `rule`.
    #[must_use]
    pub fn excluded_by(&self, rule: &str) -> usize {
        self.exclusions.get(rule).copied().unwrap_or(0)
    }
}

/// Ordered rule list plus its counters.
#[derive(Debug, Default)]
pub struct FeedbackEngine {
    rules: Vec<Box<dyn FeedbackRule>>,
    stats: FeedbackStats,
}

impl FeedbackEngine {
    /// Empty engine: admits everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The three standard rules configured from `params`, in order
    /// phase → quantum statistics → dimer.
    #[must_use]
    pub fn from_params(params: &CascadeParams) -> Self {
        Self::new()
            .with_rule(Box::new(PhaseRule {
                temperature_k: params.temperature_k,
                exclude_melted: params.exclude_melted,
                exclude_boiled_off: params.exclude_boiled_off,
            }))
            .with_rule(Box::new(QuantumStatisticsRule {
                feedback_bosons: params.feedback_bosons,
                feedback_fermions: params.feedback_fermions,
            }))
            .with_rule(Box::new(DimerRule {
                allow_dimers: params.allow_dimers,
            }))
    }

    /// Append a rule; it is evaluated after all existing rules.
    #[must_use]
    pub fn with_rule(mut self, rule: Box<dyn FeedbackRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name())
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> &FeedbackStats {
        &self.stats
    }

    /// Consume the engine, keeping its counters.
    #[must_use]
    pub fn into_stats(self) -> FeedbackStats {
        self.stats
    }

    /// Whether a candidate reaction with these inputs may be accepted.
    pub fn admits_reaction(&mut self, inputs: &[NuclideId; 2]) -> bool {
        self.stats.reactions_screened += 1;
        for rule in &self.rules {
            if let RuleVerdict::Exclude(reason) = rule.check_reaction(inputs) {
                log::debug!("rule {}: excluded reaction {reason}", rule.name());
                *self.stats.exclusions.entry(rule.name().to_string()).or_insert(0) += 1;
                return false;
            }
        }
        true
    }

    /// Filter a batch of new products down to those every rule admits.
    ///
    /// Reference data is fetched from `source` only if some rule needs it.
    ///
    /// # Errors
    ///
    /// Propagates any collaborator failure from the temperature or
    /// classification lookups.
    pub fn filter_products(
        &mut self,
        candidates: &BTreeSet<NuclideId>,
        source: &dyn ReactionSource,
    ) -> Result<BTreeSet<NuclideId>, CascadeError> {
        if candidates.is_empty() {
            return Ok(BTreeSet::new());
        }
        let ctx = self.fetch_context(candidates, source)?;

        let mut admitted = BTreeSet::new();
        'candidates: for product in candidates {
            self.stats.products_screened += 1;
            for rule in &self.rules {
                if let RuleVerdict::Exclude(reason) = rule.check_product(product, &ctx) {
                    log::debug!("rule {}: excluded {reason}", rule.name());
                    *self.stats.exclusions.entry(rule.name().to_string()).or_insert(0) += 1;
                    continue 'candidates;
                }
            }
            self.stats.products_admitted += 1;
            admitted.insert(product.clone());
        }
        Ok(admitted)
    }

    fn fetch_context(
        &self,
        candidates: &BTreeSet<NuclideId>,
        source: &dyn ReactionSource,
    ) -> Result<RuleContext, CascadeError> {
        let needs = self
            .rules
            .iter()
            .fold(DataNeeds::default(), |acc, r| acc.union(r.data_needs()));

        let mut ctx = RuleContext::default();
        if needs.temperatures {
            let elements: BTreeSet<String> = candidates
                .iter()
                .map(|n| n.chemical_element().to_string())
                .collect();
            ctx.temperatures = source.element_temperature_data(&elements)?;
        }
        if needs.classifications {
            ctx.classifications = source.nuclide_quantum_classification(candidates)?;
        }
        Ok(ctx)
    }
}
