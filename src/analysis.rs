// SPDX-License-Identifier: AGPL-3.0-only

//! Pathway analysis over a reaction history.
//!
//! A pathway is the exact ordered `(inputs, outputs)` signature of a
//! reaction; every reaction with that signature counts toward it, whatever
//! its generation or energy. Rarity is relative to the most frequent
//! pathway of the same batch, so it is recomputed on every snapshot.
//!
//! Feedback: a pathway is a feedback loop when one of its outputs is used
//! as an input at a generation strictly later than the first generation in
//! which that output was produced.

use crate::nuclide::NuclideId;
use crate::reaction::{CascadeReaction, ReactionKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Deduplicated statistics for one pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwayAnalysis {
    /// Inputs, in reaction order.
    pub inputs: Vec<NuclideId>,
    /// Outputs, in reaction order.
    pub outputs: Vec<NuclideId>,
    /// Fusion or two-to-two.
    #[serde(rename = "type")]
    pub kind: ReactionKind,
    /// Number of matching reactions.
    pub frequency: usize,
    /// `total_energy_mev / frequency`.
    #[serde(rename = "averageEnergyMeV")]
    pub average_energy_mev: f64,
    /// Sum of matching reaction energies.
    #[serde(rename = "totalEnergyMeV")]
    pub total_energy_mev: f64,
    /// Sorted distinct generations.
    pub generations_seen: Vec<usize>,
    /// An output is recirculated as a later input.
    pub is_feedback: bool,
    /// `100 × frequency / max frequency` within the batch.
    pub rarity_score: f64,
}

impl PathwayAnalysis {
    /// `"H-1 + Li-7 → Be-8"`.
    #[must_use]
    pub fn signature(&self) -> String {
        let join = |ids: &[NuclideId]| {
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" + ")
        };
        format!("{} → {}", join(&self.inputs), join(&self.outputs))
    }

    fn mentions(&self, needle_lower: &str) -> bool {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .any(|n| n.to_string().to_lowercase().contains(needle_lower))
    }
}

#[derive(Debug, Clone)]
struct PathwayGroup {
    inputs: Vec<NuclideId>,
    outputs: Vec<NuclideId>,
    kind: ReactionKind,
    frequency: usize,
    total_energy_mev: f64,
    generations: BTreeSet<usize>,
}

/// Incremental pathway statistics, usable while a run is still streaming
/// reactions.
#[derive(Debug, Clone, Default)]
pub struct PathwayAccumulator {
    index: HashMap<(Vec<NuclideId>, Vec<NuclideId>), usize>,
    groups: Vec<PathwayGroup>,
    first_produced: HashMap<NuclideId, usize>,
    last_consumed: HashMap<NuclideId, usize>,
    reactions: usize,
}

impl PathwayAccumulator {
    /// Empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one reaction.
    pub fn push(&mut self, reaction: &CascadeReaction) {
        let key = (reaction.inputs.to_vec(), reaction.outputs.clone());
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                self.groups.push(PathwayGroup {
                    inputs: key.0.clone(),
                    outputs: key.1.clone(),
                    kind: reaction.kind,
                    frequency: 0,
                    total_energy_mev: 0.0,
                    generations: BTreeSet::new(),
                });
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[slot];
        group.frequency += 1;
        group.total_energy_mev += reaction.energy_mev;
        group.generations.insert(reaction.generation);

        let g = reaction.generation;
        for out in &reaction.outputs {
            self.first_produced
                .entry(out.clone())
                .and_modify(|e| *e = (*e).min(g))
                .or_insert(g);
        }
        for input in &reaction.inputs {
            self.last_consumed
                .entry(input.clone())
                .and_modify(|e| *e = (*e).max(g))
                .or_insert(g);
        }
        self.reactions += 1;
    }

    /// Add a batch of reactions, e.g. one generation's progress payload.
    pub fn extend<'r>(&mut self, reactions: impl IntoIterator<Item = &'r CascadeReaction>) {
        for r in reactions {
            self.push(r);
        }
    }

    /// Distinct pathways so far.
    #[must_use]
    pub fn pathway_count(&self) -> usize {
        self.groups.len()
    }

    /// Reactions seen so far.
    #[must_use]
    pub const fn reaction_count(&self) -> usize {
        self.reactions
    }

    fn recirculated(&self, nuclide: &NuclideId) -> bool {
        match (self.first_produced.get(nuclide), self.last_consumed.get(nuclide)) {
            (Some(&produced), Some(&consumed)) => consumed > produced,
            _ => false,
        }
    }

    /// Current pathways, most frequent first (ties keep first-seen order).
    #[must_use]
    pub fn snapshot(&self) -> Vec<PathwayAnalysis> {
        let max_frequency = self.groups.iter().map(|g| g.frequency).max().unwrap_or(0);
        let mut pathways: Vec<PathwayAnalysis> = self
            .groups
            .iter()
            .map(|g| PathwayAnalysis {
                inputs: g.inputs.clone(),
                outputs: g.outputs.clone(),
                kind: g.kind,
                frequency: g.frequency,
                average_energy_mev: g.total_energy_mev / g.frequency as f64,
                total_energy_mev: g.total_energy_mev,
                generations_seen: g.generations.iter().copied().collect(),
                is_feedback: g.outputs.iter().any(|o| self.recirculated(o)),
                rarity_score: 100.0 * g.frequency as f64 / max_frequency as f64,
            })
            .collect();
        pathways.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        pathways
    }
}

/// Deduplicate and score a reaction list.
///
/// # Example
///
/// ```
/// use nuclide_cascade::analysis::analyze_pathways;
///
/// assert!(analyze_pathways(&[]).is_empty());
/// ```
#[must_use]
pub fn analyze_pathways(reactions: &[CascadeReaction]) -> Vec<PathwayAnalysis> {
    let mut acc = PathwayAccumulator::new();
    acc.extend(reactions);
    acc.snapshot()
}

/// Query over analyzed pathways.
#[derive(Debug, Clone, PartialEq)]
pub struct PathwayFilter {
    /// Keep pathways with at least this frequency.
    pub min_frequency: usize,
    /// Keep pathways whose average energy is at least this (MeV).
    pub min_average_energy_mev: Option<f64>,
    /// Keep fusion pathways.
    pub include_fusion: bool,
    /// Keep two-to-two pathways.
    pub include_two_to_two: bool,
    /// Keep only feedback pathways.
    pub feedback_only: bool,
    /// Case-insensitive substring matched against every input and output.
    pub search: Option<String>,
    /// Cap on results, applied last.
    pub limit: Option<usize>,
}

impl Default for PathwayFilter {
    fn default() -> Self {
        Self {
            min_frequency: 0,
            min_average_energy_mev: None,
            include_fusion: true,
            include_two_to_two: true,
            feedback_only: false,
            search: None,
            limit: None,
        }
    }
}

impl PathwayFilter {
    /// Whether one pathway passes every criterion except the limit.
    #[must_use]
    pub fn matches(&self, p: &PathwayAnalysis) -> bool {
        if p.frequency < self.min_frequency {
            return false;
        }
        if self
            .min_average_energy_mev
            .is_some_and(|min| p.average_energy_mev < min)
        {
            return false;
        }
        let kind_ok = match p.kind {
            ReactionKind::Fusion => self.include_fusion,
            ReactionKind::TwoToTwo => self.include_two_to_two,
        };
        if !kind_ok || (self.feedback_only && !p.is_feedback) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => p.mentions(&needle.to_lowercase()),
            _ => true,
        }
    }

    /// Filter, sort by descending frequency, then apply the limit.
    #[must_use]
    pub fn apply<'p>(&self, pathways: &'p [PathwayAnalysis]) -> Vec<&'p PathwayAnalysis> {
        let mut kept: Vec<&PathwayAnalysis> = pathways.iter().filter(|p| self.matches(p)).collect();
        kept.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        if let Some(limit) = self.limit {
            kept.truncate(limit);
        }
        kept
    }
}

/// Batch-level totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathwaySummary {
    /// Distinct pathways.
    pub unique_pathways: usize,
    /// Pathways flagged as feedback loops.
    pub feedback_pathways: usize,
    /// Reactions across all pathways.
    pub total_reactions: usize,
    /// Energy across all pathways (MeV).
    #[serde(rename = "totalEnergyMeV")]
    pub total_energy_mev: f64,
}

impl PathwaySummary {
    /// Totals over `pathways`.
    #[must_use]
    pub fn from_pathways(pathways: &[PathwayAnalysis]) -> Self {
        Self {
            unique_pathways: pathways.len(),
            feedback_pathways: pathways.iter().filter(|p| p.is_feedback).count(),
            total_reactions: pathways.iter().map(|p| p.frequency).sum(),
            total_energy_mev: pathways.iter().map(|p| p.total_energy_mev).sum(),
        }
    }
}
