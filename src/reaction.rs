// SPDX-License-Identifier: AGPL-3.0-only

//! Reaction records and collaborator row types.
//!
//! [`CascadeReaction`] is what a simulation accepts and keeps; the
//! `*Candidate` rows are what the reaction source returns for a query, and
//! the remaining types carry per-nuclide and per-element reference data.

use crate::nuclide::NuclideId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reaction topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReactionKind {
    /// Two inputs combine into one output.
    Fusion,
    /// Two inputs transform into two outputs.
    TwoToTwo,
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fusion => write!(f, "fusion"),
            Self::TwoToTwo => write!(f, "two-to-two"),
        }
    }
}

/// Neutrino involvement tag carried by every tabulated reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeutrinoClass {
    /// No neutrino emitted or absorbed.
    #[default]
    None,
    /// Left-handed neutrino involvement.
    #[serde(alias = "left-handed")]
    Left,
    /// Right-handed neutrino involvement.
    #[serde(alias = "right-handed")]
    Right,
}

/// Boson/fermion classification (`b`/`f` in the tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantumClass {
    /// Integer spin.
    #[serde(rename = "b")]
    Boson,
    /// Half-integer spin.
    #[serde(rename = "f")]
    Fermion,
}

impl QuantumClass {
    /// Classification of a composite of `n` spin-½ constituents.
    #[must_use]
    pub const fn of_constituents(n: u32) -> Self {
        if n % 2 == 0 {
            Self::Boson
        } else {
            Self::Fermion
        }
    }
}

/// Nuclear and atomic quantum statistics of one nuclide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantumClassification {
    /// Nucleus alone (A nucleons).
    pub nuclear: QuantumClass,
    /// Neutral atom (A nucleons + Z electrons).
    pub atomic: QuantumClass,
}

/// One accepted reaction of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReaction {
    /// Fusion or two-to-two.
    #[serde(rename = "type")]
    pub kind: ReactionKind,
    /// Exactly two inputs, in table order.
    pub inputs: [NuclideId; 2],
    /// One output for fusion, two for two-to-two.
    pub outputs: Vec<NuclideId>,
    /// Energy released (negative: endothermic).
    #[serde(rename = "MeV")]
    pub energy_mev: f64,
    /// Generation in which the reaction was accepted.
    pub generation: usize,
    /// Neutrino tag copied from the table row.
    pub neutrino: NeutrinoClass,
}

impl CascadeReaction {
    /// Whether both inputs are the same nuclide.
    #[must_use]
    pub fn is_dimer(&self) -> bool {
        self.inputs[0] == self.inputs[1]
    }
}

impl fmt::Display for CascadeReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outputs: Vec<String> = self.outputs.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{} + {} → {} ({:.3} MeV, gen {})",
            self.inputs[0],
            self.inputs[1],
            outputs.join(" + "),
            self.energy_mev,
            self.generation
        )
    }
}

/// Fusion row returned by a reaction query.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionCandidate {
    /// First input.
    pub input1: NuclideId,
    /// Second input.
    pub input2: NuclideId,
    /// Single output.
    pub output: NuclideId,
    /// Energy released.
    pub energy_mev: f64,
    /// Neutrino tag.
    pub neutrino: NeutrinoClass,
}

impl FusionCandidate {
    /// Promote to an accepted reaction in `generation`.
    #[must_use]
    pub fn accept(&self, generation: usize) -> CascadeReaction {
        CascadeReaction {
            kind: ReactionKind::Fusion,
            inputs: [self.input1.clone(), self.input2.clone()],
            outputs: vec![self.output.clone()],
            energy_mev: self.energy_mev,
            generation,
            neutrino: self.neutrino,
        }
    }
}

/// Two-to-two row returned by a reaction query.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoToTwoCandidate {
    /// First input.
    pub input1: NuclideId,
    /// Second input.
    pub input2: NuclideId,
    /// First output.
    pub output1: NuclideId,
    /// Second output.
    pub output2: NuclideId,
    /// Energy released.
    pub energy_mev: f64,
    /// Neutrino tag.
    pub neutrino: NeutrinoClass,
}

impl TwoToTwoCandidate {
    /// Promote to an accepted reaction in `generation`.
    #[must_use]
    pub fn accept(&self, generation: usize) -> CascadeReaction {
        CascadeReaction {
            kind: ReactionKind::TwoToTwo,
            inputs: [self.input1.clone(), self.input2.clone()],
            outputs: vec![self.output1.clone(), self.output2.clone()],
            energy_mev: self.energy_mev,
            generation,
            neutrino: self.neutrino,
        }
    }
}

/// Melting and boiling points of one chemical element (kelvin).
///
/// Either point may be missing (helium has no melting point at 1 atm).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementTemperature {
    /// Melting point (K).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub melting_point_k: Option<f64>,
    /// Boiling point (K).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boiling_point_k: Option<f64>,
}

/// Reference data for one nuclide, attached to a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NuclideDetails {
    /// Identity.
    pub id: NuclideId,
    /// Atomic number Z.
    pub atomic_number: u32,
    /// Atomic mass (u).
    pub atomic_mass_u: f64,
    /// Total binding energy (MeV).
    pub binding_energy_mev: f64,
    /// Quantum statistics.
    pub classification: QuantumClassification,
    /// log₁₀ of the half-life in seconds; `None` for stable nuclides.
    pub log_half_life_s: Option<f64>,
}

/// Reference data for one chemical element, attached to a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDetails {
    /// Chemical symbol.
    pub symbol: String,
    /// Element name.
    pub name: String,
    /// Atomic number Z.
    pub atomic_number: u32,
    /// Phase-transition temperatures, when tabulated.
    pub temperature: Option<ElementTemperature>,
}
