// SPDX-License-Identifier: AGPL-3.0-only

//! The reaction-query collaborator seam.
//!
//! The cascade never talks to storage directly; it asks a [`ReactionSource`]
//! for candidate reactions and reference data. [`crate::data::ReactionDatabase`]
//! is the in-memory implementation shipped with the crate, and tests plug in
//! their own fixtures.
//!
//! Element sets passed to the reaction queries use table symbols (`"D"` is
//! distinct from `"H"`); element sets passed to the property lookups use
//! chemical elements (see [`crate::nuclide::chemical_element`]).

use crate::error::CascadeError;
use crate::nuclide::NuclideId;
use crate::reaction::{
    ElementDetails, ElementTemperature, FusionCandidate, NuclideDetails, QuantumClassification,
    TwoToTwoCandidate,
};
use std::collections::{BTreeSet, HashMap};

/// Read-only query interface over the reaction tables.
///
/// Implementations must be shareable across threads: one source may serve
/// several harness instances at once. Failures are reported as
/// [`CascadeError::Collaborator`]; the core never retries.
pub trait ReactionSource: Send + Sync {
    /// Fusion rows whose two input elements both lie in `elements` and whose
    /// energy is at least `min_energy_mev`, in table order.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Collaborator`] if the query cannot be served.
    fn query_fusion_reactions(
        &self,
        elements: &BTreeSet<String>,
        min_energy_mev: f64,
    ) -> Result<Vec<FusionCandidate>, CascadeError>;

    /// Two-to-two rows under the same restriction, in table order.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Collaborator`] if the query cannot be served.
    fn query_two_to_two_reactions(
        &self,
        elements: &BTreeSet<String>,
        min_energy_mev: f64,
    ) -> Result<Vec<TwoToTwoCandidate>, CascadeError>;

    /// Melting/boiling points for the requested chemical elements. Elements
    /// without data are simply absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Collaborator`] if the lookup cannot be served.
    fn element_temperature_data(
        &self,
        elements: &BTreeSet<String>,
    ) -> Result<HashMap<String, ElementTemperature>, CascadeError>;

    /// Nuclear/atomic boson-fermion classification. Unknown nuclides are
    /// absent from the map.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Collaborator`] if the lookup cannot be served.
    fn nuclide_quantum_classification(
        &self,
        nuclides: &BTreeSet<NuclideId>,
    ) -> Result<HashMap<NuclideId, QuantumClassification>, CascadeError>;

    /// Reference data for nuclides, used only when a run is finalized.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Collaborator`] if the lookup cannot be served.
    fn resolve_nuclide_details(
        &self,
        nuclides: &BTreeSet<NuclideId>,
    ) -> Result<Vec<NuclideDetails>, CascadeError>;

    /// Reference data for chemical elements, used only when a run is finalized.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Collaborator`] if the lookup cannot be served.
    fn resolve_element_details(
        &self,
        elements: &BTreeSet<String>,
    ) -> Result<Vec<ElementDetails>, CascadeError>;
}
