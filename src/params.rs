// SPDX-License-Identifier: AGPL-3.0-only

//! Simulation parameters.
//!
//! Every field is required: the core assumes no defaults. The `cascade_run`
//! binary supplies its own CLI-level defaults before building a
//! [`CascadeParams`].

use crate::error::CascadeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of one cascade run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CascadeParams {
    /// Free-form fuel nuclide strings (parsed at run start).
    pub fuel: Vec<String>,
    /// Simulation temperature (K).
    #[serde(rename = "temperature")]
    pub temperature_k: f64,
    /// Minimum energy for fusion reactions (MeV).
    #[serde(rename = "minFusionMeV")]
    pub min_fusion_mev: f64,
    /// Minimum energy for two-to-two reactions (MeV).
    #[serde(rename = "minTwoToTwoMeV")]
    pub min_two_to_two_mev: f64,
    /// Stop once the active pool grows beyond this many nuclides.
    pub max_nuclides: usize,
    /// Generation budget.
    pub max_loops: usize,
    /// Let nuclear bosons re-enter the active pool.
    pub feedback_bosons: bool,
    /// Let nuclear fermions re-enter the active pool.
    pub feedback_fermions: bool,
    /// Permit reactions between two identical dimer-forming nuclides.
    pub allow_dimers: bool,
    /// Exclude products whose element is still solid at `temperature_k`.
    pub exclude_melted: bool,
    /// Exclude products whose element has boiled off at `temperature_k`.
    pub exclude_boiled_off: bool,
}

impl CascadeParams {
    /// Load parameters from a JSON file (camelCase keys).
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::DataLoad`] if the file cannot be read or does
    /// not match the schema, or [`CascadeError::InvalidParameters`] if the
    /// values fail [`Self::validate`].
    pub fn from_json_file(path: &Path) -> Result<Self, CascadeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CascadeError::DataLoad(format!("{}: {e}", path.display())))?;
        let params: Self = serde_json::from_str(&text)
            .map_err(|e| CascadeError::DataLoad(format!("{}: {e}", path.display())))?;
        params.validate()?;
        Ok(params)
    }

    /// Reject values no run could meaningfully use.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::InvalidParameters`] for a non-finite or
    /// negative temperature, a non-finite energy threshold, or a zero
    /// generation budget.
    pub fn validate(&self) -> Result<(), CascadeError> {
        if !self.temperature_k.is_finite() || self.temperature_k < 0.0 {
            return Err(CascadeError::InvalidParameters(format!(
                "temperature must be a finite non-negative kelvin value, got {}",
                self.temperature_k
            )));
        }
        for (name, v) in [
            ("minFusionMeV", self.min_fusion_mev),
            ("minTwoToTwoMeV", self.min_two_to_two_mev),
        ] {
            if !v.is_finite() {
                return Err(CascadeError::InvalidParameters(format!(
                    "{name} must be finite, got {v}"
                )));
            }
        }
        if self.max_loops == 0 {
            return Err(CascadeError::InvalidParameters(
                "maxLoops must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PARAMS: &str = r#"{
        "fuel": ["H-1", "Li7"],
        "temperature": 1200.0,
        "minFusionMeV": 0.0,
        "minTwoToTwoMeV": 0.0,
        "maxNuclides": 100,
        "maxLoops": 5,
        "feedbackBosons": true,
        "feedbackFermions": true,
        "allowDimers": false,
        "excludeMelted": false,
        "excludeBoiledOff": false
    }"#;

    #[test]
    fn camel_case_wire_names() {
        let p: CascadeParams = serde_json::from_str(PARAMS).unwrap();
        assert_eq!(p.fuel, ["H-1", "Li7"]);
        assert_eq!(p.max_loops, 5);
        assert!(!p.allow_dimers);
        p.validate().unwrap();

        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("minTwoToTwoMeV").is_some());
        assert!(json.get("excludeBoiledOff").is_some());
    }

    #[test]
    fn every_field_is_required() {
        let missing = PARAMS.replace("\"allowDimers\": false,", "");
        assert!(serde_json::from_str::<CascadeParams>(&missing).is_err());
    }

    #[test]
    fn validate_rejects_bad_numbers() {
        let base: CascadeParams = serde_json::from_str(PARAMS).unwrap();

        let mut p = base.clone();
        p.temperature_k = f64::NAN;
        assert!(matches!(p.validate(), Err(CascadeError::InvalidParameters(_))));

        let mut p = base.clone();
        p.min_fusion_mev = f64::INFINITY;
        assert!(p.validate().is_err());

        let mut p = base;
        p.max_loops = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn missing_file_is_data_load() {
        let err = CascadeParams::from_json_file(Path::new("/nonexistent/params.json")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataLoad);
    }
}
