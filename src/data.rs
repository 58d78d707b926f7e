// SPDX-License-Identifier: AGPL-3.0-only

//! Reaction tables loading and the in-memory [`ReactionSource`].
//!
//! The tables are a JSON document with four arrays, using the column names
//! of the published Parkhomov spreadsheets:
//!
//! ```text
//! fusion      E1 A1 Z1  E2 A2 Z2  E A Z                 MeV neutrino
//! two_to_two  E1 A1 Z1  E2 A2 Z2  E3 A3 Z3  E4 A4 Z4    MeV neutrino
//! nuclides    E A Z nBorF aBorF AMU BE LHL
//! elements    Z E EName Melting Boiling
//! ```
//!
//! `data/reactions.json` ships a light-element subset.

use crate::error::CascadeError;
use crate::nuclide::{chemical_element, NuclideId};
use crate::reaction::{
    ElementDetails, ElementTemperature, FusionCandidate, NeutrinoClass, NuclideDetails,
    QuantumClass, QuantumClassification, TwoToTwoCandidate,
};
use crate::source::ReactionSource;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// One `fusion` table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FusionRow {
    #[serde(rename = "E1")]
    pub e1: String,
    #[serde(rename = "A1")]
    pub a1: u32,
    #[serde(rename = "Z1")]
    pub z1: u32,
    #[serde(rename = "E2")]
    pub e2: String,
    #[serde(rename = "A2")]
    pub a2: u32,
    #[serde(rename = "Z2")]
    pub z2: u32,
    #[serde(rename = "E")]
    pub e: String,
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "Z")]
    pub z: u32,
    #[serde(rename = "MeV")]
    pub mev: f64,
    #[serde(default)]
    pub neutrino: NeutrinoClass,
}

/// One `two_to_two` table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct TwoToTwoRow {
    #[serde(rename = "E1")]
    pub e1: String,
    #[serde(rename = "A1")]
    pub a1: u32,
    #[serde(rename = "Z1")]
    pub z1: u32,
    #[serde(rename = "E2")]
    pub e2: String,
    #[serde(rename = "A2")]
    pub a2: u32,
    #[serde(rename = "Z2")]
    pub z2: u32,
    #[serde(rename = "E3")]
    pub e3: String,
    #[serde(rename = "A3")]
    pub a3: u32,
    #[serde(rename = "Z3")]
    pub z3: u32,
    #[serde(rename = "E4")]
    pub e4: String,
    #[serde(rename = "A4")]
    pub a4: u32,
    #[serde(rename = "Z4")]
    pub z4: u32,
    #[serde(rename = "MeV")]
    pub mev: f64,
    #[serde(default)]
    pub neutrino: NeutrinoClass,
}

/// One `nuclides` table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct NuclideRow {
    #[serde(rename = "E")]
    pub e: String,
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "Z")]
    pub z: u32,
    #[serde(rename = "nBorF")]
    pub nuclear: QuantumClass,
    #[serde(rename = "aBorF")]
    pub atomic: QuantumClass,
    #[serde(rename = "AMU", default)]
    pub amu: f64,
    #[serde(rename = "BE", default)]
    pub binding_energy_mev: f64,
    #[serde(rename = "LHL", default)]
    pub log_half_life_s: Option<f64>,
}

/// One `elements` table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ElementRow {
    #[serde(rename = "Z")]
    pub z: u32,
    #[serde(rename = "E")]
    pub e: String,
    #[serde(rename = "EName")]
    pub name: String,
    #[serde(rename = "Melting", default)]
    pub melting_k: Option<f64>,
    #[serde(rename = "Boiling", default)]
    pub boiling_k: Option<f64>,
}

/// Raw tables as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseTables {
    /// Fusion reactions.
    #[serde(default)]
    pub fusion: Vec<FusionRow>,
    /// Two-to-two reactions.
    #[serde(default)]
    pub two_to_two: Vec<TwoToTwoRow>,
    /// Nuclide properties.
    #[serde(default)]
    pub nuclides: Vec<NuclideRow>,
    /// Element properties.
    #[serde(default)]
    pub elements: Vec<ElementRow>,
}

impl DatabaseTables {
    /// Parse tables from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::DataLoad`] if the JSON does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self, CascadeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the tables for the problems the maintenance scripts look for.
    #[must_use]
    pub fn verify(&self) -> IntegrityReport {
        let known: BTreeSet<&str> = self.elements.iter().map(|e| e.e.as_str()).collect();
        let mut report = IntegrityReport {
            fusion_rows: self.fusion.len(),
            two_to_two_rows: self.two_to_two.len(),
            nuclide_rows: self.nuclides.len(),
            element_rows: self.elements.len(),
            ..IntegrityReport::default()
        };

        let check_symbol = |symbol: &str, report: &mut IntegrityReport| {
            if symbol.contains('*') || !symbol.is_ascii() {
                report.malformed_symbols.insert(symbol.to_string());
            } else if !known.contains(chemical_element(symbol)) {
                report.unknown_symbols.insert(symbol.to_string());
            }
        };

        for (i, r) in self.fusion.iter().enumerate() {
            for s in [&r.e1, &r.e2, &r.e] {
                check_symbol(s.as_str(), &mut report);
            }
            if r.a1 + r.a2 != r.a || !charge_balanced(r.z1 + r.z2, r.z, r.neutrino) {
                report.unbalanced_rows.push(format!(
                    "fusion[{i}]: {}{} + {}{} → {}{}",
                    r.e1, r.a1, r.e2, r.a2, r.e, r.a
                ));
            }
        }
        for (i, r) in self.two_to_two.iter().enumerate() {
            for s in [&r.e1, &r.e2, &r.e3, &r.e4] {
                check_symbol(s.as_str(), &mut report);
            }
            if r.a1 + r.a2 != r.a3 + r.a4 || !charge_balanced(r.z1 + r.z2, r.z3 + r.z4, r.neutrino)
            {
                report.unbalanced_rows.push(format!(
                    "two_to_two[{i}]: {}{} + {}{} → {}{} + {}{}",
                    r.e1, r.a1, r.e2, r.a2, r.e3, r.a3, r.e4, r.a4
                ));
            }
        }
        report
    }
}

/// Weak reactions (neutrino-tagged) may move one unit of charge.
fn charge_balanced(z_in: u32, z_out: u32, neutrino: NeutrinoClass) -> bool {
    match neutrino {
        NeutrinoClass::None => z_in == z_out,
        NeutrinoClass::Left | NeutrinoClass::Right => z_in.abs_diff(z_out) <= 1,
    }
}

/// Result of [`DatabaseTables::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Rows in the fusion table.
    pub fusion_rows: usize,
    /// Rows in the two-to-two table.
    pub two_to_two_rows: usize,
    /// Rows in the nuclide table.
    pub nuclide_rows: usize,
    /// Rows in the element table.
    pub element_rows: usize,
    /// Reaction symbols whose chemical element is not in the element table.
    pub unknown_symbols: BTreeSet<String>,
    /// Symbols with asterisks or non-ASCII letters (e.g. Cyrillic look-alikes).
    pub malformed_symbols: BTreeSet<String>,
    /// Reactions that do not conserve A, or Z (beyond one unit for weak reactions).
    pub unbalanced_rows: Vec<String>,
}

impl IntegrityReport {
    /// No problem of any kind was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unknown_symbols.is_empty()
            && self.malformed_symbols.is_empty()
            && self.unbalanced_rows.is_empty()
    }
}

/// In-memory reaction database.
#[derive(Debug, Clone, Default)]
pub struct ReactionDatabase {
    fusion: Vec<FusionCandidate>,
    two_to_two: Vec<TwoToTwoCandidate>,
    nuclides: HashMap<NuclideId, NuclideDetails>,
    atomic_numbers: HashMap<NuclideId, u32>,
    elements: BTreeMap<String, ElementDetails>,
    skipped_rows: usize,
}

impl ReactionDatabase {
    /// Build from raw tables.
    ///
    /// Rows whose symbols do not form valid nuclide identities are skipped
    /// (and counted); run [`DatabaseTables::verify`] first to see why.
    #[must_use]
    pub fn from_tables(tables: &DatabaseTables) -> Self {
        let mut db = Self::default();

        for r in &tables.elements {
            let temperature = (r.melting_k.is_some() || r.boiling_k.is_some()).then_some(
                ElementTemperature {
                    melting_point_k: r.melting_k,
                    boiling_point_k: r.boiling_k,
                },
            );
            db.elements.insert(
                r.e.clone(),
                ElementDetails {
                    symbol: r.e.clone(),
                    name: r.name.clone(),
                    atomic_number: r.z,
                    temperature,
                },
            );
        }

        for r in &tables.nuclides {
            let Ok(id) = NuclideId::new(&r.e, r.a) else {
                db.skipped_rows += 1;
                continue;
            };
            db.atomic_numbers.insert(id.clone(), r.z);
            db.nuclides.insert(
                id.clone(),
                NuclideDetails {
                    id,
                    atomic_number: r.z,
                    atomic_mass_u: r.amu,
                    binding_energy_mev: r.binding_energy_mev,
                    classification: QuantumClassification {
                        nuclear: r.nuclear,
                        atomic: r.atomic,
                    },
                    log_half_life_s: r.log_half_life_s,
                },
            );
        }

        for r in &tables.fusion {
            let ids = (
                NuclideId::new(&r.e1, r.a1),
                NuclideId::new(&r.e2, r.a2),
                NuclideId::new(&r.e, r.a),
            );
            let (Ok(input1), Ok(input2), Ok(output)) = ids else {
                db.skipped_rows += 1;
                continue;
            };
            for (id, z) in [(&input1, r.z1), (&input2, r.z2), (&output, r.z)] {
                db.atomic_numbers.entry(id.clone()).or_insert(z);
            }
            db.fusion.push(FusionCandidate {
                input1,
                input2,
                output,
                energy_mev: r.mev,
                neutrino: r.neutrino,
            });
        }

        for r in &tables.two_to_two {
            let ids = (
                NuclideId::new(&r.e1, r.a1),
                NuclideId::new(&r.e2, r.a2),
                NuclideId::new(&r.e3, r.a3),
                NuclideId::new(&r.e4, r.a4),
            );
            let (Ok(input1), Ok(input2), Ok(output1), Ok(output2)) = ids else {
                db.skipped_rows += 1;
                continue;
            };
            for (id, z) in [
                (&input1, r.z1),
                (&input2, r.z2),
                (&output1, r.z3),
                (&output2, r.z4),
            ] {
                db.atomic_numbers.entry(id.clone()).or_insert(z);
            }
            db.two_to_two.push(TwoToTwoCandidate {
                input1,
                input2,
                output1,
                output2,
                energy_mev: r.mev,
                neutrino: r.neutrino,
            });
        }

        if db.skipped_rows > 0 {
            log::warn!(
                "reaction database: skipped {} rows with invalid nuclide symbols",
                db.skipped_rows
            );
        }
        db
    }

    /// Number of (fusion, two-to-two) reactions loaded.
    #[must_use]
    pub fn reaction_counts(&self) -> (usize, usize) {
        (self.fusion.len(), self.two_to_two.len())
    }

    /// Rows dropped while building from tables.
    #[must_use]
    pub const fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

fn inputs_within(elements: &BTreeSet<String>, a: &NuclideId, b: &NuclideId) -> bool {
    elements.contains(a.element()) && elements.contains(b.element())
}

impl ReactionSource for ReactionDatabase {
    fn query_fusion_reactions(
        &self,
        elements: &BTreeSet<String>,
        min_energy_mev: f64,
    ) -> Result<Vec<FusionCandidate>, CascadeError> {
        Ok(self
            .fusion
            .par_iter()
            .filter(|c| {
                c.energy_mev >= min_energy_mev && inputs_within(elements, &c.input1, &c.input2)
            })
            .cloned()
            .collect())
    }

    fn query_two_to_two_reactions(
        &self,
        elements: &BTreeSet<String>,
        min_energy_mev: f64,
    ) -> Result<Vec<TwoToTwoCandidate>, CascadeError> {
        Ok(self
            .two_to_two
            .par_iter()
            .filter(|c| {
                c.energy_mev >= min_energy_mev && inputs_within(elements, &c.input1, &c.input2)
            })
            .cloned()
            .collect())
    }

    fn element_temperature_data(
        &self,
        elements: &BTreeSet<String>,
    ) -> Result<HashMap<String, ElementTemperature>, CascadeError> {
        Ok(elements
            .iter()
            .filter_map(|e| {
                self.elements
                    .get(e)
                    .and_then(|d| d.temperature)
                    .map(|t| (e.clone(), t))
            })
            .collect())
    }

    fn nuclide_quantum_classification(
        &self,
        nuclides: &BTreeSet<NuclideId>,
    ) -> Result<HashMap<NuclideId, QuantumClassification>, CascadeError> {
        Ok(nuclides
            .iter()
            .filter_map(|id| {
                let class = match self.nuclides.get(id) {
                    Some(d) => d.classification,
                    // Not tabulated: derive from nucleon and electron counts.
                    None => {
                        let z = *self.atomic_numbers.get(id)?;
                        let a = id.mass_number();
                        QuantumClassification {
                            nuclear: QuantumClass::of_constituents(a),
                            atomic: QuantumClass::of_constituents(a + z),
                        }
                    }
                };
                Some((id.clone(), class))
            })
            .collect())
    }

    fn resolve_nuclide_details(
        &self,
        nuclides: &BTreeSet<NuclideId>,
    ) -> Result<Vec<NuclideDetails>, CascadeError> {
        Ok(nuclides
            .iter()
            .filter_map(|id| self.nuclides.get(id).cloned())
            .collect())
    }

    fn resolve_element_details(
        &self,
        elements: &BTreeSet<String>,
    ) -> Result<Vec<ElementDetails>, CascadeError> {
        Ok(elements
            .iter()
            .filter_map(|e| self.elements.get(e).cloned())
            .collect())
    }
}

/// Load raw tables from a JSON file.
///
/// Uses streaming `from_reader` to avoid buffering the whole document.
///
/// # Errors
///
/// Returns [`CascadeError::DataLoad`] naming the path if the file cannot be
/// opened or does not match the schema.
pub fn load_tables(path: &Path) -> Result<DatabaseTables, CascadeError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CascadeError::DataLoad(format!("{}: {e}", path.display())))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| CascadeError::DataLoad(format!("{}: {e}", path.display())))
}

/// Load, verify, and build the reaction database from a JSON file.
///
/// Integrity problems are logged, not fatal: unusable rows are skipped.
///
/// # Errors
///
/// Returns [`CascadeError::DataLoad`] if the file cannot be read or parsed.
pub fn load_reaction_database(path: &Path) -> Result<ReactionDatabase, CascadeError> {
    let tables = load_tables(path)?;
    let report = tables.verify();
    if !report.is_clean() {
        log::warn!(
            "reaction database {}: {} unknown symbols, {} malformed symbols, {} unbalanced rows",
            path.display(),
            report.unknown_symbols.len(),
            report.malformed_symbols.len(),
            report.unbalanced_rows.len()
        );
    }
    let db = ReactionDatabase::from_tables(&tables);
    let (fusion, two_to_two) = db.reaction_counts();
    log::info!(
        "reaction database {}: {fusion} fusion, {two_to_two} two-to-two reactions",
        path.display()
    );
    Ok(db)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TABLES: &str = r#"{
        "fusion": [
            {"E1":"H","A1":1,"Z1":1,"E2":"Li","A2":7,"Z2":3,"E":"Be","A":8,"Z":4,"MeV":17.255},
            {"E1":"He","A1":4,"Z1":2,"E2":"He","A2":4,"Z2":2,"E":"Be","A":8,"Z":4,"MeV":-0.092},
            {"E1":"D","A1":2,"Z1":1,"E2":"D","A2":2,"Z2":1,"E":"He","A":4,"Z":2,"MeV":23.847,"neutrino":"none"}
        ],
        "two_to_two": [
            {"E1":"H","A1":1,"Z1":1,"E2":"Li","A2":7,"Z2":3,"E3":"He","A3":4,"Z3":2,"E4":"He","A4":4,"Z4":2,"MeV":17.347}
        ],
        "nuclides": [
            {"E":"H","A":1,"Z":1,"nBorF":"f","aBorF":"b","AMU":1.00782503,"BE":0.0},
            {"E":"He","A":4,"Z":2,"nBorF":"b","aBorF":"b","AMU":4.00260325,"BE":28.296}
        ],
        "elements": [
            {"Z":1,"E":"H","EName":"Hydrogen","Melting":14.01,"Boiling":20.28},
            {"Z":2,"E":"He","EName":"Helium","Boiling":4.22},
            {"Z":3,"E":"Li","EName":"Lithium","Melting":453.65,"Boiling":1615.0},
            {"Z":4,"E":"Be","EName":"Beryllium","Melting":1560.0,"Boiling":2742.0}
        ]
    }"#;

    fn db() -> ReactionDatabase {
        ReactionDatabase::from_tables(&DatabaseTables::from_json_str(TABLES).unwrap())
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn fusion_query_respects_elements_and_threshold() {
        let db = db();
        let rows = db.query_fusion_reactions(&set(&["H", "Li"]), 0.0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].output.to_string(), "Be-8");

        let rows = db.query_fusion_reactions(&set(&["He"]), -1.0).unwrap();
        assert_eq!(rows.len(), 1, "endothermic row admitted by negative threshold");
        let rows = db.query_fusion_reactions(&set(&["He"]), 0.0).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn isotope_symbols_are_queried_verbatim() {
        let db = db();
        assert!(db.query_fusion_reactions(&set(&["H"]), 0.0).unwrap().is_empty());
        assert_eq!(db.query_fusion_reactions(&set(&["D"]), 0.0).unwrap().len(), 1);
    }

    #[test]
    fn temperature_keeps_partial_points() {
        let db = db();
        let t = db.element_temperature_data(&set(&["H", "He", "Xe"])).unwrap();
        assert_eq!(t["H"].melting_point_k, Some(14.01));
        assert_eq!(t["He"].melting_point_k, None, "helium has no melting point at 1 atm");
        assert_eq!(t["He"].boiling_point_k, Some(4.22));
        assert!(!t.contains_key("Xe"));
    }

    #[test]
    fn classification_falls_back_to_parity() {
        let db = db();
        let ids: BTreeSet<NuclideId> = ["H-1", "Li-7", "Be-8", "C-12"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let c = db.nuclide_quantum_classification(&ids).unwrap();
        let li7 = c[&"Li-7".parse::<NuclideId>().unwrap()];
        assert_eq!(li7.nuclear, QuantumClass::Fermion);
        assert_eq!(li7.atomic, QuantumClass::Boson);
        assert_eq!(
            c[&"Be-8".parse::<NuclideId>().unwrap()].nuclear,
            QuantumClass::Boson
        );
        assert!(!c.contains_key(&"C-12".parse::<NuclideId>().unwrap()));
    }

    #[test]
    fn verify_flags_bad_rows() {
        let mut tables = DatabaseTables::from_json_str(TABLES).unwrap();
        assert!(tables.verify().is_clean());
        tables.fusion[0].e = "Be*".into();
        tables.fusion[1].z = 5;
        tables.two_to_two[0].e3 = "Xx".into();
        let report = tables.verify();
        assert!(report.malformed_symbols.contains("Be*"));
        assert!(report.unknown_symbols.contains("Xx"));
        assert_eq!(report.unbalanced_rows.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn weak_reactions_may_change_charge() {
        let mut tables = DatabaseTables::from_json_str(TABLES).unwrap();
        // p + p → D: Z 2 → 1 through positron emission.
        tables.fusion[2] = FusionRow {
            e1: "H".into(),
            a1: 1,
            z1: 1,
            e2: "H".into(),
            a2: 1,
            z2: 1,
            e: "D".into(),
            a: 2,
            z: 1,
            mev: 1.442,
            neutrino: NeutrinoClass::Left,
        };
        assert!(tables.verify().is_clean());
        tables.fusion[2].neutrino = NeutrinoClass::None;
        assert_eq!(tables.verify().unbalanced_rows.len(), 1);
    }

    #[test]
    fn invalid_rows_are_skipped() {
        let mut tables = DatabaseTables::from_json_str(TABLES).unwrap();
        tables.fusion[0].e1 = "Н".into(); // Cyrillic
        let db = ReactionDatabase::from_tables(&tables);
        assert_eq!(db.skipped_rows(), 1);
        assert_eq!(db.reaction_counts(), (2, 1));
    }

    #[test]
    fn missing_file_is_data_load() {
        let err = load_tables(Path::new("/nonexistent/reactions.json")).unwrap_err();
        assert!(matches!(err, CascadeError::DataLoad(ref m) if m.contains("reactions.json")));
    }
}
