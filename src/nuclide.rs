// SPDX-License-Identifier: AGPL-3.0-only

//! Canonical nuclide identity and fuel parsing.
//!
//! A nuclide is an element symbol plus a mass number, written canonically
//! as `"<Element>-<MassNumber>"` (`"Li-7"`, `"D-2"`). Every other notation
//! accepted on input is normalized here, before the identity is used
//! anywhere else:
//!
//! | Input | Canonical |
//! |-------|-----------|
//! | `"Li-7"`, `"Li7"`, `"Li 7"`, `"li7"` | `"Li-7"` |
//! | `"D"` | `"D-2"` |
//! | `"T"` | `"T-3"` |

use crate::constants::{DIMER_FORMING_ELEMENTS, HYDROGEN, HYDROGEN_SHORTHANDS};
use crate::error::CascadeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest element symbol accepted (three letters covers provisional names).
const MAX_SYMBOL_LEN: usize = 3;

/// Immutable nuclide identity, ordered by element symbol then mass number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NuclideId {
    element: String,
    mass_number: u32,
}

impl NuclideId {
    /// Build from an element symbol and mass number.
    ///
    /// The symbol is case-normalized (`"LI"` → `"Li"`).
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::InvalidNuclideFormat`] if the symbol is not
    /// 1–3 ASCII letters or the mass number is zero.
    pub fn new(element: &str, mass_number: u32) -> Result<Self, CascadeError> {
        let symbol = normalize_symbol(element)
            .ok_or_else(|| CascadeError::InvalidNuclideFormat(format!("{element}-{mass_number}")))?;
        if mass_number == 0 {
            return Err(CascadeError::InvalidNuclideFormat(format!(
                "{element}-{mass_number}"
            )));
        }
        Ok(Self {
            element: symbol,
            mass_number,
        })
    }

    /// Element symbol as carried by the reaction tables (`"D"` stays `"D"`).
    #[must_use]
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Mass number A.
    #[must_use]
    pub const fn mass_number(&self) -> u32 {
        self.mass_number
    }

    /// Chemical element for property lookups: hydrogen isotopes map to `"H"`.
    #[must_use]
    pub fn chemical_element(&self) -> &str {
        chemical_element(&self.element)
    }

    /// Whether this nuclide's chemical element forms homonuclear dimers.
    #[must_use]
    pub fn is_dimer_forming(&self) -> bool {
        DIMER_FORMING_ELEMENTS.contains(&self.chemical_element())
    }
}

/// Map a table element symbol to its chemical element (`"D"`/`"T"` → `"H"`).
#[must_use]
pub fn chemical_element(symbol: &str) -> &str {
    if HYDROGEN_SHORTHANDS.iter().any(|(s, _)| *s == symbol) {
        HYDROGEN
    } else {
        symbol
    }
}

impl fmt::Display for NuclideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.element, self.mass_number)
    }
}

impl FromStr for NuclideId {
    type Err = CascadeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_nuclide(s)?.ok_or_else(|| CascadeError::InvalidNuclideFormat(s.to_string()))
    }
}

impl TryFrom<String> for NuclideId {
    type Error = CascadeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NuclideId> for String {
    fn from(id: NuclideId) -> Self {
        id.to_string()
    }
}

/// `"LI"` / `"li"` → `"Li"`; `None` unless 1–3 ASCII letters.
fn normalize_symbol(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.len() > MAX_SYMBOL_LEN || !raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut chars = raw.chars();
    let first = chars.next()?.to_ascii_uppercase();
    Some(
        std::iter::once(first)
            .chain(chars.map(|c| c.to_ascii_lowercase()))
            .collect(),
    )
}

/// Parse one free-form entry.
///
/// Returns `Ok(None)` for empty or whitespace-only input.
///
/// # Errors
///
/// Returns [`CascadeError::InvalidNuclideFormat`] carrying the original
/// entry when it matches none of the accepted notations.
pub fn parse_nuclide(entry: &str) -> Result<Option<NuclideId>, CascadeError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let invalid = || CascadeError::InvalidNuclideFormat(entry.to_string());

    let split = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (letters, rest) = trimmed.split_at(split);
    let symbol = normalize_symbol(letters).ok_or_else(invalid)?;

    let rest = rest.trim_start();
    let digits = rest.strip_prefix('-').map_or(rest, str::trim_start);

    if digits.is_empty() {
        if rest.is_empty() {
            // Bare symbol: only the hydrogen isotope shorthands carry an implied mass.
            return HYDROGEN_SHORTHANDS
                .iter()
                .find(|(s, _)| *s == symbol)
                .map(|&(_, a)| {
                    Some(NuclideId {
                        element: symbol.clone(),
                        mass_number: a,
                    })
                })
                .ok_or_else(invalid);
        }
        return Err(invalid());
    }

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let mass_number: u32 = digits.parse().map_err(|_| invalid())?;
    if mass_number == 0 {
        return Err(invalid());
    }
    Ok(Some(NuclideId {
        element: symbol,
        mass_number,
    }))
}

/// Parse a fuel list into canonical nuclides.
///
/// Order and duplicates are preserved; blank entries are skipped.
///
/// # Errors
///
/// - [`CascadeError::InvalidNuclideFormat`] for the first malformed entry.
/// - [`CascadeError::NoValidFuel`] if nothing remains after skipping blanks.
///
/// # Example
///
/// ```
/// use nuclide_cascade::nuclide::parse_fuel;
///
/// let fuel = parse_fuel(&["H-1", "Li7", "D"]).unwrap();
/// let names: Vec<String> = fuel.iter().map(ToString::to_string).collect();
/// assert_eq!(names, ["H-1", "Li-7", "D-2"]);
/// ```
pub fn parse_fuel<S: AsRef<str>>(entries: &[S]) -> Result<Vec<NuclideId>, CascadeError> {
    let mut fuel = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(id) = parse_nuclide(entry.as_ref())? {
            fuel.push(id);
        }
    }
    if fuel.is_empty() {
        return Err(CascadeError::NoValidFuel);
    }
    Ok(fuel)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn canon(s: &str) -> String {
        s.parse::<NuclideId>().unwrap().to_string()
    }

    #[test]
    fn accepted_notations_normalize() {
        assert_eq!(canon("Li-7"), "Li-7");
        assert_eq!(canon("Li7"), "Li-7");
        assert_eq!(canon("Li 7"), "Li-7");
        assert_eq!(canon("  li - 7 "), "Li-7");
        assert_eq!(canon("NI58"), "Ni-58");
    }

    #[test]
    fn hydrogen_shorthands() {
        assert_eq!(canon("D"), "D-2");
        assert_eq!(canon("T"), "T-3");
        assert_eq!(canon("d"), "D-2");
    }

    #[test]
    fn bare_symbol_without_mass_is_rejected() {
        assert_eq!(
            "H".parse::<NuclideId>(),
            Err(CascadeError::InvalidNuclideFormat("H".into()))
        );
        assert!("Li-".parse::<NuclideId>().is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        for bad in ["7Li", "Li-7a", "Li--7", "Abcd-4", "H-0", "Li_7", "Hé-4"] {
            assert!(
                matches!(parse_nuclide(bad), Err(CascadeError::InvalidNuclideFormat(ref s)) if s == bad),
                "{bad} should be rejected with its own text"
            );
        }
    }

    #[test]
    fn blank_entries_are_skipped() {
        assert_eq!(parse_nuclide("   ").unwrap(), None);
        let fuel = parse_fuel(&["", "H-1", "  "]).unwrap();
        assert_eq!(fuel.len(), 1);
    }

    #[test]
    fn all_blank_is_no_valid_fuel() {
        assert_eq!(parse_fuel(&["", " "]), Err(CascadeError::NoValidFuel));
        let empty: [&str; 0] = [];
        assert_eq!(parse_fuel(&empty), Err(CascadeError::NoValidFuel));
    }

    #[test]
    fn duplicates_and_order_preserved() {
        let fuel = parse_fuel(&["Li-7", "H-1", "Li7"]).unwrap();
        let names: Vec<String> = fuel.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["Li-7", "H-1", "Li-7"]);
    }

    #[test]
    fn chemical_element_maps_isotopes() {
        let d: NuclideId = "D".parse().unwrap();
        assert_eq!(d.element(), "D");
        assert_eq!(d.chemical_element(), "H");
        assert!(d.is_dimer_forming());
        let li: NuclideId = "Li-7".parse().unwrap();
        assert!(!li.is_dimer_forming());
        let n: NuclideId = "N-14".parse().unwrap();
        assert!(n.is_dimer_forming());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let id: NuclideId = "He4".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"He-4\"");
        let back: NuclideId = serde_json::from_str("\"he 4\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<NuclideId>("\"He\"").is_err());
    }

    #[test]
    fn new_validates() {
        assert_eq!(NuclideId::new("he", 4).unwrap().to_string(), "He-4");
        assert!(NuclideId::new("He", 0).is_err());
        assert!(NuclideId::new("", 4).is_err());
    }
}
