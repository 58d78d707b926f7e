// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed tables and thresholds used across the cascade.
//!
//! | Constant | Meaning |
//! |----------|---------|
//! | [`DIMER_FORMING_ELEMENTS`] | naturally diatomic elements (homonuclear-dimer rule) |
//! | [`HYDROGEN_SHORTHANDS`] | bare `D`/`T` symbols and their mass numbers |
//! | [`ENERGY_BATCH_SIZE`] | reactions summed between two "calculating energy" updates |
//! | [`PROGRESS_FINALIZING`] … | reserved `acceptedCount` sentinels of the progress protocol |

// ═══════════════════════════════════════════════════════════════════
// Chemistry
// ═══════════════════════════════════════════════════════════════════

/// Elements that occur as homonuclear diatomic molecules (H₂, N₂, O₂, F₂,
/// Cl₂, Br₂, I₂). Symbols are chemical elements, so `D` and `T` are covered
/// through hydrogen.
pub const DIMER_FORMING_ELEMENTS: [&str; 7] = ["H", "N", "O", "F", "Cl", "Br", "I"];

/// Hydrogen isotopes that the reaction tables carry under their own symbol.
///
/// `(symbol, implied mass number)`.
pub const HYDROGEN_SHORTHANDS: [(&str, u32); 2] = [("D", 2), ("T", 3)];

/// Chemical element that isotope symbols map to for property lookups.
pub const HYDROGEN: &str = "H";

// ═══════════════════════════════════════════════════════════════════
// Finalization
// ═══════════════════════════════════════════════════════════════════

/// Number of reactions summed per "calculating energy" progress update.
pub const ENERGY_BATCH_SIZE: usize = 1_000;

// ═══════════════════════════════════════════════════════════════════
// Progress protocol sentinels
// ═══════════════════════════════════════════════════════════════════

/// `acceptedCount` for the "finalizing" phase.
pub const PROGRESS_FINALIZING: i64 = -1;

/// `acceptedCount` for the "calculating energy" phase.
pub const PROGRESS_CALCULATING_ENERGY: i64 = -2;

/// `acceptedCount` for the "preparing results" phase.
pub const PROGRESS_PREPARING_RESULTS: i64 = -3;

// ═══════════════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════════════

/// Absolute tolerance for comparing summed reaction energies (MeV).
///
/// Energies are tabulated to 3–4 decimals; ordered f64 summation of a few
/// thousand terms stays far below this.
pub const ENERGY_SUM_TOLERANCE_MEV: f64 = 1e-9;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_distinct_and_negative() {
        let s = [
            PROGRESS_FINALIZING,
            PROGRESS_CALCULATING_ENERGY,
            PROGRESS_PREPARING_RESULTS,
        ];
        assert!(s.iter().all(|&v| v < 0));
        assert_ne!(s[0], s[1]);
        assert_ne!(s[1], s[2]);
        assert_ne!(s[0], s[2]);
    }

    #[test]
    fn lithium_is_not_dimer_forming() {
        assert!(!DIMER_FORMING_ELEMENTS.contains(&"Li"));
        assert!(DIMER_FORMING_ELEMENTS.contains(&HYDROGEN));
    }
}
