// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail check harness for the `validate_cascade` binary.
//!
//! Checks are recorded with their observed and expected values, then
//! [`ValidationHarness::finish`] prints a summary and exits 0 (all pass)
//! or 1 (any failure).

use std::fmt::Write;
use std::process;

/// One recorded check.
#[derive(Debug, Clone)]
pub struct Check {
    /// Human-readable label
    pub label: String,
    /// Whether this check passed
    pub passed: bool,
    /// Observed value
    pub observed: f64,
    /// Expected value (or threshold)
    pub expected: f64,
    /// Tolerance used
    pub tolerance: f64,
    /// How the comparison was made
    pub mode: CheckMode,
}

/// How a check compares observed to expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// |observed - expected| < tolerance
    Absolute,
    /// |observed - expected| / |expected| < tolerance
    Relative,
    /// observed == expected (counts)
    Exact,
    /// observed ≤ threshold
    AtMost,
    /// Boolean predicate
    Predicate,
}

impl std::fmt::Display for CheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Relative => write!(f, "rel"),
            Self::Exact => write!(f, "=="),
            Self::AtMost => write!(f, "≤"),
            Self::Predicate => write!(f, "bool"),
        }
    }
}

/// Accumulates checks and produces a summary with exit code.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    /// Name of the validation binary
    pub name: String,
    /// All checks performed
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    /// Create a new harness for a named validation binary.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn push(
        &mut self,
        label: &str,
        passed: bool,
        observed: f64,
        expected: f64,
        tolerance: f64,
        mode: CheckMode,
    ) {
        if !passed {
            log::warn!("{}: check failed: {label}", self.name);
        }
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            mode,
        });
    }

    /// |observed - expected| < tolerance
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() < tolerance;
        self.push(label, passed, observed, expected, tolerance, CheckMode::Absolute);
    }

    /// |observed - expected| / |expected| < tolerance (absolute when expected is 0)
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = if expected.abs() > f64::EPSILON {
            ((observed - expected) / expected).abs() < tolerance
        } else {
            observed.abs() < tolerance
        };
        self.push(label, passed, observed, expected, tolerance, CheckMode::Relative);
    }

    /// Exact integer match (reaction counts, generations).
    pub fn check_count(&mut self, label: &str, observed: usize, expected: usize) {
        self.push(
            label,
            observed == expected,
            observed as f64,
            expected as f64,
            0.0,
            CheckMode::Exact,
        );
    }

    /// observed ≤ threshold
    pub fn check_at_most(&mut self, label: &str, observed: f64, threshold: f64) {
        self.push(
            label,
            observed <= threshold,
            observed,
            threshold,
            threshold,
            CheckMode::AtMost,
        );
    }

    /// Boolean predicate.
    pub fn check_bool(&mut self, label: &str, passed: bool) {
        self.push(
            label,
            passed,
            f64::from(u8::from(passed)),
            1.0,
            0.0,
            CheckMode::Predicate,
        );
    }

    /// Number of checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Total number of checks.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether all checks passed (vacuously true with none).
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Summary table as printed by [`Self::finish`].
    #[must_use]
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for check in &self.checks {
            let icon = if check.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={}, expected={}, tol={} ({})",
                check.label, check.observed, check.expected, check.tolerance, check.mode
            );
        }
        s
    }

    /// Print summary and exit: 0 if all checks pass, 1 otherwise.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.format_summary());
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.label.as_str())
            .collect();
        println!("FAILED CHECKS: {}", failed.join(", "));
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_tracks_pass_fail() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("energy", 9.81, 9.81, 1e-9);
        h.check_count("reactions", 3, 3);
        h.check_count("generations", 2, 3);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.total_count(), 3);
        assert!(!h.all_passed());
    }

    #[test]
    fn relative_check_handles_zero() {
        let mut h = ValidationHarness::new("test");
        h.check_rel("near_zero", 1e-15, 0.0, 1e-10);
        h.check_rel("sign", 16.0, -16.0, 0.1);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn at_most_includes_boundary() {
        let mut h = ValidationHarness::new("test");
        h.check_at_most("rarity", 100.0, 100.0);
        h.check_at_most("rarity_over", 100.5, 100.0);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn summary_lists_every_check() {
        let mut h = ValidationHarness::new("cascade");
        h.check_bool("dimer gating", true);
        h.check_bool("cancel", false);
        let s = h.format_summary();
        assert!(s.contains("cascade validation: 1/2"));
        assert!(s.contains("✓ dimer gating"));
        assert!(s.contains("✗ cancel"));
    }

    #[test]
    fn empty_harness_passes() {
        let h = ValidationHarness::new("empty");
        assert!(h.all_passed());
        assert_eq!(h.total_count(), 0);
    }
}
