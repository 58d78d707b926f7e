// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::unwrap_used)]

//! Integration tests: the worker harness.
//!
//! Runs are made deterministic with a gated source: its second fusion query
//! (generation 1) blocks until the test releases the gate, so requests sent
//! while it waits are guaranteed to arrive mid-run.

use nuclide_cascade::data::{DatabaseTables, ReactionDatabase};
use nuclide_cascade::harness::{CascadeHarness, HarnessEvent};
use nuclide_cascade::nuclide::NuclideId;
use nuclide_cascade::reaction::{
    ElementDetails, ElementTemperature, FusionCandidate, NuclideDetails, QuantumClassification,
    TwoToTwoCandidate,
};
use nuclide_cascade::source::ReactionSource;
use nuclide_cascade::{CascadeError, CascadeParams, ErrorKind, TerminationReason};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

// H-1 + Li-7 → Be-8, then Be-8 + H-1 → B-9, then B-9 + H-1 → C-10.
const CHAIN: &str = r#"{
    "fusion": [
        {"E1":"H","A1":1,"Z1":1,"E2":"Li","A2":7,"Z2":3,"E":"Be","A":8,"Z":4,"MeV":17.255},
        {"E1":"Be","A1":8,"Z1":4,"E2":"H","A2":1,"Z2":1,"E":"B","A":9,"Z":5,"MeV":0.185},
        {"E1":"B","A1":9,"Z1":5,"E2":"H","A2":1,"Z2":1,"E":"C","A":10,"Z":6,"MeV":4.007}
    ]
}"#;

fn chain_db() -> ReactionDatabase {
    ReactionDatabase::from_tables(&DatabaseTables::from_json_str(CHAIN).unwrap())
}

fn params() -> CascadeParams {
    CascadeParams {
        fuel: vec!["H-1".into(), "Li-7".into()],
        temperature_k: 1000.0,
        min_fusion_mev: 0.0,
        min_two_to_two_mev: 0.0,
        max_nuclides: 100,
        max_loops: 10,
        feedback_bosons: true,
        feedback_fermions: true,
        allow_dimers: true,
        exclude_melted: false,
        exclude_boiled_off: false,
    }
}

/// Delegates to the chain database; the second fusion query waits for the gate.
struct GatedSource {
    inner: ReactionDatabase,
    fusion_queries: AtomicUsize,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedSource {
    fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let source = Self {
            inner: chain_db(),
            fusion_queries: AtomicUsize::new(0),
            gate: Mutex::new(rx),
        };
        (Arc::new(source), tx)
    }
}

impl ReactionSource for GatedSource {
    fn query_fusion_reactions(
        &self,
        elements: &BTreeSet<String>,
        min_energy_mev: f64,
    ) -> Result<Vec<FusionCandidate>, CascadeError> {
        if self.fusion_queries.fetch_add(1, Ordering::SeqCst) == 1 {
            // A dropped sender also opens the gate.
            self.gate.lock().unwrap().recv().ok();
        }
        self.inner.query_fusion_reactions(elements, min_energy_mev)
    }

    fn query_two_to_two_reactions(
        &self,
        elements: &BTreeSet<String>,
        min_energy_mev: f64,
    ) -> Result<Vec<TwoToTwoCandidate>, CascadeError> {
        self.inner.query_two_to_two_reactions(elements, min_energy_mev)
    }

    fn element_temperature_data(
        &self,
        elements: &BTreeSet<String>,
    ) -> Result<HashMap<String, ElementTemperature>, CascadeError> {
        self.inner.element_temperature_data(elements)
    }

    fn nuclide_quantum_classification(
        &self,
        nuclides: &BTreeSet<NuclideId>,
    ) -> Result<HashMap<NuclideId, QuantumClassification>, CascadeError> {
        self.inner.nuclide_quantum_classification(nuclides)
    }

    fn resolve_nuclide_details(
        &self,
        nuclides: &BTreeSet<NuclideId>,
    ) -> Result<Vec<NuclideDetails>, CascadeError> {
        self.inner.resolve_nuclide_details(nuclides)
    }

    fn resolve_element_details(
        &self,
        elements: &BTreeSet<String>,
    ) -> Result<Vec<ElementDetails>, CascadeError> {
        self.inner.resolve_element_details(elements)
    }
}

/// Always fails its first query.
struct BrokenSource;

impl ReactionSource for BrokenSource {
    fn query_fusion_reactions(
        &self,
        _: &BTreeSet<String>,
        _: f64,
    ) -> Result<Vec<FusionCandidate>, CascadeError> {
        Err(CascadeError::Collaborator("connection reset".into()))
    }

    fn query_two_to_two_reactions(
        &self,
        _: &BTreeSet<String>,
        _: f64,
    ) -> Result<Vec<TwoToTwoCandidate>, CascadeError> {
        Ok(Vec::new())
    }

    fn element_temperature_data(
        &self,
        _: &BTreeSet<String>,
    ) -> Result<HashMap<String, ElementTemperature>, CascadeError> {
        Ok(HashMap::new())
    }

    fn nuclide_quantum_classification(
        &self,
        _: &BTreeSet<NuclideId>,
    ) -> Result<HashMap<NuclideId, QuantumClassification>, CascadeError> {
        Ok(HashMap::new())
    }

    fn resolve_nuclide_details(
        &self,
        _: &BTreeSet<NuclideId>,
    ) -> Result<Vec<NuclideDetails>, CascadeError> {
        Ok(Vec::new())
    }

    fn resolve_element_details(
        &self,
        _: &BTreeSet<String>,
    ) -> Result<Vec<ElementDetails>, CascadeError> {
        Ok(Vec::new())
    }
}

/// Collect events up to and including the terminal one.
fn drain(harness: &CascadeHarness) -> Vec<HarnessEvent> {
    let mut events = Vec::new();
    while let Some(event) = harness.recv_timeout(Duration::from_secs(10)) {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}

fn generation_of(event: &HarnessEvent) -> Option<usize> {
    match event {
        HarnessEvent::Progress(u) if u.is_generation() => Some(u.generation),
        _ => None,
    }
}

#[test]
fn events_end_with_exactly_one_terminal() {
    let harness = CascadeHarness::with_source(Arc::new(chain_db())).unwrap();
    harness.run(params()).unwrap();
    let events = drain(&harness);

    let gens: Vec<usize> = events.iter().filter_map(generation_of).collect();
    assert_eq!(gens, [0, 1, 2, 3]);
    let sentinels: Vec<i64> = events
        .iter()
        .filter_map(|e| match e {
            HarnessEvent::Progress(u) if !u.is_generation() => Some(u.accepted_count()),
            _ => None,
        })
        .collect();
    assert_eq!(sentinels, [-1, -2, -3]);

    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    let Some(HarnessEvent::Complete(result)) = events.last() else {
        panic!("expected Complete last, got {:?}", events.last());
    };
    assert_eq!(result.termination, TerminationReason::NoNewProducts);
    assert_eq!(result.reactions.len(), 3);
    assert!(!harness.is_running());
    assert!(harness.try_recv().is_none());
}

#[test]
fn cancel_mid_run_yields_cancelled_and_no_result() {
    let (source, gate) = GatedSource::new();
    let harness = CascadeHarness::with_source(source).unwrap();
    // Dropped before the harness, so a failed assertion cannot leave the worker blocked.
    let gate = gate;

    harness.run(params()).unwrap();
    let first = harness.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(generation_of(&first), Some(0));

    harness.cancel();
    gate.send(()).unwrap();

    let rest = drain(&harness);
    assert!(rest.iter().all(|e| !matches!(e, HarnessEvent::Complete(_))));
    let Some(HarnessEvent::Failed(failure)) = rest.last() else {
        panic!("expected Failed last, got {:?}", rest.last());
    };
    assert_eq!(failure.kind, ErrorKind::Cancelled);
    assert!(rest.iter().filter_map(generation_of).all(|g| g <= 1));
    assert!(!harness.is_running());
}

#[test]
fn second_run_while_active_is_rejected() {
    let (source, gate) = GatedSource::new();
    let harness = CascadeHarness::with_source(source).unwrap();
    // Dropped before the harness, so a failed assertion cannot leave the worker blocked.
    let gate = gate;

    harness.run(params()).unwrap();
    assert!(harness.is_running());
    assert_eq!(harness.run(params()), Err(CascadeError::AlreadyRunning));

    gate.send(()).unwrap();
    let first = harness.wait(|_| {}).unwrap();
    assert_eq!(first.reactions.len(), 3);

    // The rejected request left nothing queued: the next run starts cleanly.
    assert!(harness.try_recv().is_none());
    harness.run(params()).unwrap();
    let second = harness.wait(|_| {}).unwrap();
    assert_eq!(second.reactions, first.reactions);
}

#[test]
fn new_run_is_accepted_after_failure() {
    let harness = CascadeHarness::spawn().unwrap();
    harness.run(params()).unwrap();
    let failure = harness.wait(|_| {}).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::DatabaseNotInitialized);

    harness.initialize(Arc::new(chain_db()));
    harness.run(params()).unwrap();
    let result = harness.wait(|_| {}).unwrap();
    assert_eq!(result.generations, 4);
}

#[test]
fn fuel_errors_arrive_as_failed_events() {
    let harness = CascadeHarness::with_source(Arc::new(chain_db())).unwrap();
    let mut p = params();
    p.fuel = vec!["H".into()];
    harness.run(p).unwrap();
    let events = drain(&harness);
    assert_eq!(events.len(), 1);
    let HarnessEvent::Failed(failure) = &events[0] else {
        panic!("expected Failed, got {:?}", events[0]);
    };
    assert_eq!(failure.kind, ErrorKind::InvalidNuclideFormat);
    assert!(failure.message.contains("\"H\""));
}

#[test]
fn collaborator_errors_are_passed_through() {
    let harness = CascadeHarness::with_source(Arc::new(BrokenSource)).unwrap();
    harness.run(params()).unwrap();
    let failure = harness.wait(|_| {}).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::CollaboratorError);
    assert!(failure.message.contains("connection reset"));
}

#[test]
fn one_source_serves_two_harnesses() {
    let source: Arc<dyn ReactionSource> = Arc::new(chain_db());
    let a = CascadeHarness::with_source(Arc::clone(&source)).unwrap();
    let b = CascadeHarness::with_source(source).unwrap();
    a.run(params()).unwrap();
    b.run(params()).unwrap();
    let ra = a.wait(|_| {}).unwrap();
    let rb = b.wait(|_| {}).unwrap();
    assert_eq!(ra.reactions, rb.reactions);
}
