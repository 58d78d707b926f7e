// SPDX-License-Identifier: AGPL-3.0-only

//! Cascade validation: parsing, rule gating, termination, cancellation,
//! and pathway analysis, checked against hand-traced expectations.
//!
//! The light-element run uses the shipped `data/reactions.json`. Traced by
//! hand for fuel H-1 + Li-7 at 1200 K, dimers disallowed:
//!   - gen 0: H-1 + Li-7 → Be-8, Li-7 + Li-7 → C-14, H-1 + Li-7 → He-4 + He-4
//!   - gen 1: He-4 + Be-8 → C-12
//!   - gen 2: nothing new → `no_new_products` after 3 generations
//!
//! Exit code 0 = all checks pass, 1 = any failure.

use nuclide_cascade::analysis::analyze_pathways;
use nuclide_cascade::constants::ENERGY_SUM_TOLERANCE_MEV;
use nuclide_cascade::data::{load_reaction_database, ReactionDatabase};
use nuclide_cascade::discovery;
use nuclide_cascade::error::CascadeError;
use nuclide_cascade::nuclide::parse_fuel;
use nuclide_cascade::progress::{CancellationToken, CancelSignal, NeverCancel, RunContext};
use nuclide_cascade::reaction::{CascadeReaction, NeutrinoClass, ReactionKind};
use nuclide_cascade::simulator::{run_cascade, CascadeSimulator, TerminationReason};
use nuclide_cascade::validation::ValidationHarness;
use nuclide_cascade::CascadeParams;

fn params(fuel: &[&str], max_loops: usize, allow_dimers: bool) -> CascadeParams {
    CascadeParams {
        fuel: fuel.iter().map(|s| (*s).to_string()).collect(),
        temperature_k: 1200.0,
        min_fusion_mev: 0.0,
        min_two_to_two_mev: 0.0,
        max_nuclides: 500,
        max_loops,
        feedback_bosons: true,
        feedback_fermions: true,
        allow_dimers,
        exclude_melted: false,
        exclude_boiled_off: false,
    }
}

fn fusion(a: &str, b: &str, out: &str, mev: f64, generation: usize) -> Option<CascadeReaction> {
    Some(CascadeReaction {
        kind: ReactionKind::Fusion,
        inputs: [a.parse().ok()?, b.parse().ok()?],
        outputs: vec![out.parse().ok()?],
        energy_mev: mev,
        generation,
        neutrino: NeutrinoClass::None,
    })
}

fn check_parsing(h: &mut ValidationHarness) {
    let names: Vec<String> = parse_fuel(&["H-1", "H1", "D", "T", "Li7"])
        .map(|v| v.iter().map(ToString::to_string).collect())
        .unwrap_or_default();
    h.check_bool(
        "parse H-1,H1,D,T,Li7 → H-1,H-1,D-2,T-3,Li-7",
        names == ["H-1", "H-1", "D-2", "T-3", "Li-7"],
    );
    h.check_bool(
        "parse [H] → InvalidNuclideFormat",
        matches!(parse_fuel(&["H"]), Err(CascadeError::InvalidNuclideFormat(_))),
    );
    let empty: [&str; 0] = [];
    h.check_bool(
        "parse [] → NoValidFuel",
        parse_fuel(&empty) == Err(CascadeError::NoValidFuel),
    );
}

fn check_pathways(h: &mut ValidationHarness) {
    let repeated: Option<Vec<CascadeReaction>> = (0..3)
        .map(|g| fusion("H-1", "Li-6", "Be-7", 3.27, g))
        .collect();
    let p = analyze_pathways(&repeated.unwrap_or_default());
    h.check_count("dedup: one pathway", p.len(), 1);
    if let Some(first) = p.first() {
        h.check_count("dedup: frequency", first.frequency, 3);
        h.check_abs("dedup: total energy", first.total_energy_mev, 9.81, 1e-9);
        h.check_bool("dedup: generations [0,1,2]", first.generations_seen == [0, 1, 2]);
    }

    let chain: Option<Vec<CascadeReaction>> = [
        fusion("H-1", "Li-7", "Be-8", 17.255, 0),
        fusion("Be-8", "H-1", "B-9", -0.185, 1),
        fusion("H-1", "H-1", "D-2", 1.442, 1),
        fusion("H-1", "H-1", "D-2", 1.442, 2),
    ]
    .into_iter()
    .collect();
    let p = analyze_pathways(&chain.unwrap_or_default());
    let max_rarity = p.iter().map(|x| x.rarity_score).fold(0.0, f64::max);
    h.check_abs("rarity: max is 100", max_rarity, 100.0, 1e-12);
    let flag = |sig: &str| p.iter().find(|x| x.signature() == sig).map(|x| x.is_feedback);
    h.check_bool("feedback: A→B then B consumed", flag("H-1 + Li-7 → Be-8") == Some(true));
    h.check_bool("feedback: B never consumed", flag("Be-8 + H-1 → B-9") == Some(false));
}

fn check_light_run(h: &mut ValidationHarness, db: &ReactionDatabase) {
    match run_cascade(&params(&["H-1", "Li-7"], 10, false), db) {
        Ok(r) => {
            h.check_count("light run: reactions", r.reactions.len(), 4);
            h.check_count("light run: generations", r.generations, 3);
            h.check_bool(
                "light run: no_new_products",
                r.termination == TerminationReason::NoNewProducts,
            );
            h.check_abs(
                "light run: total energy (MeV)",
                r.total_energy_mev,
                17.255 + 26.795 + 17.347 + 7.367,
                ENERGY_SUM_TOLERANCE_MEV,
            );
            h.check_count(
                "light run: dimer rule excluded H-1 + H-1 each generation",
                r.feedback_stats.excluded_by("dimer"),
                3,
            );
        }
        Err(e) => {
            log::error!("light run failed: {e}");
            h.check_bool("light run completes", false);
        }
    }

    let budget = run_cascade(&params(&["H-1", "Li-7"], 2, false), db);
    h.check_bool(
        "max_loops reached while still producing",
        budget.is_ok_and(|r| r.termination == TerminationReason::MaxLoops && r.generations == 2),
    );
}

fn check_dimers(h: &mut ValidationHarness, db: &ReactionDatabase) {
    let h1_only = |allow| run_cascade(&params(&["H-1"], 1, allow), db).map(|r| r.reactions.len());
    h.check_bool("dimer: H-1 + H-1 excluded when disallowed", h1_only(false) == Ok(0));
    h.check_bool("dimer: H-1 + H-1 accepted when allowed", h1_only(true) == Ok(1));

    let li7_only = |allow| run_cascade(&params(&["Li-7"], 1, allow), db).map(|r| r.reactions.len());
    h.check_bool("dimer: Li-7 + Li-7 never excluded", li7_only(false) == Ok(1) && li7_only(true) == Ok(1));
}

fn check_cancellation(h: &mut ValidationHarness, db: &ReactionDatabase) {
    let token = CancellationToken::new();
    let observer = token.clone();
    let mut generations_reported = 0;
    let outcome = {
        let mut ctx = RunContext::new(db, &token).with_progress(|u| {
            if u.is_generation() {
                generations_reported += 1;
                observer.cancel();
            }
        });
        CascadeSimulator::new(params(&["H-1", "Li-7"], 10, false)).and_then(|s| s.run(&mut ctx))
    };
    h.check_bool("cancel after gen 0 → Cancelled", outcome.err() == Some(CascadeError::Cancelled));
    h.check_count("cancel: only gen 0 reported", generations_reported, 1);
    h.check_bool("cancel: token observed", token.is_cancelled());
}

fn check_monotone_pool(h: &mut ValidationHarness, db: &ReactionDatabase) {
    let cancel = NeverCancel;
    let mut ctx = RunContext::new(db, &cancel);
    let Ok(mut sim) = CascadeSimulator::new(params(&["H-1", "D", "Li-6", "Li-7"], 8, true)) else {
        h.check_bool("monotone: simulator builds", false);
        return;
    };
    let mut sizes = vec![sim.state().active_nuclides().len()];
    let mut inputs_were_active = true;
    loop {
        let before = sim.state().active_nuclides().clone();
        let seen = sim.state().reactions().len();
        match sim.step(&mut ctx) {
            Ok(stop) => {
                inputs_were_active &= sim.state().reactions()[seen..]
                    .iter()
                    .all(|r| r.inputs.iter().all(|n| before.contains(n)));
                sizes.push(sim.state().active_nuclides().len());
                if stop.is_some() {
                    break;
                }
            }
            Err(e) => {
                log::error!("monotone run failed: {e}");
                break;
            }
        }
    }
    h.check_bool("monotone: active pool never shrinks", sizes.windows(2).all(|w| w[0] <= w[1]));
    h.check_bool("acceptance: inputs active before admission", inputs_were_active);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("═══════════════════════════════════════════════════════════");
    println!("  Nuclide cascade validation");
    println!("═══════════════════════════════════════════════════════════");

    let mut harness = ValidationHarness::new("cascade");
    check_parsing(&mut harness);
    check_pathways(&mut harness);

    let db = discovery::try_discover_data_root()
        .map(|root| discovery::reaction_database_path(&root))
        .and_then(|path| load_reaction_database(&path));
    match db {
        Ok(db) => {
            check_light_run(&mut harness, &db);
            check_dimers(&mut harness, &db);
            check_cancellation(&mut harness, &db);
            check_monotone_pool(&mut harness, &db);
        }
        Err(e) => {
            eprintln!("  reaction database unavailable: {e}");
            harness.check_bool("reaction database loads", false);
        }
    }

    harness.finish();
}
