//! End-to-end checks of the planning pipeline on the platform crossing.
//!
//! The crossing comes with a ballistic witness trajectory rolled out with
//! the model's own integration scheme. Every model variant derived from the
//! formulation must accept it, and the pipeline must hand it back intact.
//!
//! Run with: cargo test -p hopper-planner --test scenario

use approx::assert_relative_eq;
use hopper_core::model::Model;
use hopper_core::GRAVITY;
use hopper_planner::config::{EngineSelector, LoweringScheme, SolverConfig};
use hopper_planner::planner::Formulation;
use hopper_planner::regions::RegionId;
use hopper_planner::scenarios::{CrossingWitness, Scenario};
use hopper_planner::solver::CandidateEngine;
use hopper_planner::SolveStatus;

const TOLERANCE: f64 = 1e-6;

fn formulate(scenario: &Scenario) -> Formulation {
    scenario
        .planner()
        .unwrap()
        .formulate(&scenario.boundary)
        .unwrap()
}

fn assert_accepts(model: &Model, values: &[f64]) {
    let violations = model.violations(values, TOLERANCE);
    assert!(violations.is_empty(), "{}: {violations:?}", model.name());
}

/// Witness values lifted into a transformed copy
fn lifted(model: &Model, witness: &[f64]) -> Vec<f64> {
    let mut values = witness[..witness.len().min(model.num_variables())].to_vec();
    model.complete_assignment(&mut values);
    values
}

#[test]
fn test_witness_satisfies_formulation() {
    let scenario = Scenario::platform_crossing().unwrap();
    let formulation = formulate(&scenario);
    let values = CrossingWitness::roll_out().assignment(&formulation, &scenario);
    assert_accepts(formulation.model(), &values);
}

#[test]
fn test_witness_survives_both_lowerings() {
    for scheme in [LoweringScheme::ConvexHull, LoweringScheme::BigM] {
        let mut scenario = Scenario::platform_crossing().unwrap();
        scenario.config.lowering.scheme = scheme;
        let formulation = formulate(&scenario);
        let witness = CrossingWitness::roll_out().assignment(&formulation, &scenario);

        let lowered = formulation.lowered().unwrap();
        assert!(lowered.disjunctions().is_empty());
        assert_accepts(&lowered, &lifted(&lowered, &witness));
    }
}

#[test]
fn test_witness_survives_relaxation_and_discretization() {
    let scenario = Scenario::platform_crossing().unwrap();
    let formulation = formulate(&scenario);
    let witness = CrossingWitness::roll_out().assignment(&formulation, &scenario);

    let relaxed = formulation.relaxed(0.2).unwrap();
    assert_accepts(&relaxed, &lifted(&relaxed, &witness));

    let discretized = formulation.discretized(0.2, 0.01).unwrap();
    assert_accepts(&discretized, &lifted(&discretized, &witness));
}

#[test]
fn test_wrong_region_is_rejected() {
    let scenario = Scenario::platform_crossing().unwrap();
    let formulation = formulate(&scenario);
    let mut witness = CrossingWitness::roll_out();
    // the foot is 0.08 above the platform at the middle knot
    witness.regions[2] = RegionId(0);
    let values = witness.assignment(&formulation, &scenario);

    let violations = formulation.model().violations(&values, TOLERANCE);
    assert!(violations
        .iter()
        .any(|v| v.name.starts_with("contact[foot,region=0,t=2].foot_in_region")));
}

#[test]
fn test_unreachable_target_is_rejected() {
    let mut scenario = Scenario::platform_crossing().unwrap();
    scenario.boundary.final_min_x = Some(2.0);
    let formulation = formulate(&scenario);
    let values = CrossingWitness::roll_out().assignment(&formulation, &scenario);
    assert!(!formulation.model().is_feasible(&values, TOLERANCE));
}

#[test]
fn test_body_avoidance_accepts_witness() {
    let mut scenario = Scenario::platform_crossing().unwrap();
    scenario.config.contact.body_avoidance = true;
    let formulation = formulate(&scenario);
    assert_eq!(formulation.schedule().body.len(), 5);

    let values = CrossingWitness::roll_out().assignment(&formulation, &scenario);
    assert_accepts(formulation.model(), &values);
    let lowered = formulation.lowered().unwrap();
    assert_accepts(&lowered, &lifted(&lowered, &values));
}

#[test]
fn test_plan_returns_witness_trajectory() {
    let scenario = Scenario::platform_crossing().unwrap();
    let planner = scenario.planner().unwrap();
    let formulation = planner.formulate(&scenario.boundary).unwrap();
    let witness = CrossingWitness::roll_out();
    let lowered = formulation.lowered().unwrap();
    let candidate = lifted(&lowered, &witness.assignment(&formulation, &scenario));

    let result = planner
        .plan(&scenario.boundary, &CandidateEngine::new(candidate, TOLERANCE))
        .unwrap();
    assert_eq!(result.status(), SolveStatus::Optimal);
    assert!(result.outcome.objective.is_some());

    let trajectory = result.trajectory.unwrap();
    assert_eq!(trajectory.num_knots(), 5);
    assert_relative_eq!(trajectory.duration(), 0.8, epsilon = 1e-9);
    assert_relative_eq!(trajectory.times[4], trajectory.times[3], epsilon = 1e-12);
    assert_relative_eq!(trajectory.position[4].x, 1.5, epsilon = 1e-9);

    let foot = &trajectory.contacts[0];
    assert_eq!(
        foot.region,
        witness.regions.iter().copied().map(Some).collect::<Vec<_>>()
    );
    for knot in &foot.indicators {
        assert_relative_eq!(knot.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }
    assert!(trajectory.region_violations(&scenario.catalog, TOLERANCE).is_empty());
}

#[test]
fn test_extracted_velocities_follow_trapezoidal_rule() {
    let scenario = Scenario::platform_crossing().unwrap();
    let formulation = formulate(&scenario);
    let values = CrossingWitness::roll_out().assignment(&formulation, &scenario);
    let trajectory = formulation.extract(&values).unwrap();

    for t in 0..trajectory.num_knots() - 1 {
        let dt = trajectory.times[t + 1] - trajectory.times[t];
        let dv = trajectory.velocity[t + 1] - trajectory.velocity[t];
        assert_relative_eq!(dv.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(dv.y, -GRAVITY * dt, epsilon = 1e-9);
    }
    for t in 0..trajectory.num_knots() {
        assert_relative_eq!(trajectory.torque[t], trajectory.contact_torque(t), epsilon = 1e-12);
    }
}

#[test]
fn test_relaxed_model_goes_to_linear_engine() {
    let scenario = Scenario::platform_crossing().unwrap();
    let formulation = formulate(&scenario);
    let witness = CrossingWitness::roll_out().assignment(&formulation, &scenario);
    let relaxed = formulation.relaxed(0.2).unwrap();
    let candidate = lifted(&relaxed, &witness);

    let milp = SolverConfig {
        engine: EngineSelector::Milp,
        ..SolverConfig::default()
    };
    let outcome = formulation
        .solve(relaxed, &CandidateEngine::new(candidate, TOLERANCE), &milp)
        .unwrap();
    assert_eq!(outcome.status, SolveStatus::Optimal);

    // the unrelaxed model still carries products
    let lowered = formulation.lowered().unwrap();
    assert!(formulation
        .solve(lowered, &CandidateEngine::new(Vec::new(), TOLERANCE), &milp)
        .is_err());
}

#[test]
fn test_fixed_schedule_keeps_witness_feasible() {
    let scenario = Scenario::platform_crossing().unwrap();
    let mut formulation = formulate(&scenario);
    let values = CrossingWitness::roll_out().assignment(&formulation, &scenario);

    let fixed = formulation.fix_schedule(&values).unwrap();
    assert!(fixed >= 10);
    assert_accepts(formulation.model(), &values);
    assert_eq!(formulation.unfix_schedule(), fixed);
}

#[test]
fn test_gap_hop_formulates() {
    let scenario = Scenario::gap_hop().unwrap();
    let formulation = formulate(&scenario);
    let stats = formulation.model().stats();
    assert_eq!(stats.disjunctions, 10);
    assert_eq!(stats.disjuncts, 30);
    assert!(formulation.model().constraint_by_name("boundary.final_torque").is_some());
    assert!(formulation.model().constraint_by_name("boundary.return_height").is_some());
}
