//! Platform Crossing Demonstration
//!
//! Builds the platform-crossing problem, prints the size of each model
//! variant, then plans with the ballistic witness standing in for a solver
//! engine and prints the resulting trajectory.

use std::error::Error;

use hopper_planner::scenarios::{CrossingWitness, Scenario};
use hopper_planner::solver::CandidateEngine;

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== Hopper Platform Crossing ===\n");

    let scenario = Scenario::platform_crossing()?;
    let planner = scenario.planner()?;
    let formulation = planner.formulate(&scenario.boundary)?;

    println!("Regions:");
    for (id, region) in scenario.catalog.iter() {
        println!("  {:>2}  {:<10} contact={}", id.0, region.label(), region.is_contact());
    }

    println!("\nModel variants:");
    let lowered = formulation.lowered()?;
    let relaxed = formulation.relaxed(0.2)?;
    let discretized = formulation.discretized(0.2, 0.01)?;
    for (name, model) in [
        ("formulation", formulation.model()),
        ("lowered", &lowered),
        ("relaxed", &relaxed),
        ("discretized", &discretized),
    ] {
        let stats = model.stats();
        println!(
            "  {:<12} vars={:>5} binaries={:>4} rows={:>5} products={:>3}",
            name, stats.variables, stats.discrete_variables, stats.constraints, stats.product_terms
        );
    }

    let mut candidate = CrossingWitness::roll_out().assignment(&formulation, &scenario);
    lowered.complete_assignment(&mut candidate);
    let result = planner.plan(&scenario.boundary, &CandidateEngine::new(candidate, 1e-6))?;
    println!("\nStatus: {:?}", result.status());

    if let Some(trajectory) = result.trajectory {
        println!("\n  t      x      z      foot.x  foot.z  region");
        let foot = &trajectory.contacts[0];
        for t in 0..trajectory.num_knots() {
            println!(
                "  {:.2}  {:.3}  {:.3}  {:.3}   {:.3}   {:?}",
                trajectory.times[t],
                trajectory.position[t].x,
                trajectory.position[t].y,
                foot.foot_position[t].x,
                foot.foot_position[t].y,
                foot.region[t].map(|id| id.0),
            );
        }
    }
    Ok(())
}
