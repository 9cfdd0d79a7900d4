//! Property-based tests for region containment and contact disjuncts.
//!
//! Run with: cargo test -p hopper-planner --test contact_properties

use hopper_core::Vec2;
use hopper_planner::regions::{FreeBlock, RegionCatalog, RegionId};
use hopper_planner::scenarios::{CrossingWitness, Scenario};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-9;

// =============================================================================
// Strategies
// =============================================================================

/// A platform `[start, start + length]` at some height
fn arb_platform() -> impl Strategy<Value = (f64, f64, f64)> {
    (-5.0..5.0f64, 0.1..5.0f64, -2.0..2.0f64)
        .prop_map(|(start, length, height)| (start, start + length, height))
}

// =============================================================================
// Region containment
// =============================================================================

proptest! {
    #[test]
    fn proptest_platform_contains_its_surface(
        (start, end, height) in arb_platform(),
        fraction in 0.0..=1.0f64,
    ) {
        let mut catalog = RegionCatalog::new();
        let id = catalog.add_platform(start, end, height, 0.5).unwrap();
        let region = catalog.get(id).unwrap();
        let x = start + fraction * (end - start);
        prop_assert!(region.contains(&Vec2::new(x, height), TOLERANCE));
    }

    #[test]
    fn proptest_platform_rejects_points_off_its_surface(
        (start, end, height) in arb_platform(),
        fraction in 0.0..=1.0f64,
        offset in 1e-3..1.0f64,
        above in any::<bool>(),
    ) {
        let mut catalog = RegionCatalog::new();
        let id = catalog.add_platform(start, end, height, 0.5).unwrap();
        let region = catalog.get(id).unwrap();
        let x = start + fraction * (end - start);
        let z = if above { height + offset } else { height - offset };
        prop_assert!(!region.contains(&Vec2::new(x, z), TOLERANCE));
        prop_assert!(!region.contains(&Vec2::new(end + offset, height), TOLERANCE));
        prop_assert!(!region.contains(&Vec2::new(start - offset, height), TOLERANCE));
    }

    #[test]
    fn proptest_shrunk_block_keeps_the_disc_inside(
        bottom in -2.0..2.0f64,
        width in 1.0..5.0f64,
        radius in 0.0..0.5f64,
        fx in 0.0..=1.0f64,
        fz in 0.0..=1.0f64,
    ) {
        let mut catalog = RegionCatalog::new();
        let id = catalog.add_free_block(FreeBlock {
            left: Some(0.0),
            right: Some(width),
            top: Some(bottom + width),
            bottom: Some(bottom),
        }).unwrap();
        let region = catalog.get(id).unwrap();

        // a centre drawn inside the shrunk block
        let inner = width - 2.0 * radius;
        let centre = Vec2::new(radius + fx * inner, bottom + radius + fz * inner);
        prop_assert!(region
            .shrunk_rows(radius)
            .iter()
            .all(|(a, b)| a.dot(&centre) <= b + TOLERANCE));
        for probe in [
            Vec2::new(radius, 0.0),
            Vec2::new(-radius, 0.0),
            Vec2::new(0.0, radius),
            Vec2::new(0.0, -radius),
        ] {
            prop_assert!(region.contains(&(centre + probe), 1e-9));
        }
    }
}

// =============================================================================
// Contact disjuncts in the trajectory model
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// With the foot assigned to the platform at the first knot, the
    /// containment rows of that disjunct flag exactly the positions off the
    /// platform
    #[test]
    fn proptest_foot_on_platform_disjunct(x in -1.0..3.0f64) {
        let scenario = Scenario::platform_crossing().unwrap();
        let formulation = scenario.planner().unwrap().formulate(&scenario.boundary).unwrap();
        let witness = CrossingWitness::roll_out();
        prop_assert_eq!(witness.regions[0], RegionId(0));
        let mut values = witness.assignment(&formulation, &scenario);

        let foot = formulation.variables().contacts[0].foot.get(0, 0);
        values[foot.index()] = x;

        let flagged = formulation
            .model()
            .violations(&values, TOLERANCE)
            .iter()
            .any(|v| v.name.starts_with("contact[foot,region=0,t=0].foot_in_region"));
        let on_platform = (0.0..=2.0).contains(&x);
        prop_assert_eq!(flagged, !on_platform);
    }
}
