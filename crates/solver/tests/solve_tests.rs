use approx::assert_relative_eq;
use lathe_solver::{
    extract_profiles, fillet_polygon, solve, Constraint, EntityRef, RectangleOptions, Sketch,
    SolveConfig,
};
use lathe_types::parse_length;
use proptest::prelude::*;

/// Door-panel style sketch: an axis-locked rectangle pinned to a projected
/// corner, sized with unit-bearing dimensions.
#[test]
fn dimensioned_rectangle_solves_to_unit_converted_size() {
    let width = parse_length("65[in]").unwrap();
    let height = parse_length("2.1[m]").unwrap();

    let mut sketch = Sketch::new();
    let anchor = sketch.add_projection_point(0.3, 0.0);
    let rect = sketch.add_rectangle(0.0, 0.0, 1.0, 1.0, RectangleOptions::default());
    sketch
        .add_constraint(Constraint::coincident(
            EntityRef::vertex(rect, 2),
            EntityRef::whole(anchor),
        ))
        .unwrap();
    sketch
        .add_constraint(Constraint::distance(
            EntityRef::edge(rect, 1),
            EntityRef::edge(rect, 3),
            width,
        ))
        .unwrap();
    sketch
        .add_constraint(Constraint::distance(
            EntityRef::edge(rect, 2),
            EntityRef::edge(rect, 4),
            height,
        ))
        .unwrap();

    let report = solve(&mut sketch, &SolveConfig::default()).unwrap();
    assert!(report.final_residual < 1e-5);

    let profiles = extract_profiles(&sketch).unwrap();
    assert_eq!(profiles.len(), 1);
    assert_relative_eq!(
        profiles[0].signed_area(1e-6),
        1.651 * 2.1,
        epsilon = 1e-4
    );

    // The anchored corner sits on the projected point.
    let corner = sketch
        .sub_point(&EntityRef::vertex(rect, 2), &sketch.params)
        .unwrap();
    assert_relative_eq!(corner[0], 0.3, epsilon = 1e-5);
    assert_relative_eq!(corner[1], 0.0, epsilon = 1e-5);
}

#[test]
fn resizing_a_dimension_re_solves_to_the_new_value() {
    let mut sketch = Sketch::new();
    let rect = sketch.add_rectangle(0.0, 0.0, 1.0, 1.0, RectangleOptions::default());
    sketch
        .add_constraint(Constraint::fixed(EntityRef::vertex(rect, 2), 0.0, 0.0))
        .unwrap();
    let w = sketch
        .add_constraint(Constraint::distance(
            EntityRef::edge(rect, 1),
            EntityRef::edge(rect, 3),
            1.0,
        ))
        .unwrap();
    sketch
        .add_constraint(Constraint::distance(
            EntityRef::edge(rect, 2),
            EntityRef::edge(rect, 4),
            1.0,
        ))
        .unwrap();
    solve(&mut sketch, &SolveConfig::default()).unwrap();

    // Edit the width in place; the handle keeps pointing at the same slot.
    sketch
        .set_constraint(
            w,
            Constraint::distance(EntityRef::edge(rect, 1), EntityRef::edge(rect, 3), 2.5),
        )
        .unwrap();
    solve(&mut sketch, &SolveConfig::default()).unwrap();

    let profiles = extract_profiles(&sketch).unwrap();
    assert_relative_eq!(profiles[0].signed_area(1e-6), 2.5, epsilon = 1e-4);
}

proptest! {
    #[test]
    fn rectangle_profile_area_matches_dimensions(
        w in 0.1_f64..10.0,
        h in 0.1_f64..10.0,
        x in -5.0_f64..5.0,
        y in -5.0_f64..5.0,
    ) {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(x, y, w, h, RectangleOptions::default());
        let profiles = extract_profiles(&sketch).unwrap();
        prop_assert!((profiles[0].signed_area(1e-6) - w * h).abs() < 1e-9);
    }

    #[test]
    fn feasible_corner_fillets_shrink_area_predictably(
        side in 1.0_f64..10.0,
        ratio in 0.05_f64..0.2,
    ) {
        let r = side * ratio;
        let square = [[0.0, 0.0], [side, 0.0], [side, side], [0.0, side]];
        let profile = fillet_polygon(&square, &[1, 2, 3, 4], r).unwrap();
        let expected = side * side - 4.0 * r * r * (1.0 - std::f64::consts::PI / 4.0);
        let area = profile.signed_area(1e-7).abs();
        prop_assert!((area - expected).abs() < expected * 1e-3);
    }
}
