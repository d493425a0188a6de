use proptest::prelude::*;
use vent_core::AdaptiveCurve;

prop_compose! {
    /// Strictly increasing x with monotone non-decreasing y.
    fn monotone_points()(
        n in 2usize..10,
        x_steps in proptest::collection::vec(1i32..500, 16),
        y_steps in proptest::collection::vec(0i32..500, 16),
        x0 in -1_000i32..1_000,
        y0 in -1_000i32..1_000,
    ) -> Vec<(i32, i32)> {
        let mut pts = Vec::with_capacity(n);
        let (mut x, mut y) = (x0, y0);
        for i in 0..n {
            pts.push((x, y));
            x += x_steps[i % x_steps.len()];
            y += y_steps[i % y_steps.len()];
        }
        pts
    }
}

proptest! {
    #[test]
    fn value_at_is_monotone_over_monotone_points(pts in monotone_points(), probes in proptest::collection::vec(-2_000i32..6_000, 8)) {
        let curve = AdaptiveCurve::new(&pts, 1, 1, 32).unwrap();
        let mut probes = probes;
        probes.sort_unstable();
        let values: Vec<i32> = probes.iter().map(|&x| curve.value_at(x)).collect();
        for w in values.windows(2) {
            prop_assert!(w[0] <= w[1], "non-monotone lookup: {values:?}");
        }
    }

    #[test]
    fn interpolation_matches_the_exact_formula(pts in monotone_points(), t in 0.0f64..1.0) {
        let curve = AdaptiveCurve::new(&pts, 1, 1, 32).unwrap();
        // Probe inside a randomly chosen stored interval.
        let idx = ((pts.len() - 1) as f64 * t) as usize % (pts.len() - 1);
        let (x0, y0) = pts[idx];
        let (x1, y1) = pts[idx + 1];
        let x = x0 + (x1 - x0) / 2;
        let expected = i64::from(y0)
            + i64::from(y1 - y0) * i64::from(x - x0) / i64::from(x1 - x0);
        prop_assert_eq!(i64::from(curve.value_at(x)), expected);
    }

    #[test]
    fn endpoints_and_capacity_survive_arbitrary_feeding(
        pts in monotone_points(),
        feed in proptest::collection::vec((-2_000i32..6_000, -2_000i32..6_000, any::<bool>()), 0..64),
    ) {
        let mut curve = AdaptiveCurve::new(&pts, 5, 5, 8).unwrap();
        let first = curve.points()[0];
        let last = *curve.points().last().unwrap();
        let cap = curve.max_points();
        for (x, y, monotonic) in feed {
            curve.add_point(x, y, monotonic);
            prop_assert!(curve.len() <= cap);
            prop_assert_eq!(curve.points()[0], first);
            prop_assert_eq!(*curve.points().last().unwrap(), last);
            // Stored points stay strictly sorted by x.
            prop_assert!(curve.points().windows(2).all(|w| w[0].0 < w[1].0));
        }
    }
}
