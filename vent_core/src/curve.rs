//! Ordered, self-correcting piecewise-linear lookup table.
//!
//! The actuator's drive→effect relationship is nonlinear, device-specific,
//! and drifts over time, so instead of a factory calibration table the curve
//! re-learns itself online from confirmed steady-state observations. The two
//! endpoints are fixed anchors; interior points come and go as feedback
//! arrives.

use crate::error::BuildError;

/// Piecewise-linear lookup over sorted `(x, y)` points with flat
/// extrapolation outside the covered x range. Interpolation uses truncating
/// integer division.
pub fn interpolate_clamped(points: &[(i32, i32)], x: i32) -> i32 {
    let Some((&(x0, y0), &(xn, yn))) = points.first().zip(points.last()) else {
        return 0;
    };
    if x <= x0 {
        return y0;
    }
    if x >= xn {
        return yn;
    }
    // Bracketing interval: points[i].x <= x < points[i+1].x.
    let i = points.partition_point(|&(px, _)| px <= x) - 1;
    let (ax, ay) = points[i];
    let (bx, by) = points[i + 1];
    let (ax, ay, bx, by) = (
        i64::from(ax),
        i64::from(ay),
        i64::from(bx),
        i64::from(by),
    );
    (ay + (by - ay) * (i64::from(x) - ax) / (bx - ax)) as i32
}

/// Sorted sequence of unique `(input, effect)` pairs with protected endpoints
/// and a fixed point capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveCurve {
    points: Vec<(i32, i32)>,
    min_dx: i32,
    min_dy: i32,
    max_points: usize,
}

impl AdaptiveCurve {
    /// Build from at least two seed points. Points are sorted; duplicate x
    /// values are rejected. The smallest- and largest-x points become the
    /// permanent endpoints. `max_points` is raised to the seed count if
    /// smaller.
    pub fn new(
        initial: &[(i32, i32)],
        min_dx: i32,
        min_dy: i32,
        max_points: usize,
    ) -> Result<Self, BuildError> {
        let mut sorted: Vec<(i32, i32)> = initial.to_vec();
        sorted.sort_unstable();
        if sorted.len() < 2 {
            return Err(BuildError::CurveTooSmall);
        }
        if sorted.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(BuildError::CurveDuplicateX);
        }
        let max_points = max_points.max(sorted.len());
        let mut points = Vec::with_capacity(max_points);
        points.extend(sorted);
        Ok(Self {
            points,
            min_dx,
            min_dy,
            max_points,
        })
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        false // invariant: at least the two endpoints
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Pure lookup; see [`interpolate_clamped`].
    pub fn value_at(&self, x: i32) -> i32 {
        interpolate_clamped(&self.points, x)
    }

    /// Feed one confirmed observation into the table.
    ///
    /// No-op unless `x` and `y` fall strictly inside the open interval
    /// spanned by the endpoints. Interior points too close to the new one
    /// (within `min_dx`/`min_dy`), or whose x-vs-y ordering contradicts it
    /// when `monotonic` is set, are evicted first; the new point is inserted
    /// only if capacity allows after eviction.
    pub fn add_point(&mut self, x: i32, y: i32, monotonic: bool) {
        debug_assert!(self.points.len() >= 2);
        let (x0, y0) = self.points[0];
        let (xn, yn) = self.points[self.points.len() - 1];
        if !(x0 < x && x < xn) || !(y0 < y && y < yn) {
            return;
        }
        // Scan interior points from the high-x end so removals don't shift
        // the part still to visit.
        for i in (1..self.points.len() - 1).rev() {
            let (xi, yi) = self.points[i];
            if (monotonic && ((x < xi) != (y < yi)))
                || (x - xi).abs() < self.min_dx
                || (y - yi).abs() < self.min_dy
            {
                self.points.remove(i);
            }
        }
        if self.points.len() < self.max_points {
            let idx = self.points.partition_point(|&(px, _)| px < x);
            self.points.insert(idx, (x, y));
        }
    }
}
