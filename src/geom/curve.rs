use super::core::{Point3, Tolerance, Vec3};

/// Errors raised while building or sampling curves.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("curve requires at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("curve degree must be between 1 and {max}, got {degree}")]
    InvalidDegree { degree: usize, max: usize },
    #[error("knot vector must have {expected} entries, got {actual}")]
    KnotCount { expected: usize, actual: usize },
    #[error("knot vector must be non-decreasing")]
    KnotOrder,
    #[error("interpolation system is singular")]
    Singular,
    #[error("arc-length sampling needs at least 2 samples, got {0}")]
    TooFewSamples(usize),
}

/// Parametric 3D curve.
pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    fn domain(&self) -> (f64, f64);

    /// Central-difference derivative; curves with an analytic form may override.
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (t0, t1) = self.domain();
        let span = t1 - t0;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }
        let h = span * 1e-6;
        let a = (t - h).max(t0);
        let b = (t + h).min(t1);
        if b <= a {
            return Vec3::ZERO;
        }
        self.point_at(b).sub_point(self.point_at(a)).div_scalar(b - a)
    }

    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t).normalized()
    }

    fn start_point(&self) -> Point3 {
        self.point_at(self.domain().0)
    }

    fn end_point(&self) -> Point3 {
        self.point_at(self.domain().1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polyline
// ─────────────────────────────────────────────────────────────────────────────

/// Open polyline parametrized by vertex index (vertex `i` sits at `t = i`).
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline3 {
    points: Vec<Point3>,
}

impl Polyline3 {
    pub fn new(points: Vec<Point3>) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        Ok(Self { points })
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Running sum of segment lengths, starting at 0 for the first vertex.
    #[must_use]
    pub fn cumulative_lengths(&self) -> Vec<f64> {
        let mut acc = 0.0;
        let mut out = Vec::with_capacity(self.points.len());
        out.push(0.0);
        for pair in self.points.windows(2) {
            acc += pair[1].distance_to(pair[0]);
            out.push(acc);
        }
        out
    }
}

impl Curve3 for Polyline3 {
    fn point_at(&self, t: f64) -> Point3 {
        let last = (self.points.len() - 1) as f64;
        let t = t.clamp(0.0, last);
        let i = (t.floor() as usize).min(self.points.len() - 2);
        self.points[i].lerp(self.points[i + 1], t - i as f64)
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, (self.points.len() - 1) as f64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NURBS
// ─────────────────────────────────────────────────────────────────────────────

/// Non-rational clamped B-spline. The spline-IK curve is always built this way.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve3 {
    pub degree: usize,
    pub control_points: Vec<Point3>,
    pub knots: Vec<f64>,
}

impl NurbsCurve3 {
    pub fn new(degree: usize, control_points: Vec<Point3>, knots: Vec<f64>) -> Result<Self, CurveError> {
        if control_points.len() < 2 {
            return Err(CurveError::TooFewPoints(control_points.len()));
        }
        if degree == 0 || degree >= control_points.len() {
            return Err(CurveError::InvalidDegree {
                degree,
                max: control_points.len() - 1,
            });
        }
        let expected = control_points.len() + degree + 1;
        if knots.len() != expected {
            return Err(CurveError::KnotCount {
                expected,
                actual: knots.len(),
            });
        }
        if !knots.windows(2).all(|w| w[0] <= w[1]) {
            return Err(CurveError::KnotOrder);
        }
        Ok(Self {
            degree,
            control_points,
            knots,
        })
    }

    /// B-spline passing through every point: chord-length parameters,
    /// averaged knots, dense solve. Degree is clamped to `[1, n-1]`.
    pub fn interpolate_through_points(points: &[Point3], degree: usize) -> Result<Self, CurveError> {
        if points.len() < 2 {
            return Err(CurveError::TooFewPoints(points.len()));
        }
        if points.len() == 2 {
            return Self::new(1, points.to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
        }

        let p = degree.clamp(1, points.len() - 1);
        let params = chord_length_parameters(points);
        let knots = averaging_knot_vector(&params, p);

        let n = points.len();
        let matrix: Vec<Vec<f64>> = params
            .iter()
            .map(|&t| (0..n).map(|j| basis_function(j, p, t, &knots)).collect())
            .collect();

        let xs = solve_linear_system(&matrix, &points.iter().map(|pt| pt.x).collect::<Vec<_>>())?;
        let ys = solve_linear_system(&matrix, &points.iter().map(|pt| pt.y).collect::<Vec<_>>())?;
        let zs = solve_linear_system(&matrix, &points.iter().map(|pt| pt.z).collect::<Vec<_>>())?;

        let control_points = (0..n).map(|i| Point3::new(xs[i], ys[i], zs[i])).collect();
        Self::new(p, control_points, knots)
    }
}

impl Curve3 for NurbsCurve3 {
    fn point_at(&self, t: f64) -> Point3 {
        let p = self.degree;
        let (a, b) = self.domain();
        let u = t.clamp(a, b);
        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);

        let mut d: Vec<Point3> = (0..=p).map(|j| self.control_points[span - p + j]).collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let i = span - p + j;
                let denom = self.knots[i + p + 1 - r] - self.knots[i];
                let alpha = if denom == 0.0 { 0.0 } else { (u - self.knots[i]) / denom };
                d[j] = d[j - 1].lerp(d[j], alpha);
            }
        }
        d[p]
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }
}

fn chord_length_parameters(points: &[Point3]) -> Vec<f64> {
    let mut lengths = Vec::with_capacity(points.len());
    lengths.push(0.0);
    let mut total = 0.0;
    for pair in points.windows(2) {
        total += pair[1].distance_to(pair[0]);
        lengths.push(total);
    }

    if total > Tolerance::ZERO_LENGTH.eps {
        for length in &mut lengths {
            *length /= total;
        }
    } else {
        // Coincident input: fall back to uniform parameters.
        let last = (points.len() - 1) as f64;
        for (i, length) in lengths.iter_mut().enumerate() {
            *length = i as f64 / last;
        }
    }
    lengths
}

/// Clamped knots with interior values averaged over `p` consecutive parameters.
fn averaging_knot_vector(params: &[f64], p: usize) -> Vec<f64> {
    let n = params.len();
    let mut knots = Vec::with_capacity(n + p + 1);
    knots.extend(std::iter::repeat_n(0.0, p + 1));
    for j in 1..n.saturating_sub(p) {
        let sum: f64 = params[j..j + p].iter().sum();
        knots.push(sum / p as f64);
    }
    knots.extend(std::iter::repeat_n(1.0, p + 1));
    knots
}

fn basis_function(i: usize, p: usize, t: f64, knots: &[f64]) -> f64 {
    if p == 0 {
        let last = knots[knots.len() - 1];
        let inside = t >= knots[i] && t < knots[i + 1];
        let at_end = t >= last && knots[i] < knots[i + 1] && knots[i + 1] >= last;
        return if inside || at_end { 1.0 } else { 0.0 };
    }

    let mut result = 0.0;
    let left = knots[i + p] - knots[i];
    if left.abs() > 1e-14 {
        result += (t - knots[i]) / left * basis_function(i, p - 1, t, knots);
    }
    let right = knots[i + p + 1] - knots[i + 1];
    if right.abs() > 1e-14 {
        result += (knots[i + p + 1] - t) / right * basis_function(i + 1, p - 1, t, knots);
    }
    result
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>, CurveError> {
    let n = matrix.len();
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .zip(rhs)
        .map(|(row, &b)| {
            let mut r = row.clone();
            r.push(b);
            r
        })
        .collect();

    for k in 0..n {
        let pivot_row = (k..n)
            .max_by(|&a, &b| aug[a][k].abs().total_cmp(&aug[b][k].abs()))
            .unwrap_or(k);
        if aug[pivot_row][k].abs() < 1e-14 {
            return Err(CurveError::Singular);
        }
        aug.swap(k, pivot_row);
        let pivot = aug[k][k];
        for i in (k + 1)..n {
            let factor = aug[i][k] / pivot;
            for j in k..=n {
                aug[i][j] -= factor * aug[k][j];
            }
        }
    }

    let mut result = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * result[j];
        }
        result[i] = sum / aug[i][i];
    }
    Ok(result)
}

fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }
    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

// ─────────────────────────────────────────────────────────────────────────────
// Arc length
// ─────────────────────────────────────────────────────────────────────────────

/// Table resolution used by the arc-length helpers.
pub const ARC_LENGTH_SAMPLES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ArcLengthEntry {
    parameter: f64,
    arc_length: f64,
}

/// Dense parameter → cumulative length table for one curve.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcLengthTable {
    entries: Vec<ArcLengthEntry>,
}

impl ArcLengthTable {
    #[must_use]
    pub fn build<C: Curve3 + ?Sized>(curve: &C, samples: usize) -> Self {
        let samples = samples.max(2);
        let (t0, t1) = curve.domain();
        let span = t1 - t0;

        let mut entries = Vec::with_capacity(samples);
        let mut prev = curve.point_at(t0);
        let mut cumulative = 0.0;
        entries.push(ArcLengthEntry {
            parameter: t0,
            arc_length: 0.0,
        });
        for i in 1..samples {
            let t = t0 + span * (i as f64 / (samples - 1) as f64);
            let curr = curve.point_at(t);
            cumulative += curr.distance_to(prev);
            entries.push(ArcLengthEntry {
                parameter: t,
                arc_length: cumulative,
            });
            prev = curr;
        }
        Self { entries }
    }

    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.entries.last().map_or(0.0, |e| e.arc_length)
    }

    /// Parameter at which the curve has covered `target` length.
    #[must_use]
    pub fn parameter_at_length(&self, target: f64) -> f64 {
        let first = self.entries[0];
        let last = self.entries[self.entries.len() - 1];
        if target <= 0.0 {
            return first.parameter;
        }
        if target >= last.arc_length {
            return last.parameter;
        }

        let idx = self
            .entries
            .partition_point(|entry| entry.arc_length <= target)
            .saturating_sub(1)
            .min(self.entries.len() - 2);
        let e0 = self.entries[idx];
        let e1 = self.entries[idx + 1];
        let segment = e1.arc_length - e0.arc_length;
        if segment.abs() < 1e-14 {
            return e0.parameter;
        }
        let ratio = ((target - e0.arc_length) / segment).clamp(0.0, 1.0);
        e0.parameter + (e1.parameter - e0.parameter) * ratio
    }

    /// Length covered from the start of the curve up to `t`.
    #[must_use]
    pub fn length_at_parameter(&self, t: f64) -> f64 {
        let first = self.entries[0];
        let last = self.entries[self.entries.len() - 1];
        if t <= first.parameter {
            return 0.0;
        }
        if t >= last.parameter {
            return last.arc_length;
        }
        let idx = self
            .entries
            .partition_point(|entry| entry.parameter <= t)
            .saturating_sub(1)
            .min(self.entries.len() - 2);
        let e0 = self.entries[idx];
        let e1 = self.entries[idx + 1];
        let ratio = (t - e0.parameter) / (e1.parameter - e0.parameter);
        e0.arc_length + (e1.arc_length - e0.arc_length) * ratio
    }
}

/// One position produced by [`sample_even_arc_length`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSample {
    pub point: Point3,
    pub parameter: f64,
    pub arc_length: f64,
}

#[must_use]
pub fn curve_arc_length<C: Curve3 + ?Sized>(curve: &C) -> f64 {
    ArcLengthTable::build(curve, ARC_LENGTH_SAMPLES).total_length()
}

/// `count` positions spaced `total / (count - 1)` apart along the true arc
/// length, both endpoints included. A zero-length curve yields `count` copies
/// of its start at evenly spaced parameters.
pub fn sample_even_arc_length<C: Curve3 + ?Sized>(curve: &C, count: usize) -> Result<Vec<ArcSample>, CurveError> {
    if count < 2 {
        return Err(CurveError::TooFewSamples(count));
    }

    let table = ArcLengthTable::build(curve, ARC_LENGTH_SAMPLES.max(count * 16));
    let total = table.total_length();
    let (t0, t1) = curve.domain();
    let denom = (count - 1) as f64;

    let samples = (0..count)
        .map(|i| {
            let ratio = i as f64 / denom;
            if total <= Tolerance::ZERO_LENGTH.eps {
                let parameter = t0 + (t1 - t0) * ratio;
                return ArcSample {
                    point: curve.point_at(parameter),
                    parameter,
                    arc_length: 0.0,
                };
            }
            let arc_length = total * ratio;
            let parameter = if i == 0 {
                t0
            } else if i + 1 == count {
                t1
            } else {
                table.parameter_at_length(arc_length)
            };
            ArcSample {
                point: curve.point_at(parameter),
                parameter,
                arc_length,
            }
        })
        .collect();

    log::debug!("sampled {count} arc-length positions over length {total:.6}");
    Ok(samples)
}
