//! Linear interpolation of scattered sensor samples
//!
//! Samples are triangulated in (line, pixel) space with an incremental
//! Bowyer-Watson Delaunay construction. Query grids are regular, so each
//! triangle is rasterized onto the grid once and the barycentric weights are
//! kept; any number of sample fields can then be interpolated from them.
//! Grid points outside the convex hull of the samples get NaN.

use crate::types::{GeoError, GeoResult};
use ndarray::{Array2, Zip};
use std::collections::HashMap;

/// Barycentric tolerance: points this close to an edge still belong to the triangle
const EDGE_TOLERANCE: f64 = 1e-9;

/// Relative area below which a triangle is considered flat
const FLAT_TOLERANCE: f64 = 1e-12;

/// Regular query grid: point (i, j) sits at line `line0 + i*stride`, pixel `pixel0 + j*stride`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub line0: usize,
    pub pixel0: usize,
    pub stride: usize,
    pub rows: usize,
    pub cols: usize,
}

impl GridSpec {
    /// Strided grid over `[0, height-1) x [0, width-1)`
    pub fn coarse(height: usize, width: usize, stride: usize) -> Self {
        // ceil((n - 1) / stride) without overflowing for huge strides
        let span = |n: usize| if n <= 1 { 0 } else { (n - 2) / stride + 1 };
        Self {
            line0: 0,
            pixel0: 0,
            stride,
            rows: span(height),
            cols: span(width),
        }
    }

    /// Every pixel of the window `[x0, x1) x [y0, y1)`
    pub fn dense(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self {
            line0: y0,
            pixel0: x0,
            stride: 1,
            rows: y1.saturating_sub(y0),
            cols: x1.saturating_sub(x0),
        }
    }

    #[inline]
    pub fn line(&self, i: usize) -> f64 {
        (self.line0 + i * self.stride) as f64
    }

    #[inline]
    pub fn pixel(&self, j: usize) -> f64 {
        (self.pixel0 + j * self.stride) as f64
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Inclusive index range of grid points whose coordinate lies in `[lo, hi]`
    fn index_range(lo: f64, hi: f64, origin: usize, stride: usize, n: usize) -> Option<(usize, usize)> {
        if n == 0 {
            return None;
        }
        let s = stride as f64;
        let o = origin as f64;
        let first = ((lo - o) / s - EDGE_TOLERANCE).ceil().max(0.0);
        let last = ((hi - o) / s + EDGE_TOLERANCE).floor().min((n - 1) as f64);
        if last < first {
            None
        } else {
            Some((first as usize, last as usize))
        }
    }
}

/// Location of one grid point inside a triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barycentric {
    pub triangle: usize,
    /// Weights of the second and third vertex; the first gets `1 - w1 - w2`
    pub weights: [f64; 2],
}

/// Triangle locations for every point of a query grid
#[derive(Debug, Clone)]
pub struct BarycentricGrid {
    cells: Array2<Option<Barycentric>>,
    triangles: Vec<[usize; 3]>,
}

impl BarycentricGrid {
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// Number of grid points inside the sample hull
    pub fn covered(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Interpolate one sample field onto the grid; uncovered points are NaN
    #[cfg(feature = "parallel")]
    pub fn interpolate(&self, values: &[f64]) -> Array2<f64> {
        Zip::from(&self.cells).par_map_collect(|cell| self.evaluate(cell, values))
    }

    /// Interpolate one sample field onto the grid; uncovered points are NaN
    #[cfg(not(feature = "parallel"))]
    pub fn interpolate(&self, values: &[f64]) -> Array2<f64> {
        Zip::from(&self.cells).map_collect(|cell| self.evaluate(cell, values))
    }

    #[inline]
    fn evaluate(&self, cell: &Option<Barycentric>, values: &[f64]) -> f64 {
        match cell {
            Some(b) => {
                let [a, v1, v2] = self.triangles[b.triangle];
                barycentric_value(values, a, v1, v2, b.weights)
            }
            None => f64::NAN,
        }
    }
}

/// Piecewise-linear interpolator over a Delaunay triangulation of scattered samples
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    /// (line, pixel) of every input sample, indexed like the caller's value arrays
    points: Vec<[f64; 2]>,
    triangles: Vec<[usize; 3]>,
}

impl LinearInterpolator {
    /// Triangulate `(line, pixel)` sample positions.
    ///
    /// Repeated positions keep the first sample. Fails when fewer than three
    /// distinct, non-collinear positions remain.
    pub fn new(points: &[[f64; 2]]) -> GeoResult<Self> {
        let unique = unique_points(points);

        if unique.len() < 3 {
            return Err(GeoError::InsufficientSamples(format!(
                "{} distinct sample positions, at least 3 are required",
                unique.len()
            )));
        }
        if unique.len() < points.len() {
            log::warn!(
                "Ignoring {} duplicated sample positions",
                points.len() - unique.len()
            );
        }
        if is_collinear(points, &unique) {
            return Err(GeoError::InsufficientSamples(
                "all sample positions are collinear".to_string(),
            ));
        }

        let triangles = delaunay(points, &unique);
        if triangles.is_empty() {
            return Err(GeoError::InsufficientSamples(
                "sample positions produce an empty triangulation".to_string(),
            ));
        }

        log::debug!(
            "Triangulated {} samples into {} triangles",
            unique.len(),
            triangles.len()
        );

        Ok(Self {
            points: points.to_vec(),
            triangles,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Locate every point of `grid` in the triangulation.
    ///
    /// A grid point on an edge shared by two triangles belongs to the first
    /// triangle in triangulation order, so results are deterministic.
    pub fn locate(&self, grid: &GridSpec) -> BarycentricGrid {
        let mut cells: Array2<Option<Barycentric>> = Array2::from_elem(grid.dim(), None);

        self.rasterize(grid, |i, j, triangle, weights| {
            cells[[i, j]] = Some(Barycentric { triangle, weights });
        });

        BarycentricGrid {
            cells,
            triangles: self.triangles.clone(),
        }
    }

    /// Interpolate several sample fields onto `grid` in a single sweep.
    ///
    /// Gives the same values as `locate(grid).interpolate(..)` for each field,
    /// without keeping the per-point triangle locations in memory. Suited to
    /// large grids that are interpolated only once.
    pub fn interpolate_fields(&self, grid: &GridSpec, fields: &[&[f64]]) -> Vec<Array2<f64>> {
        let mut outputs: Vec<Array2<f64>> = fields
            .iter()
            .map(|_| Array2::from_elem(grid.dim(), f64::NAN))
            .collect();

        self.rasterize(grid, |i, j, triangle, weights| {
            let [a, v1, v2] = self.triangles[triangle];
            for (out, values) in outputs.iter_mut().zip(fields) {
                out[[i, j]] = barycentric_value(values, a, v1, v2, weights);
            }
        });

        outputs
    }

    /// Visit every grid point covered by the triangulation exactly once, with
    /// the index of the first triangle containing it and its barycentric weights
    fn rasterize<F>(&self, grid: &GridSpec, mut visit: F)
    where
        F: FnMut(usize, usize, usize, [f64; 2]),
    {
        let mut claimed = Array2::from_elem(grid.dim(), false);

        for (t, &[ia, ib, ic]) in self.triangles.iter().enumerate() {
            let a = self.points[ia];
            let b = self.points[ib];
            let c = self.points[ic];

            let d1 = [b[0] - a[0], b[1] - a[1]];
            let d2 = [c[0] - a[0], c[1] - a[1]];
            let det = cross(d1, d2);
            let scale = (d1[0] * d1[0] + d1[1] * d1[1]).max(d2[0] * d2[0] + d2[1] * d2[1]);
            if det.abs() <= FLAT_TOLERANCE * scale {
                continue;
            }

            let line_lo = a[0].min(b[0]).min(c[0]);
            let line_hi = a[0].max(b[0]).max(c[0]);
            let pixel_lo = a[1].min(b[1]).min(c[1]);
            let pixel_hi = a[1].max(b[1]).max(c[1]);

            let rows = GridSpec::index_range(line_lo, line_hi, grid.line0, grid.stride, grid.rows);
            let cols = GridSpec::index_range(pixel_lo, pixel_hi, grid.pixel0, grid.stride, grid.cols);
            let ((i0, i1), (j0, j1)) = match (rows, cols) {
                (Some(r), Some(c)) => (r, c),
                _ => continue,
            };

            for i in i0..=i1 {
                let ql = grid.line(i) - a[0];
                for j in j0..=j1 {
                    if claimed[[i, j]] {
                        continue;
                    }
                    let q = [ql, grid.pixel(j) - a[1]];
                    let w1 = cross(q, d2) / det;
                    let w2 = cross(d1, q) / det;
                    if w1 >= -EDGE_TOLERANCE
                        && w2 >= -EDGE_TOLERANCE
                        && w1 + w2 <= 1.0 + EDGE_TOLERANCE
                    {
                        claimed[[i, j]] = true;
                        visit(i, j, t, [w1, w2]);
                    }
                }
            }
        }
    }
}

/// Linear value inside triangle `[a, v1, v2]`, written relative to the first
/// vertex so constant fields stay exact
#[inline]
fn barycentric_value(values: &[f64], a: usize, v1: usize, v2: usize, weights: [f64; 2]) -> f64 {
    let base = values[a];
    base + weights[0] * (values[v1] - base) + weights[1] * (values[v2] - base)
}

#[inline]
fn cross(u: [f64; 2], v: [f64; 2]) -> f64 {
    u[0] * v[1] - u[1] * v[0]
}

/// Indices of the first occurrence of each distinct position, sorted by position
fn unique_points(points: &[[f64; 2]]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len())
        .filter(|&i| points[i][0].is_finite() && points[i][1].is_finite())
        .collect();
    order.sort_by(|&i, &j| {
        points[i][0]
            .total_cmp(&points[j][0])
            .then(points[i][1].total_cmp(&points[j][1]))
            .then(i.cmp(&j))
    });
    order.dedup_by(|later, earlier| points[*later] == points[*earlier]);
    order
}

fn is_collinear(points: &[[f64; 2]], unique: &[usize]) -> bool {
    let p0 = points[unique[0]];
    let far = unique
        .iter()
        .map(|&i| points[i])
        .max_by(|p, q| {
            let dp = (p[0] - p0[0]).powi(2) + (p[1] - p0[1]).powi(2);
            let dq = (q[0] - p0[0]).powi(2) + (q[1] - p0[1]).powi(2);
            dp.total_cmp(&dq)
        })
        .unwrap_or(p0);

    let axis = [far[0] - p0[0], far[1] - p0[1]];
    let norm2 = axis[0] * axis[0] + axis[1] * axis[1];
    if norm2 == 0.0 {
        return true;
    }

    unique.iter().all(|&i| {
        let p = points[i];
        cross(axis, [p[0] - p0[0], p[1] - p0[1]]).abs() <= FLAT_TOLERANCE * norm2
    })
}

#[derive(Debug, Clone, Copy)]
struct Circumcircle {
    cx: f64,
    cy: f64,
    r2: f64,
}

#[derive(Debug, Clone, Copy)]
struct WorkTriangle {
    v: [usize; 3],
    circle: Option<Circumcircle>,
}

impl WorkTriangle {
    fn new(v: [usize; 3], pts: &[[f64; 2]]) -> Self {
        Self {
            v,
            circle: circumcircle(pts[v[0]], pts[v[1]], pts[v[2]]),
        }
    }

    /// Flat triangles have no circle and are always replaced
    fn encloses(&self, p: [f64; 2]) -> bool {
        match self.circle {
            Some(c) => (p[0] - c.cx).powi(2) + (p[1] - c.cy).powi(2) < c.r2,
            None => true,
        }
    }
}

fn circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<Circumcircle> {
    let (bx, by) = (b[0] - a[0], b[1] - a[1]);
    let (cx, cy) = (c[0] - a[0], c[1] - a[1]);
    let d = 2.0 * (bx * cy - by * cx);
    if d.abs() < 1e-300 {
        return None;
    }
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    Some(Circumcircle {
        cx: a[0] + ux,
        cy: a[1] + uy,
        r2: ux * ux + uy * uy,
    })
}

/// Bowyer-Watson triangulation of `points[unique]`, returned with the caller's indices
fn delaunay(points: &[[f64; 2]], unique: &[usize]) -> Vec<[usize; 3]> {
    // Work in the unit square so the super triangle size is independent of the image size
    let (mut lo, mut hi) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
    for &i in unique {
        for k in 0..2 {
            lo[k] = lo[k].min(points[i][k]);
            hi[k] = hi[k].max(points[i][k]);
        }
    }
    let scale = (hi[0] - lo[0]).max(hi[1] - lo[1]);

    let mut pts: Vec<[f64; 2]> = unique
        .iter()
        .map(|&i| [(points[i][0] - lo[0]) / scale, (points[i][1] - lo[1]) / scale])
        .collect();
    let n = pts.len();
    pts.push([-1.0e3, -1.0e3]);
    pts.push([3.0e3, -1.0e3]);
    pts.push([-1.0e3, 3.0e3]);

    let mut triangles = vec![WorkTriangle::new([n, n + 1, n + 2], &pts)];

    for p_idx in 0..n {
        let p = pts[p_idx];

        let (bad, good): (Vec<WorkTriangle>, Vec<WorkTriangle>) =
            triangles.into_iter().partition(|t| t.encloses(p));

        // Cavity boundary: edges owned by exactly one bad triangle
        let mut edges: Vec<[usize; 2]> = Vec::with_capacity(bad.len() * 3);
        for t in &bad {
            for k in 0..3 {
                edges.push([t.v[k], t.v[(k + 1) % 3]]);
            }
        }
        let mut owners: HashMap<(usize, usize), usize> = HashMap::with_capacity(edges.len());
        for &[e0, e1] in &edges {
            *owners.entry((e0.min(e1), e0.max(e1))).or_insert(0) += 1;
        }
        let boundary: Vec<[usize; 2]> = edges
            .iter()
            .filter(|&&[e0, e1]| owners[&(e0.min(e1), e0.max(e1))] == 1)
            .copied()
            .collect();

        triangles = good;
        for [e0, e1] in boundary {
            triangles.push(WorkTriangle::new([e0, e1, p_idx], &pts));
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n))
        .map(|t| [unique[t.v[0]], unique[t.v[1]], unique[t.v[2]]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_corners() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [0.0, 100.0], [100.0, 0.0], [100.0, 100.0]]
    }

    #[test]
    fn test_square_is_split_in_two() {
        let interp = LinearInterpolator::new(&square_corners()).unwrap();
        assert_eq!(interp.triangle_count(), 2);
    }

    #[test]
    fn test_linear_field_is_reproduced() {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for line in (0..=60).step_by(20) {
            for pixel in (0..=90).step_by(30) {
                points.push([line as f64, pixel as f64]);
                values.push(3.0 + 0.5 * line as f64 - 0.25 * pixel as f64);
            }
        }

        let interp = LinearInterpolator::new(&points).unwrap();
        let grid = GridSpec::dense(0, 0, 91, 61);
        let located = interp.locate(&grid);
        assert_eq!(located.covered(), 61 * 91);

        let field = located.interpolate(&values);
        for ((i, j), &v) in field.indexed_iter() {
            let expected = 3.0 + 0.5 * i as f64 - 0.25 * j as f64;
            assert_abs_diff_eq!(v, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_points_outside_hull_are_nan() {
        let points = vec![[0.0, 0.0], [0.0, 10.0], [10.0, 0.0]];
        let interp = LinearInterpolator::new(&points).unwrap();
        let field = interp
            .locate(&GridSpec::dense(0, 0, 11, 11))
            .interpolate(&[1.0, 2.0, 3.0]);

        assert!(field[[0, 0]].is_finite());
        assert!(field[[5, 5]].is_finite()); // on the hypotenuse
        assert!(field[[6, 6]].is_nan());
        assert!(field[[10, 10]].is_nan());
    }

    #[test]
    fn test_constant_field_is_exact() {
        let interp = LinearInterpolator::new(&square_corners()).unwrap();
        let field = interp
            .locate(&GridSpec::dense(0, 0, 100, 100))
            .interpolate(&[30.0; 4]);
        assert!(field.iter().all(|&v| v == 30.0));
    }

    #[test]
    fn test_coarse_grid_shape() {
        let grid = GridSpec::coarse(100, 100, 5);
        assert_eq!(grid.dim(), (20, 20));
        assert_eq!(grid.line(19), 95.0);

        let grid = GridSpec::coarse(101, 7, 3);
        assert_eq!(grid.dim(), (34, 2));
        assert_eq!(GridSpec::coarse(1, 1, 5).dim(), (0, 0));
    }

    #[test]
    fn test_coarse_grid_with_huge_stride() {
        let grid = GridSpec::coarse(100, 2, usize::MAX);
        assert_eq!(grid.dim(), (1, 1));
        assert_eq!(grid.line(0), 0.0);
        assert_eq!(GridSpec::coarse(100, 100, 200).dim(), (1, 1));
        assert_eq!(GridSpec::coarse(100, 100, 99).dim(), (1, 1));
        assert_eq!(GridSpec::coarse(100, 100, 98).dim(), (2, 2));
    }

    #[test]
    fn test_single_sweep_matches_located_grid() {
        let points = vec![[0.0, 0.0], [0.0, 40.0], [35.0, 5.0], [30.0, 45.0], [12.0, 18.0]];
        let lat: Vec<f64> = points.iter().map(|p| 45.0 + 0.01 * p[0] + 0.002 * p[1]).collect();
        let lon: Vec<f64> = points.iter().map(|p| 5.0 - 0.001 * p[0] + 0.01 * p[1]).collect();
        let interp = LinearInterpolator::new(&points).unwrap();

        for grid in [GridSpec::coarse(36, 46, 4), GridSpec::dense(3, 2, 44, 33)] {
            let swept = interp.interpolate_fields(&grid, &[&lat, &lon]);
            let located = interp.locate(&grid);
            assert_eq!(swept.len(), 2);

            for (field, values) in swept.iter().zip([&lat, &lon]) {
                let expected = located.interpolate(values);
                assert_eq!(field.dim(), expected.dim());
                for (&a, &b) in field.iter().zip(expected.iter()) {
                    assert!(a == b || (a.is_nan() && b.is_nan()), "{} != {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_jittered_dense_samples() {
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                let jitter = |k: usize| ((k * 7919) % 1000) as f64 / 1000.0 - 0.5;
                points.push([
                    10.0 * i as f64 + 3.0 * jitter(i * 40 + j),
                    10.0 * j as f64 + 3.0 * jitter(i * 40 + j + 17),
                ]);
            }
        }
        let values: Vec<f64> = points.iter().map(|p| 1.5 * p[0] - 0.5 * p[1] + 7.0).collect();

        let interp = LinearInterpolator::new(&points).unwrap();
        assert!(interp.triangle_count() > 2500);

        let grid = GridSpec::dense(0, 0, 391, 391);
        let field = interp.locate(&grid).interpolate(&values);
        for ((i, j), &v) in field.indexed_iter() {
            if v.is_finite() {
                assert_abs_diff_eq!(v, 1.5 * i as f64 - 0.5 * j as f64 + 7.0, epsilon = 1e-8);
            }
        }
        // Everything away from the jittered border is covered
        assert!(field.slice(ndarray::s![5..385, 5..385]).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_duplicates_keep_first_sample() {
        let mut points = square_corners();
        points.push([0.0, 0.0]);
        let interp = LinearInterpolator::new(&points).unwrap();
        let field = interp
            .locate(&GridSpec::dense(0, 0, 1, 1))
            .interpolate(&[1.0, 1.0, 1.0, 1.0, 99.0]);
        assert_eq!(field[[0, 0]], 1.0);
    }

    #[test]
    fn test_insufficient_samples() {
        let two = vec![[0.0, 0.0], [1.0, 1.0]];
        assert!(matches!(
            LinearInterpolator::new(&two),
            Err(GeoError::InsufficientSamples(_))
        ));

        let repeated = vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        assert!(matches!(
            LinearInterpolator::new(&repeated),
            Err(GeoError::InsufficientSamples(_))
        ));

        let line = vec![[0.0, 0.0], [1.0, 2.0], [2.0, 4.0], [5.0, 10.0]];
        assert!(matches!(
            LinearInterpolator::new(&line),
            Err(GeoError::InsufficientSamples(_))
        ));
    }

    #[test]
    fn test_irregular_samples_cover_hull() {
        let points = vec![
            [0.0, 0.0],
            [3.0, 47.0],
            [12.0, 99.0],
            [41.0, 8.0],
            [55.0, 61.0],
            [78.0, 33.0],
            [99.0, 0.0],
            [97.0, 96.0],
            [30.0, 30.0],
        ];
        let values: Vec<f64> = points.iter().map(|p| 2.0 * p[0] + p[1]).collect();
        let interp = LinearInterpolator::new(&points).unwrap();
        let field = interp
            .locate(&GridSpec::dense(0, 0, 100, 100))
            .interpolate(&values);

        // Interior point of the hull
        assert_abs_diff_eq!(field[[50, 50]], 150.0, epsilon = 1e-9);
        // Sample positions reproduce the sample values
        assert_abs_diff_eq!(field[[55, 61]], 2.0 * 55.0 + 61.0, epsilon = 1e-9);
    }
}
