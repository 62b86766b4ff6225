//! Scattered-data interpolation over a Delaunay triangulation.
//!
//! The triangulation is built in the (latitude, longitude) plane by a lexicographic hull
//! sweep, so its triangles tile the whole convex hull of the samples, and is then made
//! Delaunay with Lawson edge flips. Grid cells inside the hull get the barycentric blend of
//! their enclosing triangle; cells outside stay undefined. When not a single cell is defined
//! (collinear or otherwise degenerate station layouts) the whole grid falls back to
//! nearest-neighbour assignment.

use std::collections::HashMap;

use super::{EstimateWarning, Method, SurfaceStrategy};
use crate::services::points::Sample;

const INSIDE_TOLERANCE: f64 = -1e-9;
/// Orientation and in-circle threshold, measured in the unit frame of the bounding box.
const GEOMETRY_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vertex {
    x: f64,
    y: f64,
}

/// Twice the signed area of `a, b, c`; positive when counter-clockwise.
fn orient(a: Vertex, b: Vertex, c: Vertex) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Positive when `d` lies inside the circumcircle of the counter-clockwise `a, b, c`.
fn in_circle(a: Vertex, b: Vertex, c: Vertex, d: Vertex) -> f64 {
    let (adx, ady) = (a.x - d.x, a.y - d.y);
    let (bdx, bdy) = (b.x - d.x, b.y - d.y);
    let (cdx, cdy) = (c.x - d.x, c.y - d.y);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

/// Maps points into `[0, 1]²` so tolerances do not depend on the coordinate scale.
fn unit_frame(points: &[Vertex]) -> Option<Vec<Vertex>> {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let span = (max_x - min_x).max(max_y - min_y);
    if !(span > 0.0) || !span.is_finite() {
        return None;
    }
    Some(
        points
            .iter()
            .map(|p| Vertex {
                x: (p.x - min_x) / span,
                y: (p.y - min_y) / span,
            })
            .collect(),
    )
}

/// Counter-clockwise triangles with a directed-edge index.
#[derive(Debug, Default)]
struct Mesh {
    triangles: Vec<[usize; 3]>,
    // (a, b) -> triangle holding the edge a->b.
    edges: HashMap<(usize, usize), usize>,
}

impl Mesh {
    fn push(&mut self, tri: [usize; 3]) {
        self.triangles.push(tri);
        self.link(self.triangles.len() - 1);
    }

    fn link(&mut self, slot: usize) {
        let [a, b, c] = self.triangles[slot];
        for edge in [(a, b), (b, c), (c, a)] {
            self.edges.insert(edge, slot);
        }
    }

    fn unlink(&mut self, slot: usize) {
        let [a, b, c] = self.triangles[slot];
        for edge in [(a, b), (b, c), (c, a)] {
            self.edges.remove(&edge);
        }
    }

    fn apex(&self, slot: usize, a: usize, b: usize) -> Option<usize> {
        self.triangles[slot]
            .into_iter()
            .find(|&v| v != a && v != b)
    }

    /// Replaces `a, b, c` + `b, a, d` with `a, d, c` + `d, b, c`.
    fn flip(&mut self, left: usize, right: usize, [a, b, c, d]: [usize; 4]) {
        self.unlink(left);
        self.unlink(right);
        self.triangles[left] = [a, d, c];
        self.triangles[right] = [d, b, c];
        self.link(left);
        self.link(right);
    }
}

fn delaunay(points: &[Vertex]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return Vec::new();
    }
    let Some(unit) = unit_frame(points) else {
        return Vec::new();
    };

    let mut order: Vec<usize> = (0..unit.len()).collect();
    order.sort_by(|&i, &j| {
        unit[i]
            .x
            .total_cmp(&unit[j].x)
            .then(unit[i].y.total_cmp(&unit[j].y))
    });

    // Seed with the leading collinear run fanned to the first point off its line.
    let Some(seed) = (2..order.len())
        .find(|&k| orient(unit[order[0]], unit[order[1]], unit[order[k]]).abs() > GEOMETRY_TOLERANCE)
    else {
        return Vec::new();
    };
    let apex = order[seed];
    let run = &order[..seed];
    let left_turn = orient(unit[run[0]], unit[run[1]], unit[apex]) > 0.0;

    let mut mesh = Mesh::default();
    for pair in run.windows(2) {
        if left_turn {
            mesh.push([pair[0], pair[1], apex]);
        } else {
            mesh.push([pair[1], pair[0], apex]);
        }
    }
    let mut hull: Vec<usize> = if left_turn {
        run.iter().copied().chain([apex]).collect()
    } else {
        [run[0], apex].into_iter().chain(run[1..].iter().rev().copied()).collect()
    };

    // Each later point is lexicographically last, hence outside the current hull.
    for &p in &order[seed + 1..] {
        let n = hull.len();
        let visible: Vec<bool> = (0..n)
            .map(|i| orient(unit[hull[i]], unit[hull[(i + 1) % n]], unit[p]) < -GEOMETRY_TOLERANCE)
            .collect();
        let Some(first) = (0..n).find(|&i| visible[i] && !visible[(i + n - 1) % n]) else {
            continue;
        };

        let mut last = first;
        while visible[last] {
            let a = hull[last];
            let b = hull[(last + 1) % n];
            mesh.push([b, a, p]);
            last = (last + 1) % n;
        }

        let mut next_hull = Vec::with_capacity(n + 1);
        let mut i = last;
        loop {
            next_hull.push(hull[i]);
            if i == first {
                break;
            }
            i = (i + 1) % n;
        }
        next_hull.push(p);
        hull = next_hull;
    }

    legalize(&unit, &mut mesh);
    mesh.triangles
}

/// Lawson flips until no interior edge violates the empty-circumcircle condition.
fn legalize(unit: &[Vertex], mesh: &mut Mesh) {
    let mut pending: Vec<(usize, usize)> = mesh
        .edges
        .keys()
        .copied()
        .filter(|(a, b)| a < b)
        .collect();
    pending.sort_unstable();

    while let Some((a, b)) = pending.pop() {
        let (Some(&left), Some(&right)) = (mesh.edges.get(&(a, b)), mesh.edges.get(&(b, a)))
        else {
            continue;
        };
        let (Some(c), Some(d)) = (mesh.apex(left, a, b), mesh.apex(right, b, a)) else {
            continue;
        };
        if in_circle(unit[a], unit[b], unit[c], unit[d]) <= GEOMETRY_TOLERANCE {
            continue;
        }
        // Only convex quadrilaterals can be flipped.
        if orient(unit[a], unit[d], unit[c]) <= GEOMETRY_TOLERANCE
            || orient(unit[d], unit[b], unit[c]) <= GEOMETRY_TOLERANCE
        {
            continue;
        }
        mesh.flip(left, right, [a, b, c, d]);
        pending.extend([(a, d), (d, b), (b, c), (c, a)]);
    }
}

/// Planar Delaunay triangulation of a set of sample locations.
#[derive(Debug, Clone)]
pub(crate) struct Triangulation {
    vertices: Vec<Vertex>,
    values: Vec<f64>,
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    pub(crate) fn build(samples: &[Sample]) -> Self {
        let mut vertices: Vec<Vertex> = Vec::with_capacity(samples.len());
        let mut values: Vec<f64> = Vec::with_capacity(samples.len());
        for sample in samples {
            let vertex = Vertex {
                x: sample.latitude,
                y: sample.longitude,
            };
            // First occurrence wins for coincident stations.
            if vertices.contains(&vertex) {
                continue;
            }
            vertices.push(vertex);
            values.push(sample.value);
        }
        let triangles = delaunay(&vertices);
        Self {
            vertices,
            values,
            triangles,
        }
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Linear estimate at `(x, y)`, or `None` outside the convex hull.
    pub(crate) fn interpolate(&self, x: f64, y: f64) -> Option<f64> {
        let p = Vertex { x, y };
        for tri in &self.triangles {
            let a = self.vertices[tri[0]];
            let b = self.vertices[tri[1]];
            let c = self.vertices[tri[2]];
            let Some((wa, wb, wc)) = barycentric(p, a, b, c) else {
                continue;
            };
            if wa >= INSIDE_TOLERANCE && wb >= INSIDE_TOLERANCE && wc >= INSIDE_TOLERANCE {
                return Some(
                    wa * self.values[tri[0]] + wb * self.values[tri[1]] + wc * self.values[tri[2]],
                );
            }
        }
        None
    }

    pub(crate) fn nearest(&self, x: f64, y: f64) -> Option<f64> {
        let mut best: Option<(f64, f64)> = None;
        for (vertex, value) in self.vertices.iter().zip(self.values.iter()) {
            let dx = vertex.x - x;
            let dy = vertex.y - y;
            let dist_sq = dx * dx + dy * dy;
            match best {
                Some((best_dist, _)) if best_dist <= dist_sq => {}
                _ => best = Some((dist_sq, *value)),
            }
        }
        best.map(|(_, value)| value)
    }
}

fn barycentric(p: Vertex, a: Vertex, b: Vertex, c: Vertex) -> Option<(f64, f64, f64)> {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::MIN_POSITIVE || !det.is_finite() {
        return None;
    }
    let wa = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let wb = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    Some((wa, wb, 1.0 - wa - wb))
}

/// `method=grid`: convex-hull linear interpolation with an all-or-nothing nearest fallback.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ScatteredLinear;

impl SurfaceStrategy for ScatteredLinear {
    fn method(&self) -> Method {
        Method::Grid
    }

    fn evaluate(
        &self,
        samples: &[Sample],
        lat_axis: &[f64],
        lon_axis: &[f64],
    ) -> Result<Vec<Option<f64>>, EstimateWarning> {
        let mesh = Triangulation::build(samples);
        let mut cells: Vec<Option<f64>> = Vec::with_capacity(lat_axis.len() * lon_axis.len());
        for &lat in lat_axis {
            for &lon in lon_axis {
                cells.push(mesh.interpolate(lat, lon));
            }
        }

        if cells.iter().all(Option::is_none) {
            tracing::debug!(
                samples = samples.len(),
                triangles = mesh.triangle_count(),
                "linear pass produced no cells; using nearest-neighbour grid"
            );
            cells.clear();
            for &lat in lat_axis {
                for &lon in lon_axis {
                    cells.push(mesh.nearest(lat, lon));
                }
            }
        }

        Ok(cells)
    }
}
