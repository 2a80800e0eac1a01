use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
struct Face {
    verts: [usize; 3],
    normal: Vector3<f64>,
    offset: f64,
    area2: f64,
}

impl Face {
    fn new(verts: [usize; 3], points: &[Point3<f64>]) -> Self {
        let a = points[verts[0]];
        let raw = (points[verts[1]] - a).cross(&(points[verts[2]] - a));
        let area2 = raw.norm();
        let normal = if area2 > 0.0 { raw / area2 } else { Vector3::zeros() };
        Face {
            verts,
            normal,
            offset: -normal.dot(&a.coords),
            area2,
        }
    }

    #[inline]
    fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) + self.offset
    }

    fn flipped(&self, points: &[Point3<f64>]) -> Self {
        let [a, b, c] = self.verts;
        Face::new([b, a, c], points)
    }
}

fn farthest_pair(points: &[Point3<f64>]) -> (usize, usize) {
    // extreme points along x give a long enough seed edge without O(n²)
    let mut lo = 0;
    let mut hi = 0;
    for (i, p) in points.iter().enumerate() {
        if p.x < points[lo].x { lo = i; }
        if p.x > points[hi].x { hi = i; }
    }
    if lo != hi && (points[hi] - points[lo]).norm() > 0.0 {
        return (lo, hi);
    }
    let far = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            (**a - points[0]).norm_squared().total_cmp(&(**b - points[0]).norm_squared())
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    (0, far)
}

fn farthest_from_line(points: &[Point3<f64>], a: usize, b: usize, epsilon: f64) -> Option<usize> {
    let ab = points[b] - points[a];
    let mut best = epsilon;
    let mut idx = None;
    for (i, p) in points.iter().enumerate() {
        if i == a || i == b {
            continue;
        }
        let area = ab.cross(&(*p - points[a])).norm();
        if area > best {
            best = area;
            idx = Some(i);
        }
    }
    idx
}

fn farthest_from_plane(points: &[Point3<f64>], face: &Face, epsilon: f64) -> Option<usize> {
    let mut best = epsilon;
    let mut idx = None;
    for (i, p) in points.iter().enumerate() {
        if face.verts.contains(&i) {
            continue;
        }
        let d = face.signed_distance(p).abs();
        if d > best {
            best = d;
            idx = Some(i);
        }
    }
    idx
}

/// Vertices of the 3D convex hull of `points` (incremental QuickHull).
///
/// # Arguments
///
/// * `points` - Point set, at least 4 points.
/// * `epsilon` - Distance below which points count as on a face.
///
/// # Returns
///
/// * ascending indices of the hull vertices, or `Error::GeometryDegenerate`
///   for fewer than 4 points or a collinear / coplanar set.
///
pub fn convex_hull(points: &[Point3<f64>], epsilon: f64) -> Result<Vec<usize>> {
    if points.len() < 4 {
        return Err(Error::GeometryDegenerate(format!("{} points, need at least 4", points.len())));
    }
    if points.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
        return Err(Error::GeometryDegenerate("non-finite coordinate".to_string()));
    }

    // ---- initial tetrahedron ----
    let (p0, p1) = farthest_pair(points);
    let p2 = farthest_from_line(points, p0, p1, epsilon)
        .ok_or_else(|| Error::GeometryDegenerate("points are collinear".to_string()))?;
    let base = Face::new([p0, p1, p2], points);
    let p3 = farthest_from_plane(points, &base, epsilon)
        .ok_or_else(|| Error::GeometryDegenerate("points are coplanar".to_string()))?;

    let inside = Point3::from(
        (points[p0].coords + points[p1].coords + points[p2].coords + points[p3].coords) / 4.0,
    );
    let mut faces: Vec<Face> = [[p0, p1, p2], [p0, p1, p3], [p0, p2, p3], [p1, p2, p3]]
        .iter()
        .map(|&verts| {
            let f = Face::new(verts, points);
            if f.signed_distance(&inside) > 0.0 { f.flipped(points) } else { f }
        })
        .collect();

    // ---- grow ----
    for (idx, p) in points.iter().enumerate() {
        if [p0, p1, p2, p3].contains(&idx) {
            continue;
        }
        let visible: Vec<usize> = faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.signed_distance(p) > epsilon)
            .map(|(i, _)| i)
            .collect();
        if visible.is_empty() {
            continue;
        }

        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for &fi in &visible {
            let [a, b, c] = faces[fi].verts;
            for (u, v) in [(a, b), (b, c), (c, a)] {
                let key = if u < v { (u, v) } else { (v, u) };
                *edge_count.entry(key).or_default() += 1;
            }
        }

        let mut kept = Vec::with_capacity(faces.len());
        for (i, f) in faces.into_iter().enumerate() {
            if !visible.contains(&i) {
                kept.push(f);
            }
        }
        faces = kept;

        // edges seen once bound the visible region
        let mut horizon: Vec<(usize, usize)> = edge_count
            .into_iter()
            .filter(|&(_, count)| count == 1)
            .map(|(edge, _)| edge)
            .collect();
        horizon.sort_unstable();

        for (a, b) in horizon {
            let mut face = Face::new([a, b, idx], points);
            if face.signed_distance(&inside) > 0.0 {
                face = face.flipped(points);
            }
            if face.area2 > epsilon {
                faces.push(face);
            }
        }
    }

    let mut vertices: Vec<usize> = faces.iter().flat_map(|f| f.verts).collect();
    vertices.sort_unstable();
    vertices.dedup();
    Ok(vertices)
}
