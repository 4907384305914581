//! Contour helpers shared by the color and shape detectors.
//!
//! Contour tracing itself comes from `imageproc`; this module keeps only the
//! external (outermost) boundaries and derives area, bounding box and the
//! closed Douglas-Peucker polygon used for shape classification.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;

use super::core::ImageRegion;

/// Outer boundaries of the top-level foreground components of `mask`.
/// Holes and anything nested inside another component are skipped.
pub fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

/// Enclosed area of a closed polyline (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// Smallest pixel-aligned rectangle containing every point.
pub fn bounding_rect(points: &[Point<i32>]) -> ImageRegion {
    let Some(first) = points.first() else {
        return ImageRegion::new(0, 0, 0, 0);
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    ImageRegion::new(
        min_x.max(0) as u32,
        min_y.max(0) as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}

/// Perimeter of the closed contour.
pub fn closed_arc_length(points: &[Point<i32>]) -> f64 {
    imageproc::geometry::arc_length(points, true)
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at two mutually distant anchor points and each half
/// is simplified as an open chain, so the result never repeats its first
/// vertex and its length is the polygon's vertex count.
pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let b = farthest_from(points, 0);
    let a = farthest_from(points, b);
    let b = farthest_from(points, a);
    if a == b {
        return vec![points[a]];
    }

    let mut polygon = Vec::new();
    simplify_chain(&cyclic_chain(points, a, b), epsilon, &mut polygon);
    simplify_chain(&cyclic_chain(points, b, a), epsilon, &mut polygon);
    polygon
}

fn farthest_from(points: &[Point<i32>], index: usize) -> usize {
    let origin = points[index];
    let mut best = index;
    let mut best_distance = 0i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let d = dx * dx + dy * dy;
        if d > best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

/// Points from `start` to `end` inclusive, wrapping around the contour.
fn cyclic_chain(points: &[Point<i32>], start: usize, end: usize) -> Vec<Point<i32>> {
    let n = points.len();
    let len = (end + n - start) % n + 1;
    (0..len).map(|i| points[(start + i) % n]).collect()
}

/// Appends the kept vertices of an open chain, excluding its last point.
fn simplify_chain(chain: &[Point<i32>], epsilon: f64, out: &mut Vec<Point<i32>>) {
    let last = chain.len() - 1;
    if last < 2 {
        out.push(chain[0]);
        return;
    }

    let (start, end) = (chain[0], chain[last]);
    let mut split = 0;
    let mut max_distance = 0.0;
    for (i, p) in chain.iter().enumerate().take(last).skip(1) {
        let d = distance_to_line(*p, start, end);
        if d > max_distance {
            max_distance = d;
            split = i;
        }
    }

    if max_distance > epsilon {
        simplify_chain(&chain[..=split], epsilon, out);
        simplify_chain(&chain[split..], epsilon, out);
    } else {
        out.push(start);
    }
}

fn distance_to_line(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let length = (dx * dx + dy * dy).sqrt();
    let (px, py) = ((p.x - a.x) as f64, (p.y - a.y) as f64);
    if length == 0.0 {
        return (px * px + py * py).sqrt();
    }
    (dx * py - dy * px).abs() / length
}
