//! Pure geometry helpers shared by the layout engine and the scene renderer.

use nodeweave_core::{Rect, Vec2};

const DEGENERATE_EPSILON: f32 = 1e-6;

/// Point where the ray from `center` toward `target` leaves the rectangle of
/// size `w`×`h` centered on `center`, grown by `padding` on every side.
///
/// Returns `center` unchanged when `center == target`.
pub fn rect_edge_point(center: Vec2, target: Vec2, w: f32, h: f32, padding: f32) -> Vec2 {
    let delta = target - center;
    if delta.x.abs() < DEGENERATE_EPSILON && delta.y.abs() < DEGENERATE_EPSILON {
        return center;
    }

    let half_w = (w * 0.5 + padding).max(0.0);
    let half_h = (h * 0.5 + padding).max(0.0);

    let tx = if delta.x.abs() > DEGENERATE_EPSILON {
        half_w / delta.x.abs()
    } else {
        f32::INFINITY
    };
    let ty = if delta.y.abs() > DEGENERATE_EPSILON {
        half_h / delta.y.abs()
    } else {
        f32::INFINITY
    };

    let t = tx.min(ty);
    if !t.is_finite() {
        return center;
    }
    center + delta * t
}

pub fn point_in_rect(point: Vec2, rect: &Rect) -> bool {
    rect.contains(point)
}

pub fn rects_intersect(a: &Rect, b: &Rect) -> bool {
    a.intersects(b)
}

/// Shortest distance from `point` to the segment `a`–`b`.
pub fn segment_distance(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= DEGENERATE_EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// Smallest rectangle enclosing every rectangle, or `None` for an empty input.
pub fn bounding_box<I>(rects: I) -> Option<Rect>
where
    I: IntoIterator<Item = Rect>,
{
    rects.into_iter().reduce(|acc, rect| acc.union(&rect))
}

/// Point on the quadratic bezier `start`–`control`–`end` at parameter `t`.
pub fn quadratic_point(start: Vec2, control: Vec2, end: Vec2, t: f32) -> Vec2 {
    let mt = 1.0 - t;
    start * (mt * mt) + control * (2.0 * mt * t) + end * (t * t)
}

/// Minimum distance from `point` to a polyline through `points`.
pub fn polyline_distance(point: Vec2, points: &[Vec2]) -> f32 {
    match points {
        [] => f32::INFINITY,
        [only] => point.distance(*only),
        _ => points
            .windows(2)
            .map(|pair| segment_distance(point, pair[0], pair[1]))
            .fold(f32::INFINITY, f32::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edge_point_axis_aligned() {
        let center = Vec2::new(0.0, 0.0);
        let right = rect_edge_point(center, Vec2::new(500.0, 0.0), 100.0, 40.0, 0.0);
        assert_eq!(right, Vec2::new(50.0, 0.0));

        let below = rect_edge_point(center, Vec2::new(0.0, 300.0), 100.0, 40.0, 5.0);
        assert_eq!(below, Vec2::new(0.0, 25.0));
    }

    #[test]
    fn test_rect_edge_point_corner_direction() {
        // A 45° ray through a wide rectangle exits on the top/bottom side.
        let p = rect_edge_point(Vec2::ZERO, Vec2::new(100.0, 100.0), 100.0, 40.0, 0.0);
        assert!((p.y - 20.0).abs() < 1e-4);
        assert!((p.x - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_rect_edge_point_degenerate_returns_center() {
        let center = Vec2::new(12.0, -7.0);
        assert_eq!(rect_edge_point(center, center, 80.0, 40.0, 4.0), center);
    }

    #[test]
    fn test_segment_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert_eq!(segment_distance(Vec2::new(5.0, 3.0), a, b), 3.0);
        assert_eq!(segment_distance(Vec2::new(-4.0, 3.0), a, b), 5.0);
        assert_eq!(segment_distance(Vec2::new(1.0, 1.0), a, a), 2.0_f32.sqrt());
    }

    #[test]
    fn test_bounding_box() {
        assert!(bounding_box(Vec::new()).is_none());
        let bbox = bounding_box([
            Rect::from_center_size(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)),
            Rect::from_center_size(Vec2::new(100.0, 50.0), Vec2::new(20.0, 20.0)),
        ])
        .unwrap();
        assert_eq!(bbox.min, Vec2::new(-5.0, -5.0));
        assert_eq!(bbox.max, Vec2::new(110.0, 60.0));
    }

    #[test]
    fn test_quadratic_point_endpoints() {
        let s = Vec2::new(0.0, 0.0);
        let c = Vec2::new(5.0, 10.0);
        let e = Vec2::new(10.0, 0.0);
        assert_eq!(quadratic_point(s, c, e, 0.0), s);
        assert_eq!(quadratic_point(s, c, e, 1.0), e);
        assert_eq!(quadratic_point(s, c, e, 0.5), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_polyline_distance() {
        let points = [Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0)];
        assert_eq!(polyline_distance(Vec2::new(12.0, 5.0), &points), 2.0);
        assert!(polyline_distance(Vec2::ZERO, &[]).is_infinite());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn on_padded_border(p: Vec2, center: Vec2, w: f32, h: f32, padding: f32) -> bool {
        let half_w = w * 0.5 + padding;
        let half_h = h * 0.5 + padding;
        let dx = (p.x - center.x).abs();
        let dy = (p.y - center.y).abs();
        let eps = 1e-2;
        ((dx - half_w).abs() < eps && dy <= half_h + eps)
            || ((dy - half_h).abs() < eps && dx <= half_w + eps)
    }

    proptest! {
        #[test]
        fn prop_rect_edge_point_lies_on_border(
            cx in -500.0f32..500.0,
            cy in -500.0f32..500.0,
            w in 10.0f32..300.0,
            h in 10.0f32..300.0,
            padding in 0.0f32..20.0,
            tx in -1000.0f32..1000.0,
            ty in -1000.0f32..1000.0,
        ) {
            let center = Vec2::new(cx, cy);
            let target = Vec2::new(tx, ty);
            prop_assume!(center.distance(target) > 0.01);

            let p = rect_edge_point(center, target, w, h, padding);
            prop_assert!(on_padded_border(p, center, w, h, padding), "{:?} not on border", p);

            // The exit point lies on the ray toward the target.
            let along = (p - center).dot(target - center);
            prop_assert!(along >= 0.0);
        }

        #[test]
        fn prop_segment_distance_bounded_by_endpoints(
            px in -100.0f32..100.0, py in -100.0f32..100.0,
            ax in -100.0f32..100.0, ay in -100.0f32..100.0,
            bx in -100.0f32..100.0, by in -100.0f32..100.0,
        ) {
            let p = Vec2::new(px, py);
            let a = Vec2::new(ax, ay);
            let b = Vec2::new(bx, by);
            let d = segment_distance(p, a, b);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= p.distance(a) + 1e-3);
            prop_assert!(d <= p.distance(b) + 1e-3);
            prop_assert!((d - segment_distance(p, b, a)).abs() < 1e-3);
        }

        #[test]
        fn prop_bounding_box_contains_all(
            rects in proptest::collection::vec(
                (-500.0f32..500.0, -500.0f32..500.0, 1.0f32..200.0, 1.0f32..200.0), 1..20)
        ) {
            let rects: Vec<Rect> = rects
                .into_iter()
                .map(|(x, y, w, h)| Rect::from_center_size(Vec2::new(x, y), Vec2::new(w, h)))
                .collect();
            let bbox = bounding_box(rects.iter().copied()).unwrap();
            for rect in &rects {
                prop_assert!(bbox.contains_rect(rect));
                prop_assert!(rects_intersect(&bbox, rect));
                prop_assert!(point_in_rect(rect.center(), &bbox));
            }
        }
    }
}
