use crate::model::geom::distance::{pt_rt_dist, pt_seg_dist, rt_seg_dist};
use crate::model::geom::math::{f64_le, orientation, EP};
use crate::model::primitive::circle::Circle;
use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;
use crate::model::primitive::seg;
use crate::model::primitive::segment::Segment;

#[must_use]
pub fn seg_intersects_seg(a: &Segment, b: &Segment) -> bool {
    // Check if the segment endpoints are on opposite sides of the other segment.
    let a_st = orientation(b.st(), b.en(), a.st());
    let a_en = orientation(b.st(), b.en(), a.en());
    let b_st = orientation(a.st(), a.en(), b.st());
    let b_en = orientation(a.st(), a.en(), b.en());
    // No collinear points. Everything on different sides.
    if a_st != a_en && b_st != b_en {
        return true;
    }
    // Check collinear cases. Need to check both x and y coordinates to handle
    // vertical and horizontal segments.
    let a_rt = Rt::enclosing(a.st(), a.en());
    let b_rt = Rt::enclosing(b.st(), b.en());
    if a_st == 0 && b_rt.contains(a.st()) {
        return true;
    }
    if a_en == 0 && b_rt.contains(a.en()) {
        return true;
    }
    if b_st == 0 && a_rt.contains(b.st()) {
        return true;
    }
    if b_en == 0 && a_rt.contains(b.en()) {
        return true;
    }
    false
}

#[must_use]
pub fn rt_intersects_rt(a: &Rt, b: &Rt) -> bool {
    a.intersects(b)
}

#[must_use]
pub fn seg_intersects_rt(a: &Segment, b: &Rt) -> bool {
    if b.contains(a.st()) || b.contains(a.en()) {
        return true;
    }
    f64_le(rt_seg_dist(b, a), 0.0)
}

#[must_use]
pub fn circ_intersects_rt(a: &Circle, b: &Rt) -> bool {
    b.contains(a.p()) || f64_le(pt_rt_dist(&a.p(), b), a.r())
}

#[must_use]
pub fn circ_intersects_seg(a: &Circle, b: &Segment) -> bool {
    f64_le(pt_seg_dist(&a.p(), b), a.r())
}

// Even-odd ray cast. Points on the boundary count as inside.
#[must_use]
pub fn pt_inside_polygon(p: Pt, poly: &[Pt]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[i], poly[j]);
        if pt_seg_dist(&p, &seg(a, b)) < EP {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitive::{circ, pt, rt, seg};

    const SEG_SEG_TESTS: &[(Segment, Segment, bool)] = &[
        // Crossing
        (seg(pt(1.0, 1.0), pt(3.0, 4.0)), seg(pt(2.0, 4.0), pt(3.0, 1.0)), true),
        // Shared endpoints, not parallel
        (seg(pt(1.0, 1.0), pt(2.0, 3.0)), seg(pt(2.0, 3.0), pt(4.0, 1.0)), true),
        // Shared endpoints, parallel, one point of intersection
        (seg(pt(1.0, 1.0), pt(3.0, 2.0)), seg(pt(3.0, 2.0), pt(5.0, 3.0)), true),
        // Endpoint abutting segment, perpendicular
        (seg(pt(1.0, 1.0), pt(3.0, 3.0)), seg(pt(2.0, 4.0), pt(4.0, 2.0)), true),
        // Same segments
        (seg(pt(1.0, 1.0), pt(1.0, 1.0)), seg(pt(1.0, 1.0), pt(1.0, 1.0)), true),
        // Parallel and overlapping
        (seg(pt(1.0, 1.0), pt(3.0, 1.0)), seg(pt(2.0, 1.0), pt(4.0, 1.0)), true),
        // Parallel and contained
        (seg(pt(1.0, 1.0), pt(4.0, 1.0)), seg(pt(2.0, 1.0), pt(3.0, 1.0)), true),
        // Parallel segments with one shared endpoint overlapping
        (seg(pt(1.0, 1.0), pt(3.0, 1.0)), seg(pt(1.0, 1.0), pt(4.0, 1.0)), true),
        // Degenerate: One segment is a point, on the other segment.
        (seg(pt(1.0, 1.0), pt(3.0, 1.0)), seg(pt(2.0, 1.0), pt(2.0, 1.0)), true),
        // Degenerate: One segment is a point, on the other segment's endpoint
        (seg(pt(1.0, 1.0), pt(3.0, 1.0)), seg(pt(3.0, 1.0), pt(3.0, 1.0)), true),
        // Parallel, not intersecting
        (seg(pt(1.0, 3.0), pt(3.0, 1.0)), seg(pt(2.0, 4.0), pt(4.0, 2.0)), false),
        // Perpendicular, not intersecting, projection of endpoint onto other is
        // an endpoint
        (seg(pt(1.0, 1.0), pt(3.0, 3.0)), seg(pt(4.0, 2.0), pt(5.0, 1.0)), false),
        // Perpendicular, not intersecting
        (seg(pt(1.0, 1.0), pt(3.0, 3.0)), seg(pt(3.0, 1.0), pt(4.0, 0.0)), false),
        // Degenerate: Both are points, not intersecting
        (seg(pt(1.0, 1.0), pt(1.0, 1.0)), seg(pt(2.0, 1.0), pt(2.0, 1.0)), false),
        // Degenerate: One is a point, collinear with the other segment, not intersecting.
        (seg(pt(1.0, 1.0), pt(3.0, 3.0)), seg(pt(4.0, 4.0), pt(4.0, 4.0)), false),
        // Degenerate: One is a point, not intersecting.
        (seg(pt(1.0, 1.0), pt(3.0, 3.0)), seg(pt(1.0, 2.0), pt(1.0, 2.0)), false),
    ];

    fn test_seg_seg_permutations(a: &Segment, b: &Segment, res: bool) {
        // Try each permutation of orderings
        assert_eq!(seg_intersects_seg(a, b), res, "{} {} intersects? {}", a, b, res);
        assert_eq!(seg_intersects_seg(b, a), res, "{} {} intersects? {}", a, b, res);
        let a = seg(a.en(), a.st());
        let b = seg(b.en(), b.st());
        assert_eq!(seg_intersects_seg(&a, &b), res, "{} {} intersects? {}", a, b, res);
        assert_eq!(seg_intersects_seg(&b, &a), res, "{} {} intersects? {}", a, b, res);
    }

    #[test]
    fn test_seg_seg() {
        for (a, b, res) in SEG_SEG_TESTS {
            test_seg_seg_permutations(a, b, *res);
            // Negating pts should not change result.
            let a = &seg(-a.st(), -a.en());
            let b = &seg(-b.st(), -b.en());
            test_seg_seg_permutations(a, b, *res);
        }
    }

    #[test]
    fn test_circ_rt() {
        assert!(circ_intersects_rt(&circ(pt(0.0, 0.0), 1.0), &rt(0.5, -0.5, 1.0, 1.0)));
        assert!(!circ_intersects_rt(&circ(pt(0.0, 0.0), 1.0), &rt(2.0, 2.0, 1.0, 1.0)));
        // Circle centre inside the rect.
        assert!(circ_intersects_rt(&circ(pt(0.5, 0.5), 0.1), &rt(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_pt_inside_polygon() {
        let square = [pt(0.0, 0.0), pt(4.0, 0.0), pt(4.0, 4.0), pt(0.0, 4.0)];
        assert!(pt_inside_polygon(pt(2.0, 2.0), &square));
        assert!(pt_inside_polygon(pt(0.0, 2.0), &square));
        assert!(!pt_inside_polygon(pt(5.0, 2.0), &square));
        assert!(!pt_inside_polygon(pt(-1.0, -1.0), &square));
    }

    #[test]
    fn test_seg_rt() {
        let r = rt(0.0, 0.0, 2.0, 2.0);
        assert!(seg_intersects_rt(&seg(pt(1.0, 1.0), pt(5.0, 5.0)), &r));
        assert!(seg_intersects_rt(&seg(pt(-1.0, 1.0), pt(3.0, 1.0)), &r));
        assert!(!seg_intersects_rt(&seg(pt(3.0, 0.0), pt(3.0, 2.0)), &r));
    }
}
