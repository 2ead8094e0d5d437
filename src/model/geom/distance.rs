use crate::model::geom::intersects::seg_intersects_seg;
use crate::model::geom::math::f64_cmp;
use crate::model::primitive::circle::Circle;
use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;
use crate::model::primitive::segment::Segment;

// Distance functions return 0 if there is intersection or containment.

#[must_use]
pub fn pt_seg_dist(a: &Pt, b: &Segment) -> f64 {
    a.dist(b.project(*a))
}

#[must_use]
pub fn pt_rt_dist(a: &Pt, b: &Rt) -> f64 {
    // Project the point onto the rectangle:
    a.clamp(b).dist(*a)
}

#[must_use]
pub fn seg_seg_dist(a: &Segment, b: &Segment) -> f64 {
    // Closest distance must be between an endpoint and a segment, unless
    // the segments cross, in which case it is zero.
    if seg_intersects_seg(a, b) {
        return 0.0;
    }
    let mut best = pt_seg_dist(&a.st(), b);
    best = best.min(pt_seg_dist(&a.en(), b));
    best = best.min(pt_seg_dist(&b.st(), a));
    best = best.min(pt_seg_dist(&b.en(), a));
    best
}

#[must_use]
pub fn rt_seg_dist(a: &Rt, b: &Segment) -> f64 {
    if a.contains(b.st()) || a.contains(b.en()) {
        return 0.0;
    }
    a.segs().iter().map(|s| seg_seg_dist(s, b)).min_by(f64_cmp).unwrap_or(f64::INFINITY)
}

#[must_use]
pub fn rt_rt_dist(a: &Rt, b: &Rt) -> f64 {
    if a.intersects(b) {
        return 0.0;
    }
    a.pts().iter().map(|p| pt_rt_dist(p, b)).min_by(f64_cmp).unwrap_or(f64::INFINITY)
}

#[must_use]
pub fn circ_seg_dist(a: &Circle, b: &Segment) -> f64 {
    (pt_seg_dist(&a.p(), b) - a.r()).max(0.0)
}

#[must_use]
pub fn circ_rt_dist(a: &Circle, b: &Rt) -> f64 {
    (pt_rt_dist(&a.p(), b) - a.r()).max(0.0)
}
