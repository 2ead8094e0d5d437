use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::geom::math::{f64_eq, f64_ge, f64_gt};
use crate::model::primitive::point::Pt;
use crate::model::primitive::segment::Segment;
use crate::model::primitive::seg;

// Axis-aligned rectangle. (x, y) is the bottom-left corner.
#[must_use]
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Rt {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Rt {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn from_center(center: Pt, w: f64, h: f64) -> Self {
        Self::new(center.x - w / 2.0, center.y - h / 2.0, w, h)
    }

    pub fn from_bounds(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn enclosing(a: Pt, b: Pt) -> Self {
        let l = a.x.min(b.x);
        let b_ = a.y.min(b.y);
        Self::new(l, b_, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    #[must_use]
    pub fn l(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn r(&self) -> f64 {
        self.x + self.w
    }

    #[must_use]
    pub fn b(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn t(&self) -> f64 {
        self.y + self.h
    }

    #[must_use]
    pub fn w(&self) -> f64 {
        self.w
    }

    #[must_use]
    pub fn h(&self) -> f64 {
        self.h
    }

    pub fn center(&self) -> Pt {
        Pt::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    #[must_use]
    pub fn shorter_side(&self) -> f64 {
        self.w.min(self.h)
    }

    #[must_use]
    pub fn longer_side(&self) -> f64 {
        self.w.max(self.h)
    }

    #[must_use]
    pub fn contains(&self, p: Pt) -> bool {
        f64_ge(p.x, self.l()) && f64_ge(self.r(), p.x) && f64_ge(p.y, self.b()) && f64_ge(self.t(), p.y)
    }

    #[must_use]
    pub fn contains_rt(&self, r: &Rt) -> bool {
        f64_ge(r.l(), self.l()) && f64_ge(self.r(), r.r()) && f64_ge(r.b(), self.b()) && f64_ge(self.t(), r.t())
    }

    #[must_use]
    pub fn intersects(&self, r: &Rt) -> bool {
        f64_ge(self.r(), r.l()) && f64_ge(r.r(), self.l()) && f64_ge(self.t(), r.b()) && f64_ge(r.t(), self.b())
    }

    // Grow (or shrink, negative |d|) by |d| on every side.
    pub fn expand(&self, d: f64) -> Rt {
        Rt::new(self.x - d, self.y - d, (self.w + 2.0 * d).max(0.0), (self.h + 2.0 * d).max(0.0))
    }

    pub fn union(&self, r: &Rt) -> Rt {
        let l = self.l().min(r.l());
        let b = self.b().min(r.b());
        Rt::new(l, b, self.r().max(r.r()) - l, self.t().max(r.t()) - b)
    }

    // Splits along the longer axis at the midline.
    pub fn split2(&self) -> (Rt, Rt) {
        if self.w >= self.h {
            self.split_x_at(self.x + self.w / 2.0)
        } else {
            self.split_y_at(self.y + self.h / 2.0)
        }
    }

    pub fn split_x_at(&self, x: f64) -> (Rt, Rt) {
        (
            Rt::new(self.x, self.y, x - self.x, self.h),
            Rt::new(x, self.y, self.r() - x, self.h),
        )
    }

    pub fn split_y_at(&self, y: f64) -> (Rt, Rt) {
        (
            Rt::new(self.x, self.y, self.w, y - self.y),
            Rt::new(self.x, y, self.w, self.t() - y),
        )
    }

    pub fn segs(&self) -> [Segment; 4] {
        let (bl, br) = (Pt::new(self.l(), self.b()), Pt::new(self.r(), self.b()));
        let (tl, tr) = (Pt::new(self.l(), self.t()), Pt::new(self.r(), self.t()));
        [seg(bl, br), seg(br, tr), seg(tr, tl), seg(tl, bl)]
    }

    pub fn pts(&self) -> [Pt; 4] {
        [
            Pt::new(self.l(), self.b()),
            Pt::new(self.r(), self.b()),
            Pt::new(self.r(), self.t()),
            Pt::new(self.l(), self.t()),
        ]
    }

    // The face shared with |r|, if it has positive length. Only touching
    // edges count; corner contact is not a face.
    pub fn shared_face(&self, r: &Rt) -> Option<Segment> {
        let (ox0, ox1) = (self.l().max(r.l()), self.r().min(r.r()));
        let (oy0, oy1) = (self.b().max(r.b()), self.t().min(r.t()));
        if f64_eq(self.r(), r.l()) || f64_eq(r.r(), self.l()) {
            let x = if f64_eq(self.r(), r.l()) { self.r() } else { self.l() };
            if f64_gt(oy1, oy0) {
                return Some(seg(Pt::new(x, oy0), Pt::new(x, oy1)));
            }
        }
        if f64_eq(self.t(), r.b()) || f64_eq(r.t(), self.b()) {
            let y = if f64_eq(self.t(), r.b()) { self.t() } else { self.b() };
            if f64_gt(ox1, ox0) {
                return Some(seg(Pt::new(ox0, y), Pt::new(ox1, y)));
            }
        }
        None
    }
}

impl fmt::Display for Rt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3} {:.3}x{:.3}]", self.x, self.y, self.w, self.h)
    }
}
