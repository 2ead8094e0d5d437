use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::model::primitive::rect::Rt;

#[must_use]
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, Display, Serialize, Deserialize)]
#[display(fmt = "({:.3}, {:.3})", x, y)]
pub struct Pt {
    pub x: f64,
    pub y: f64,
}

impl Pt {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[must_use]
    pub fn dist(&self, p: Pt) -> f64 {
        (*self - p).mag()
    }

    #[must_use]
    pub fn mag(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[must_use]
    pub fn cross(&self, p: Pt) -> f64 {
        self.x * p.y - self.y * p.x
    }

    #[must_use]
    pub fn dot(&self, p: Pt) -> f64 {
        self.x * p.x + self.y * p.y
    }

    // Unit vector, or zero if degenerate.
    pub fn norm(&self) -> Pt {
        let m = self.mag();
        if m == 0.0 { Pt::zero() } else { Pt::new(self.x / m, self.y / m) }
    }

    // Perpendicular (rotated 90 degrees counter-clockwise).
    pub fn perp(&self) -> Pt {
        Pt::new(-self.y, self.x)
    }

    // Projects the point onto the boundary or interior of |r|.
    pub fn clamp(&self, r: &Rt) -> Pt {
        Pt::new(self.x.clamp(r.l(), r.r()), self.y.clamp(r.b(), r.t()))
    }
}

auto_ops::impl_op_ex!(+ |a: &Pt, b: &Pt| -> Pt { Pt::new(a.x + b.x, a.y + b.y) });
auto_ops::impl_op_ex!(-|a: &Pt, b: &Pt| -> Pt { Pt::new(a.x - b.x, a.y - b.y) });
auto_ops::impl_op_ex!(*|a: &Pt, b: &f64| -> Pt { Pt::new(a.x * b, a.y * b) });
auto_ops::impl_op_ex!(/ |a: &Pt, b: &f64| -> Pt { Pt::new(a.x / b, a.y / b) });
auto_ops::impl_op_ex!(-|a: &Pt| -> Pt { Pt::new(-a.x, -a.y) });

// A point with a layer index. z = 0 is the top copper layer.
#[must_use]
#[derive(Debug, Default, Copy, Clone, PartialEq, PartialOrd, Display, Serialize, Deserialize)]
#[display(fmt = "({:.3}, {:.3}, z{})", x, y, z)]
pub struct Pt3 {
    pub x: f64,
    pub y: f64,
    pub z: usize,
}

impl Pt3 {
    pub const fn new(x: f64, y: f64, z: usize) -> Self {
        Self { x, y, z }
    }

    pub fn pt(&self) -> Pt {
        Pt::new(self.x, self.y)
    }

    #[must_use]
    pub fn dist_xy(&self, p: Pt3) -> f64 {
        self.pt().dist(p.pt())
    }
}

