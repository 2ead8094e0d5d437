use std::cmp::Ordering;

use approx::{relative_eq, relative_ne};

use crate::model::primitive::point::Pt;

pub const EP: f64 = 1e-6;

#[must_use]
pub fn f64_eq(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = EP)
}

#[must_use]
pub fn f64_ne(a: f64, b: f64) -> bool {
    relative_ne!(a, b, epsilon = EP)
}

#[must_use]
pub fn f64_gt(a: f64, b: f64) -> bool {
    f64_ne(a, b) && a > b
}

#[must_use]
pub fn f64_ge(a: f64, b: f64) -> bool {
    f64_eq(a, b) || a > b
}

#[must_use]
pub fn f64_lt(a: f64, b: f64) -> bool {
    f64_ne(a, b) && a < b
}

#[must_use]
pub fn f64_le(a: f64, b: f64) -> bool {
    f64_eq(a, b) || a < b
}

#[must_use]
pub fn f64_cmp(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[must_use]
pub fn pt_eq(a: Pt, b: Pt) -> bool {
    f64_eq(a.x, b.x) && f64_eq(a.y, b.y)
}

// Return cross-product of OA and OB.
#[must_use]
pub fn cross_at(o: Pt, a: Pt, b: Pt) -> f64 {
    (a - o).cross(b - o)
}

// -1, 0 or 1 depending on which side of the line ST EN the point |p| is on.
#[must_use]
pub fn orientation(st: Pt, en: Pt, p: Pt) -> i8 {
    let c = cross_at(st, en, p);
    if f64_eq(c, 0.0) {
        0
    } else if c > 0.0 {
        1
    } else {
        -1
    }
}

#[must_use]
pub fn is_collinear(a: Pt, b: Pt, c: Pt) -> bool {
    orientation(a, b, c) == 0
}
