use rstar::{RTree, RTreeObject, AABB};

use crate::model::layer::LayerSet;
use crate::model::primitive::point::Pt;
use crate::model::primitive::rect::Rt;

// An axis-aligned entry in the spatial index. |id| is an index into
// whatever collection the index was built over (obstacles, route segments).
#[must_use]
#[derive(Debug, Clone)]
pub struct RectEntry {
    pub rt: Rt,
    pub layers: LayerSet,
    pub id: usize,
}

impl RTreeObject for RectEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.rt.l(), self.rt.b()], [self.rt.r(), self.rt.t()])
    }
}

#[must_use]
#[derive(Debug, Clone)]
pub struct RectIndex {
    tree: RTree<RectEntry>,
}

impl RectIndex {
    pub fn new(entries: Vec<RectEntry>) -> Self {
        Self { tree: RTree::bulk_load(entries) }
    }

    pub fn intersecting<'a>(&'a self, r: &Rt) -> impl Iterator<Item = &'a RectEntry> {
        let aabb = AABB::from_corners([r.l(), r.b()], [r.r(), r.t()]);
        self.tree.locate_in_envelope_intersecting(&aabb)
    }

    // Entries whose envelope comes within |d| of |p|. Callers still need an
    // exact distance test against the entry geometry.
    pub fn near<'a>(&'a self, p: Pt, d: f64) -> impl Iterator<Item = &'a RectEntry> {
        self.intersecting(&Rt::from_center(p, 2.0 * d, 2.0 * d))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitive::{pt, rt};

    #[test]
    fn test_intersecting() {
        let idx = RectIndex::new(vec![
            RectEntry { rt: rt(0.0, 0.0, 1.0, 1.0), layers: LayerSet::single(0), id: 0 },
            RectEntry { rt: rt(5.0, 5.0, 1.0, 1.0), layers: LayerSet::single(0), id: 1 },
        ]);
        let hits: Vec<_> = idx.intersecting(&rt(0.5, 0.5, 1.0, 1.0)).map(|e| e.id).collect();
        assert_eq!(hits, vec![0]);
        assert_eq!(idx.near(pt(5.5, 4.5), 1.0).count(), 1);
    }
}
