use std::hash::{Hash, Hasher};

use eyre::{eyre, Result};
use rust_dense_bitset::{BitSet, DenseBitSet};

// Set of copper layer indices, backed by a u64 bitset. z = 0 is the top
// layer, z = layer_count - 1 the bottom.
#[must_use]
#[derive(Debug, Copy, Clone)]
pub struct LayerSet {
    bits: DenseBitSet,
}

impl LayerSet {
    pub fn empty() -> Self {
        Self { bits: DenseBitSet::from_integer(0) }
    }

    pub fn all(layer_count: usize) -> Self {
        let mut s = Self::empty();
        for z in 0..layer_count {
            s.insert(z);
        }
        s
    }

    pub fn single(z: usize) -> Self {
        let mut s = Self::empty();
        s.insert(z);
        s
    }

    pub fn from_zs(zs: &[usize]) -> Self {
        let mut s = Self::empty();
        for &z in zs {
            s.insert(z);
        }
        s
    }

    pub fn insert(&mut self, z: usize) {
        self.bits.set_bit(z, true);
    }

    pub fn remove(&mut self, z: usize) {
        self.bits.set_bit(z, false);
    }

    #[must_use]
    pub fn contains(&self, z: usize) -> bool {
        z < 64 && self.bits.get_bit(z)
    }

    #[must_use]
    pub fn intersects(&self, o: &LayerSet) -> bool {
        self.bits.to_integer() & o.bits.to_integer() != 0
    }

    pub fn intersection(&self, o: &LayerSet) -> LayerSet {
        Self { bits: DenseBitSet::from_integer(self.bits.to_integer() & o.bits.to_integer()) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.to_integer() == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.get_weight() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..64).filter(|&z| self.contains(z))
    }
}

impl Default for LayerSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for LayerSet {
    fn eq(&self, o: &Self) -> bool {
        self.bits.to_integer() == o.bits.to_integer()
    }
}

impl Eq for LayerSet {}

impl Hash for LayerSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.to_integer().hash(state);
    }
}

// Fixed bijection between layer names and z indices for a given layer count.
pub fn layer_name_to_z(name: &str, layer_count: usize) -> Result<usize> {
    match name {
        "top" => Ok(0),
        "bottom" => Ok(layer_count.saturating_sub(1)),
        _ => {
            let n: usize = name
                .strip_prefix("inner")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| eyre!("unknown layer name {}", name))?;
            if n == 0 || n + 1 >= layer_count {
                Err(eyre!("layer {} does not exist with {} layers", name, layer_count))
            } else {
                Ok(n)
            }
        }
    }
}

#[must_use]
pub fn z_to_layer_name(z: usize, layer_count: usize) -> String {
    if z == 0 {
        "top".to_string()
    } else if z + 1 == layer_count {
        "bottom".to_string()
    } else {
        format!("inner{z}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_bijection() {
        assert_eq!(layer_name_to_z("top", 2).unwrap(), 0);
        assert_eq!(layer_name_to_z("bottom", 2).unwrap(), 1);
        assert_eq!(layer_name_to_z("inner1", 4).unwrap(), 1);
        assert_eq!(z_to_layer_name(0, 2), "top");
        assert_eq!(z_to_layer_name(1, 2), "bottom");
        assert_eq!(z_to_layer_name(2, 4), "inner2");
        assert!(layer_name_to_z("inner3", 4).is_err());
        assert!(layer_name_to_z("copper", 2).is_err());
    }

    #[test]
    fn test_layer_set() {
        let a = LayerSet::from_zs(&[0, 2]);
        let b = LayerSet::single(2);
        assert!(a.intersects(&b));
        assert_eq!(a.intersection(&b), b);
        assert_eq!(a.len(), 2);
        assert!(!a.contains(1));
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 2]);
    }
}
