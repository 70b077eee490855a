use serde::{Deserialize, Serialize};

use crate::constants::{CORNER_ADJACENT, SIDE_ADJACENT};

/// The two calorimeter materials used in HyCal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    #[default]
    PbGlass,
    PbWO4,
}

impl ModuleType {
    /// Index of this type in per-type tables
    pub fn index(&self) -> usize {
        match self {
            Self::PbGlass => 0,
            Self::PbWO4 => 1,
        }
    }
}

/// Flag bits shared by module layouts, clusters and reconstructed hits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitFlag {
    PbGlass = 0,
    PbWO4,
    Transition,
    InnerBound,
    OuterBound,
    DeadNeighbor,
    Split,
    LeakCorr,
    Gem1Match,
    Gem2Match,
    OverlapMatch,
}

impl HitFlag {
    pub fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

pub fn set_flag(flag: &mut u32, bit: HitFlag) {
    *flag |= bit.mask();
}

pub fn test_flag(flag: u32, bit: HitFlag) -> bool {
    flag & bit.mask() != 0
}

/// Physical placement of a module in the HyCal frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub kind: ModuleType,
    pub size_x: f32,
    pub size_y: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Logical placement of a module: which sector, and where inside that sector's grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub flag: u32,
    pub sector: usize,
    pub row: usize,
    pub column: usize,
}

/// One module's measured energy in the current event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModuleHit {
    pub id: i32,
    pub geo: Geometry,
    pub layout: Layout,
    pub energy: f32,
}

impl ModuleHit {
    pub fn new(id: i32, geo: Geometry, layout: Layout, energy: f32) -> Self {
        Self {
            id,
            geo,
            layout,
            energy,
        }
    }
}

/// Distance between two modules along x and y, in units of their mean size
pub fn quantized_dist(a: &Geometry, b: &Geometry) -> (f32, f32) {
    let dx = 2.0 * (b.x - a.x) / (a.size_x + b.size_x);
    let dy = 2.0 * (b.y - a.y) / (a.size_y + b.size_y);
    (dx, dy)
}

/// Normalized distance between two module hits
pub fn hit_distance(a: &ModuleHit, b: &ModuleHit) -> f32 {
    let (dx, dy) = quantized_dist(&a.geo, &b.geo);
    (dx * dx + dy * dy).sqrt()
}

/// Adjacency test used by the grouping algorithms
pub fn is_adjacent(a: &ModuleHit, b: &ModuleHit, corner_connection: bool) -> bool {
    let threshold = if corner_connection {
        CORNER_ADJACENT
    } else {
        SIDE_ADJACENT
    };
    hit_distance(a, b) < threshold
}

/// A group of module hits belonging to one shower candidate.
///
/// `energy` is always the sum of the hit energies, and `center` the most energetic hit
/// added so far (the first one wins a tie).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleCluster {
    pub center: ModuleHit,
    pub hits: Vec<ModuleHit>,
    pub energy: f32,
    pub leakage: f32,
    pub flag: u32,
}

impl ModuleCluster {
    /// Start a cluster from its seed hit
    pub fn new(seed: ModuleHit) -> Self {
        let mut cluster = Self::default();
        cluster.add_hit(seed);
        cluster
    }

    pub fn add_hit(&mut self, hit: ModuleHit) {
        if self.hits.is_empty() || hit.energy > self.center.energy {
            self.center = hit;
        }
        self.energy += hit.energy;
        self.hits.push(hit);
    }

    /// Absorb another cluster, keeping the more energetic center
    pub fn merge(&mut self, other: ModuleCluster) {
        if self.hits.is_empty() || other.center.energy > self.center.energy {
            self.center = other.center;
        }
        self.energy += other.energy;
        self.leakage += other.leakage;
        self.flag |= other.flag;
        self.hits.extend(other.hits);
    }

    pub fn contains(&self, id: i32) -> bool {
        self.hits.iter().any(|h| h.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i32, x: f32, y: f32, energy: f32) -> ModuleHit {
        let geo = Geometry {
            kind: ModuleType::PbWO4,
            size_x: 20.77,
            size_y: 20.77,
            x,
            y,
            z: 0.0,
        };
        ModuleHit::new(id, geo, Layout::default(), energy)
    }

    #[test]
    fn test_cluster_energy_sum() {
        let mut cluster = ModuleCluster::new(hit(1, 0.0, 0.0, 10.0));
        cluster.add_hit(hit(2, 20.77, 0.0, 3.5));
        cluster.add_hit(hit(3, -20.77, 0.0, 42.25));
        let sum: f32 = cluster.hits.iter().map(|h| h.energy).sum();
        assert_eq!(cluster.energy, sum);
        assert_eq!(cluster.center.id, 3);
    }

    #[test]
    fn test_center_tie_keeps_first() {
        let mut cluster = ModuleCluster::new(hit(1, 0.0, 0.0, 10.0));
        cluster.add_hit(hit(2, 20.77, 0.0, 10.0));
        assert_eq!(cluster.center.id, 1);
    }

    #[test]
    fn test_merge() {
        let mut a = ModuleCluster::new(hit(1, 0.0, 0.0, 10.0));
        a.add_hit(hit(2, 20.77, 0.0, 2.0));
        let mut b = ModuleCluster::new(hit(3, 41.54, 0.0, 30.0));
        b.leakage = 1.5;
        a.merge(b);
        let sum: f32 = a.hits.iter().map(|h| h.energy).sum();
        assert_eq!(a.energy, sum);
        assert_eq!(a.center.id, 3);
        assert_eq!(a.hits.len(), 3);
        assert_eq!(a.leakage, 1.5);
        assert!(a.contains(2));
    }

    #[test]
    fn test_adjacency() {
        let center = hit(1, 0.0, 0.0, 1.0);
        let side = hit(2, 20.77, 0.0, 1.0);
        let corner = hit(3, 20.77, 20.77, 1.0);
        let far = hit(4, 41.54, 0.0, 1.0);
        assert!(is_adjacent(&center, &side, false));
        assert!(!is_adjacent(&center, &corner, false));
        assert!(is_adjacent(&center, &corner, true));
        assert!(!is_adjacent(&center, &far, true));
    }

    #[test]
    fn test_flags() {
        let mut flag = 0;
        set_flag(&mut flag, HitFlag::Transition);
        assert!(test_flag(flag, HitFlag::Transition));
        assert!(!test_flag(flag, HitFlag::PbWO4));
    }
}
