use bit_set::BitSet;

use super::method::FormClusters;
use super::module::{hit_distance, quantized_dist, ModuleCluster, ModuleHit};
use crate::constants::CORNER_ADJACENT;
use crate::recon_config::HyCalSettings;

/// Fixed window clustering.
///
/// Every local maximum above the center threshold claims a square of `square_size`
/// modules around it. A maximum that falls inside an already claimed square either
/// takes over that square (if it is more energetic than the current seed) or is dropped.
/// Hits are then given to the closest seed whose square contains them.
///
/// The square is centered on its seed, so an even size is rounded up to the next odd one.
#[derive(Debug, Clone)]
pub struct SquareCluster {
    min_module_energy: f32,
    min_center_energy: f32,
    square_size: usize,
}

impl SquareCluster {
    pub fn new(settings: &HyCalSettings) -> Self {
        let square_size = settings.square_size.max(1) | 1;
        if square_size != settings.square_size {
            spdlog::warn!(
                "Square Size {} is not a positive odd number, using {}",
                settings.square_size,
                square_size
            );
        }
        Self {
            min_module_energy: settings.min_module_energy,
            min_center_energy: settings.min_center_energy,
            square_size,
        }
    }

    pub fn square_size(&self) -> usize {
        self.square_size
    }

    fn in_square(&self, seed: &ModuleHit, hit: &ModuleHit) -> bool {
        let (dx, dy) = quantized_dist(&seed.geo, &hit.geo);
        let half = self.square_size as f32 / 2.0;
        dx.abs() < half && dy.abs() < half
    }

    fn is_local_max(hit: &ModuleHit, hits: &[ModuleHit]) -> bool {
        hits.iter().all(|other| {
            other.id == hit.id
                || other.energy <= hit.energy
                || hit_distance(hit, other) >= CORNER_ADJACENT
        })
    }
}

impl FormClusters for SquareCluster {
    fn form_clusters(&self, hits: &[ModuleHit], clusters: &mut Vec<ModuleCluster>) {
        clusters.clear();
        let hits: Vec<ModuleHit> = hits
            .iter()
            .filter(|h| h.energy >= self.min_module_energy)
            .copied()
            .collect();

        // index into `hits` of each seed
        let mut seeds: Vec<usize> = Vec::new();
        for (idx, hit) in hits.iter().enumerate() {
            if hit.energy < self.min_center_energy || !Self::is_local_max(hit, &hits) {
                continue;
            }
            match seeds.iter().position(|s| self.in_square(&hits[*s], hit)) {
                Some(pos) => {
                    if hit.energy > hits[seeds[pos]].energy {
                        seeds[pos] = idx;
                    }
                }
                None => seeds.push(idx),
            }
        }

        if seeds.is_empty() {
            return;
        }

        let mut claimed = BitSet::with_capacity(hits.len());
        for seed in seeds.iter() {
            clusters.push(ModuleCluster::new(hits[*seed]));
            claimed.insert(*seed);
        }

        for (idx, hit) in hits.iter().enumerate() {
            if claimed.contains(idx) {
                continue;
            }
            let owner = seeds
                .iter()
                .enumerate()
                .filter(|(_, s)| self.in_square(&hits[**s], hit))
                .min_by(|(_, a), (_, b)| {
                    hit_distance(&hits[**a], hit).total_cmp(&hit_distance(&hits[**b], hit))
                })
                .map(|(pos, _)| pos);
            if let Some(pos) = owner {
                clusters[pos].add_hit(*hit);
                claimed.insert(idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CRYSTAL_SIZE;
    use crate::hycal::module::{Geometry, Layout, ModuleType};

    fn crystal(id: i32, col: i32, row: i32, energy: f32) -> ModuleHit {
        let geo = Geometry {
            kind: ModuleType::PbWO4,
            size_x: CRYSTAL_SIZE,
            size_y: CRYSTAL_SIZE,
            x: col as f32 * CRYSTAL_SIZE,
            y: row as f32 * CRYSTAL_SIZE,
            z: 0.0,
        };
        ModuleHit::new(id, geo, Layout::default(), energy)
    }

    fn method(square_size: usize) -> SquareCluster {
        SquareCluster::new(&HyCalSettings {
            square_size,
            ..Default::default()
        })
    }

    #[test]
    fn test_higher_seed_takes_over_window() {
        let hits = vec![
            crystal(1, 0, 0, 100.0),
            crystal(2, 1, 0, 20.0),
            crystal(3, 2, 0, 300.0),
        ];
        let mut clusters = Vec::new();
        method(5).form_clusters(&hits, &mut clusters);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].center.id, 3);
        assert_eq!(clusters[0].hits.len(), 3);
        assert_eq!(clusters[0].energy, 420.0);
    }

    #[test]
    fn test_lower_seed_is_dropped() {
        let hits = vec![
            crystal(1, 0, 0, 300.0),
            crystal(2, 1, 0, 20.0),
            crystal(3, 2, 0, 50.0),
        ];
        let mut clusters = Vec::new();
        method(5).form_clusters(&hits, &mut clusters);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].center.id, 1);
        assert_eq!(clusters[0].hits.len(), 3);
    }

    #[test]
    fn test_separate_windows_and_outside_hits() {
        let hits = vec![
            crystal(1, 0, 0, 300.0),
            crystal(2, 1, 0, 20.0),
            crystal(3, 5, 0, 200.0),
            crystal(4, 3, 0, 5.0),
            crystal(5, 0, 9, 5.0),
        ];
        let mut clusters = Vec::new();
        method(5).form_clusters(&hits, &mut clusters);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].hits.len(), 2);
        // hit 4 sits in the second window (two columns from its seed)
        assert!(clusters[1].contains(4));
        // hit 5 is outside every window and belongs to no cluster
        assert!(clusters.iter().all(|c| !c.contains(5)));
    }

    #[test]
    fn test_even_size_rounds_up() {
        assert_eq!(method(4).square_size(), 5);
        assert_eq!(method(0).square_size(), 1);
        assert_eq!(method(3).square_size(), 3);
        // two columns away is inside a 5 x 5 square
        let hits = vec![crystal(1, 0, 0, 300.0), crystal(2, 2, 0, 5.0)];
        let mut clusters = Vec::new();
        method(4).form_clusters(&hits, &mut clusters);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].contains(2));
    }

    #[test]
    fn test_no_seed_above_threshold() {
        let hits = vec![crystal(1, 0, 0, 5.0), crystal(2, 1, 0, 3.0)];
        let mut clusters = vec![ModuleCluster::new(crystal(9, 9, 9, 1.0))];
        method(5).form_clusters(&hits, &mut clusters);
        assert!(clusters.is_empty());
    }
}
