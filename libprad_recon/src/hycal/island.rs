use std::sync::Arc;

use super::grouping::{groups_touch, UnionFind};
use super::method::FormClusters;
use super::module::{hit_distance, set_flag, HitFlag, ModuleCluster, ModuleHit};
use super::profile::ClusterProfile;
use crate::constants::CORNER_ADJACENT;
use crate::recon_config::HyCalSettings;

// A run of hits in one column of a sector with consecutive rows
#[derive(Debug, Clone)]
struct ColumnChain {
    column: usize,
    first_row: usize,
    last_row: usize,
    hits: Vec<ModuleHit>,
}

/// Island clustering.
///
/// Hits are first grouped inside each sector: consecutive hits of a column form chains,
/// and chains in neighboring columns are merged when they touch. Groups from different
/// sectors are then glued when any of their modules are adjacent. Finally a group with
/// several local maxima is split into one cluster per maximum by sharing the energy of
/// every module according to the expected shower profile of each maximum.
#[derive(Debug, Clone)]
pub struct IslandCluster {
    min_module_energy: f32,
    min_center_energy: f32,
    corner_connection: bool,
    split_iter: usize,
    least_split: f32,
    profile: Arc<ClusterProfile>,
}

impl IslandCluster {
    pub fn new(settings: &HyCalSettings, profile: Arc<ClusterProfile>) -> Self {
        Self {
            min_module_energy: settings.min_module_energy,
            min_center_energy: settings.min_center_energy,
            corner_connection: settings.corner_connection,
            split_iter: settings.split_iter,
            least_split: settings.least_split,
            profile,
        }
    }

    fn chains_touch(&self, a: &ColumnChain, b: &ColumnChain) -> bool {
        if a.column.abs_diff(b.column) != 1 {
            return false;
        }
        if self.corner_connection {
            a.first_row <= b.last_row + 1 && b.first_row <= a.last_row + 1
        } else {
            a.first_row <= b.last_row && b.first_row <= a.last_row
        }
    }

    /// Group the hits of one sector through column chains
    fn group_sector(&self, mut hits: Vec<ModuleHit>) -> Vec<Vec<ModuleHit>> {
        hits.sort_by_key(|h| (h.layout.column, h.layout.row));

        let mut chains: Vec<ColumnChain> = Vec::new();
        for hit in hits {
            if let Some(chain) = chains.last_mut() {
                if chain.column == hit.layout.column && hit.layout.row == chain.last_row + 1 {
                    chain.last_row = hit.layout.row;
                    chain.hits.push(hit);
                    continue;
                }
            }
            chains.push(ColumnChain {
                column: hit.layout.column,
                first_row: hit.layout.row,
                last_row: hit.layout.row,
                hits: vec![hit],
            });
        }

        let mut uf = UnionFind::new(chains.len());
        for i in 0..chains.len() {
            for j in (i + 1)..chains.len() {
                if chains[j].column > chains[i].column + 1 {
                    break;
                }
                if self.chains_touch(&chains[i], &chains[j]) {
                    uf.union(i, j);
                }
            }
        }

        uf.groups()
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .flat_map(|idx| chains[idx].hits.iter().copied())
                    .collect()
            })
            .collect()
    }

    /// Merge sector groups that touch across sector boundaries
    fn glue_sectors(&self, groups: Vec<(usize, Vec<ModuleHit>)>) -> Vec<Vec<ModuleHit>> {
        let mut uf = UnionFind::new(groups.len());
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if groups[i].0 != groups[j].0
                    && groups_touch(&groups[i].1, &groups[j].1, self.corner_connection)
                {
                    uf.union(i, j);
                }
            }
        }
        uf.groups()
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .flat_map(|idx| groups[idx].1.iter().copied())
                    .collect()
            })
            .collect()
    }

    fn local_maxima(&self, group: &[ModuleHit]) -> Vec<usize> {
        (0..group.len())
            .filter(|&i| {
                let hit = &group[i];
                hit.energy >= self.min_center_energy
                    && group.iter().enumerate().all(|(j, other)| {
                        j == i
                            || hit_distance(hit, other) >= CORNER_ADJACENT
                            || other.energy < hit.energy
                            || (other.energy == hit.energy && j > i)
                    })
            })
            .collect()
    }

    /// Share the energy of every hit among the maxima. Returns shares[hit][maximum]
    fn share_energy(&self, group: &[ModuleHit], maxima: &[usize]) -> Vec<Vec<f32>> {
        let mut centers: Vec<(f32, f32, f32)> = maxima
            .iter()
            .map(|&m| (group[m].geo.x, group[m].geo.y, group[m].energy))
            .collect();
        let mut shares = vec![vec![0.0; maxima.len()]; group.len()];

        for _ in 0..self.split_iter.max(1) {
            for (i, hit) in group.iter().enumerate() {
                let weights: Vec<f32> = centers
                    .iter()
                    .map(|(x, y, e)| e * self.profile.fraction_at(&hit.geo, *x, *y))
                    .collect();
                let total: f32 = weights.iter().sum();
                if total > 0.0 {
                    for (k, w) in weights.iter().enumerate() {
                        shares[i][k] = w / total;
                    }
                } else {
                    // outside every profile, give it to the nearest maximum
                    let nearest = maxima
                        .iter()
                        .enumerate()
                        .min_by(|(_, a), (_, b)| {
                            hit_distance(hit, &group[**a])
                                .total_cmp(&hit_distance(hit, &group[**b]))
                        })
                        .map(|(k, _)| k)
                        .unwrap_or(0);
                    shares[i].fill(0.0);
                    shares[i][nearest] = 1.0;
                }
            }

            for (k, &m) in maxima.iter().enumerate() {
                let (mut sx, mut sy, mut se, mut total) = (0.0, 0.0, 0.0, 0.0);
                for (i, hit) in group.iter().enumerate() {
                    let e = hit.energy * shares[i][k];
                    total += e;
                    if hit_distance(&group[m], hit) < CORNER_ADJACENT {
                        sx += e * hit.geo.x;
                        sy += e * hit.geo.y;
                        se += e;
                    }
                }
                if se > 0.0 {
                    centers[k] = (sx / se, sy / se, total);
                } else {
                    centers[k].2 = total;
                }
            }
        }
        shares
    }

    fn split_group(&self, group: Vec<ModuleHit>, clusters: &mut Vec<ModuleCluster>) {
        let maxima = self.local_maxima(&group);
        match maxima.len() {
            0 => (),
            1 => {
                let mut cluster = ModuleCluster::default();
                for hit in group {
                    cluster.add_hit(hit);
                }
                clusters.push(cluster);
            }
            _ => {
                let shares = self.share_energy(&group, &maxima);
                for (k, &m) in maxima.iter().enumerate() {
                    let mut cluster = ModuleCluster::new(ModuleHit {
                        energy: group[m].energy * shares[m][k],
                        ..group[m]
                    });
                    for (i, hit) in group.iter().enumerate() {
                        if i == m || shares[i][k] < self.least_split {
                            continue;
                        }
                        cluster.add_hit(ModuleHit {
                            energy: hit.energy * shares[i][k],
                            ..*hit
                        });
                    }
                    set_flag(&mut cluster.flag, HitFlag::Split);
                    clusters.push(cluster);
                }
            }
        }
    }
}

impl FormClusters for IslandCluster {
    fn form_clusters(&self, hits: &[ModuleHit], clusters: &mut Vec<ModuleCluster>) {
        clusters.clear();

        let n_sectors = hits.iter().map(|h| h.layout.sector + 1).max().unwrap_or(0);
        let mut by_sector: Vec<Vec<ModuleHit>> = vec![Vec::new(); n_sectors];
        for hit in hits.iter().filter(|h| h.energy >= self.min_module_energy) {
            by_sector[hit.layout.sector].push(*hit);
        }

        let mut sector_groups = Vec::new();
        for (sector, sector_hits) in by_sector.into_iter().enumerate() {
            for group in self.group_sector(sector_hits) {
                sector_groups.push((sector, group));
            }
        }

        for group in self.glue_sectors(sector_groups) {
            self.split_group(group, clusters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hycal::detector::HyCalDetector;
    use crate::hycal::module::test_flag;

    fn crystal_id(row: i32, col: i32) -> i32 {
        1001 + row * 34 + col
    }

    fn island(corner_connection: bool) -> IslandCluster {
        let settings = HyCalSettings {
            corner_connection,
            ..Default::default()
        };
        IslandCluster::new(&settings, Arc::new(ClusterProfile::prad()))
    }

    fn hits(hycal: &HyCalDetector, list: &[(i32, i32, f32)]) -> Vec<ModuleHit> {
        list.iter()
            .map(|(row, col, e)| hycal.module(crystal_id(*row, *col)).unwrap().to_hit(*e))
            .collect()
    }

    #[test]
    fn test_corner_connection() {
        let hycal = HyCalDetector::prad();
        let list = hits(&hycal, &[(5, 5, 300.0), (6, 6, 200.0)]);
        let mut clusters = Vec::new();
        island(false).form_clusters(&list, &mut clusters);
        assert_eq!(clusters.len(), 2);

        // with corner connection the two are one group; (6,6) is no longer a maximum
        island(true).form_clusters(&list, &mut clusters);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].center.id, crystal_id(5, 5));
        assert_eq!(clusters[0].energy, 500.0);
    }

    #[test]
    fn test_chain_grouping() {
        let hycal = HyCalDetector::prad();
        // an L shaped island with a single maximum
        let list = hits(
            &hycal,
            &[
                (10, 10, 20.0),
                (11, 10, 400.0),
                (12, 10, 30.0),
                (12, 11, 15.0),
                (12, 12, 8.0),
            ],
        );
        let mut clusters = Vec::new();
        island(false).form_clusters(&list, &mut clusters);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].hits.len(), 5);
        assert_eq!(clusters[0].center.id, crystal_id(11, 10));
    }

    #[test]
    fn test_split_two_maxima() {
        let hycal = HyCalDetector::prad();
        let list = hits(
            &hycal,
            &[
                (10, 10, 500.0),
                (10, 11, 60.0),
                (10, 12, 40.0),
                (10, 13, 300.0),
            ],
        );
        let total: f32 = list.iter().map(|h| h.energy).sum();
        let mut clusters = Vec::new();
        island(false).form_clusters(&list, &mut clusters);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| test_flag(c.flag, HitFlag::Split)));
        assert_eq!(clusters[0].center.id, crystal_id(10, 10));
        assert_eq!(clusters[1].center.id, crystal_id(10, 13));
        let shared: f32 = clusters.iter().map(|c| c.energy).sum();
        assert!(shared <= total + 1e-2);
        assert!(shared > 0.95 * total);
        for cluster in clusters.iter() {
            let sum: f32 = cluster.hits.iter().map(|h| h.energy).sum();
            assert!((cluster.energy - sum).abs() < 1e-3);
        }
    }

    #[test]
    fn test_glue_across_sectors() {
        let hycal = HyCalDetector::prad();
        // top row of crystals, column 20, and the lead glass block right above it
        let crystal = hycal.module(crystal_id(0, 20)).unwrap().clone();
        let glass = hycal
            .modules()
            .iter()
            .filter(|m| m.layout.sector == 1)
            .min_by(|a, b| {
                let da = (a.geo.x - crystal.geo.x).hypot(a.geo.y - crystal.geo.y);
                let db = (b.geo.x - crystal.geo.x).hypot(b.geo.y - crystal.geo.y);
                da.total_cmp(&db)
            })
            .unwrap()
            .clone();
        let list = vec![crystal.to_hit(300.0), glass.to_hit(40.0)];
        let mut clusters = Vec::new();
        island(false).form_clusters(&list, &mut clusters);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].hits.len(), 2);
        assert_eq!(clusters[0].center.id, crystal.id);
    }
}
