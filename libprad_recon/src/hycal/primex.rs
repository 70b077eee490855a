use fxhash::FxHashMap;
use ndarray::Array2;
use std::sync::Arc;

use super::grid_island::{island, GridIslandParams, RawCluster};
use super::grouping::{groups_touch, UnionFind};
use super::layout::{sector_shape, sector_type};
use super::method::FormClusters;
use super::module::{set_flag, HitFlag, ModuleCluster, ModuleHit};
use super::profile::ClusterProfile;
use crate::recon_config::HyCalSettings;

/// Sector grid clustering with cross-sector glue.
///
/// The hits of each sector are painted onto that sector's row/column grid and handed to
/// the grid island finder. The resulting clusters are mapped back onto module hits, and
/// clusters of different sectors are glued together when any of their modules touch.
#[derive(Debug, Clone)]
pub struct PrimexCluster {
    params: GridIslandParams,
    corner_connection: bool,
    profile: Arc<ClusterProfile>,
}

impl PrimexCluster {
    pub fn new(settings: &HyCalSettings, profile: Arc<ClusterProfile>) -> Self {
        Self {
            params: GridIslandParams {
                min_cell_energy: settings.min_module_energy,
                min_center_energy: settings.min_center_energy,
                corner_connection: settings.corner_connection,
                split_iter: settings.split_iter,
                least_split: settings.least_split,
            },
            corner_connection: settings.corner_connection,
            profile,
        }
    }

    fn sector_clusters(&self, sector: usize, hits: &[ModuleHit]) -> Vec<ModuleCluster> {
        let (rows, columns) = sector_shape(sector);
        let mut grid = Array2::<f32>::zeros((rows, columns));
        let mut cells: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        for (idx, hit) in hits.iter().enumerate() {
            let cell = (hit.layout.row, hit.layout.column);
            if cell.0 >= rows || cell.1 >= columns {
                spdlog::warn!(
                    "HyCal module {} lies outside of sector {} grid, skipping it",
                    hit.id,
                    sector
                );
                continue;
            }
            grid[cell] += hit.energy;
            cells.insert(cell, idx);
        }

        let kind = sector_type(sector);
        island(grid.view(), &self.params, |dx, dy| self.profile.get(kind, dx, dy))
            .into_iter()
            .map(|raw| to_module_cluster(&raw, hits, &cells))
            .filter(|cluster| !cluster.is_empty())
            .collect()
    }
}

fn to_module_cluster(
    raw: &RawCluster,
    hits: &[ModuleHit],
    cells: &FxHashMap<(usize, usize), usize>,
) -> ModuleCluster {
    let mut cluster = ModuleCluster::default();
    // peak first so it stays the center on equal energies
    let peak = raw.cells.iter().find(|c| (c.0, c.1) == raw.peak);
    let rest = raw.cells.iter().filter(|c| (c.0, c.1) != raw.peak);
    for &(row, column, energy) in peak.into_iter().chain(rest) {
        if let Some(idx) = cells.get(&(row, column)) {
            cluster.add_hit(ModuleHit {
                energy,
                ..hits[*idx]
            });
        }
    }
    if raw.split {
        set_flag(&mut cluster.flag, HitFlag::Split);
    }
    cluster
}

impl FormClusters for PrimexCluster {
    fn form_clusters(&self, hits: &[ModuleHit], clusters: &mut Vec<ModuleCluster>) {
        clusters.clear();

        let n_sectors = hits.iter().map(|h| h.layout.sector + 1).max().unwrap_or(0);
        let mut by_sector: Vec<Vec<ModuleHit>> = vec![Vec::new(); n_sectors];
        for hit in hits {
            by_sector[hit.layout.sector].push(*hit);
        }

        let mut found: Vec<(usize, ModuleCluster)> = Vec::new();
        for (sector, sector_hits) in by_sector.iter().enumerate() {
            if sector_hits.is_empty() {
                continue;
            }
            for cluster in self.sector_clusters(sector, sector_hits) {
                found.push((sector, cluster));
            }
        }

        let mut uf = UnionFind::new(found.len());
        for i in 0..found.len() {
            for j in (i + 1)..found.len() {
                if found[i].0 != found[j].0
                    && groups_touch(&found[i].1.hits, &found[j].1.hits, self.corner_connection)
                {
                    uf.union(i, j);
                }
            }
        }

        let mut slots: Vec<Option<ModuleCluster>> =
            found.into_iter().map(|(_, cluster)| Some(cluster)).collect();
        for members in uf.groups() {
            let mut glued = ModuleCluster::default();
            for idx in members {
                if let Some(cluster) = slots[idx].take() {
                    glued.merge(cluster);
                }
            }
            clusters.push(glued);
        }
    }
}
