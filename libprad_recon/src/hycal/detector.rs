use bitvec::prelude::*;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::cluster::ClusterReconstructor;
use super::hit::HyCalHit;
use super::layout::prad_modules;
use super::method::{ClusterMethod, FormClusters};
use super::module::{hit_distance, Geometry, Layout, ModuleCluster, ModuleHit};
use crate::constants::{CORNER_ADJACENT, MAX_HYCAL_CLUSTERS};
use crate::error::CalibError;

/// Non-linearity calibration of a single module
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibConst {
    pub base_energy: f32,
    pub non_linear: f32,
}

impl CalibConst {
    /// Relative non-linearity at energy `energy` (MeV)
    pub fn alpha(&self, energy: f32) -> f32 {
        self.non_linear * (energy - self.base_energy) / 1000.0
    }
}

/// One entry of a calibration file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleCalib {
    pub id: i32,
    pub base_energy: f32,
    pub non_linear: f32,
}

/// Read a YAML list of module calibrations
pub fn read_calib_file(path: &Path) -> Result<Vec<ModuleCalib>, CalibError> {
    if !path.exists() {
        return Err(CalibError::BadFilePath(path.to_path_buf()));
    }
    let yaml_str = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str::<Vec<ModuleCalib>>(&yaml_str)?)
}

/// Static description of one HyCal module
#[derive(Debug, Clone, PartialEq)]
pub struct HyCalModule {
    pub id: i32,
    pub name: String,
    pub geo: Geometry,
    pub layout: Layout,
    pub calib: CalibConst,
}

impl HyCalModule {
    pub fn to_hit(&self, energy: f32) -> ModuleHit {
        ModuleHit::new(self.id, self.geo, self.layout, energy)
    }
}

/// HyCalDetector owns the module arena and the per-event hit/cluster containers.
///
/// Modules are stored in a flat vector and referenced by index; the module id is mapped
/// to its index through a hash map. All per-event containers are cleared by `clear`, which
/// must be called before each event is filled.
#[derive(Debug, Clone)]
pub struct HyCalDetector {
    modules: Vec<HyCalModule>,
    id_map: FxHashMap<i32, usize>,
    dead: BitVec,
    dead_neighbors: Vec<Vec<usize>>,
    energies: Vec<f32>,
    module_hits: Vec<ModuleHit>,
    module_clusters: Vec<ModuleCluster>,
    hycal_hits: Vec<HyCalHit>,
    overflow: usize,
}

impl HyCalDetector {
    pub fn new(modules: Vec<HyCalModule>) -> Self {
        let id_map = modules
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.id, idx))
            .collect();
        let n_modules = modules.len();
        Self {
            modules,
            id_map,
            dead: bitvec![0; n_modules],
            dead_neighbors: vec![Vec::new(); n_modules],
            energies: vec![0.0; n_modules],
            module_hits: Vec::new(),
            module_clusters: Vec::new(),
            hycal_hits: Vec::new(),
            overflow: 0,
        }
    }

    /// The detector with the standard PRad layout
    pub fn prad() -> Self {
        Self::new(prad_modules())
    }

    pub fn modules(&self) -> &[HyCalModule] {
        &self.modules
    }

    pub fn module(&self, id: i32) -> Option<&HyCalModule> {
        self.id_map.get(&id).map(|idx| &self.modules[*idx])
    }

    pub fn set_calib(&mut self, id: i32, calib: CalibConst) -> bool {
        match self.id_map.get(&id) {
            Some(idx) => {
                self.modules[*idx].calib = calib;
                true
            }
            None => {
                spdlog::warn!("Cannot set calibration of unknown HyCal module {}", id);
                false
            }
        }
    }

    /// Set the calibration of every listed module. Returns how many were applied
    pub fn apply_calib(&mut self, calibs: &[ModuleCalib]) -> usize {
        calibs
            .iter()
            .filter(|c| {
                self.set_calib(
                    c.id,
                    CalibConst {
                        base_energy: c.base_energy,
                        non_linear: c.non_linear,
                    },
                )
            })
            .count()
    }

    /// Mark the given modules as dead and rebuild the dead-neighbor lists
    pub fn set_dead_modules(&mut self, ids: &[i32]) {
        self.dead.fill(false);
        for id in ids {
            match self.id_map.get(id) {
                Some(idx) => self.dead.set(*idx, true),
                None => spdlog::warn!("Dead module list contains unknown module {}", id),
            }
        }

        for list in self.dead_neighbors.iter_mut() {
            list.clear();
        }
        let dead_indices: Vec<usize> = self.dead.iter_ones().collect();
        for (idx, module) in self.modules.iter().enumerate() {
            let hit = module.to_hit(0.0);
            for &dead_idx in dead_indices.iter() {
                if dead_idx == idx {
                    continue;
                }
                if hit_distance(&hit, &self.modules[dead_idx].to_hit(0.0)) < CORNER_ADJACENT {
                    self.dead_neighbors[idx].push(dead_idx);
                }
            }
        }
    }

    pub fn is_dead(&self, id: i32) -> bool {
        self.id_map
            .get(&id)
            .map(|idx| self.dead[*idx])
            .unwrap_or(false)
    }

    /// Dead modules surrounding a module, as zero energy hits
    pub fn dead_neighbor_hits(&self, id: i32) -> Vec<ModuleHit> {
        match self.id_map.get(&id) {
            Some(idx) => self.dead_neighbors[*idx]
                .iter()
                .map(|dead_idx| self.modules[*dead_idx].to_hit(0.0))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Reset all per-event containers
    pub fn clear(&mut self) {
        self.energies.fill(0.0);
        self.module_hits.clear();
        self.module_clusters.clear();
        self.hycal_hits.clear();
        self.overflow = 0;
    }

    /// Add calibrated energy to a module for the current event
    pub fn add_energy(&mut self, id: i32, energy: f32) -> bool {
        match self.id_map.get(&id) {
            Some(idx) => {
                if self.dead[*idx] {
                    spdlog::warn!("Received energy for dead HyCal module {}, ignoring it", id);
                    return false;
                }
                if energy > 0.0 {
                    self.energies[*idx] += energy;
                }
                true
            }
            None => {
                spdlog::warn!("Received energy for unknown HyCal module {}", id);
                false
            }
        }
    }

    /// Collect the module hits of the event, cluster them and reconstruct the hits
    pub fn reconstruct(&mut self, method: &ClusterMethod, recon: &ClusterReconstructor) {
        self.module_hits.clear();
        self.module_clusters.clear();
        self.hycal_hits.clear();
        self.overflow = 0;

        for (idx, module) in self.modules.iter().enumerate() {
            if self.energies[idx] > 0.0 {
                self.module_hits.push(module.to_hit(self.energies[idx]));
            }
        }

        method.form_clusters(&self.module_hits, &mut self.module_clusters);

        let mut clusters = std::mem::take(&mut self.module_clusters);
        for cluster in clusters.iter_mut() {
            if !recon.check_cluster(cluster) {
                continue;
            }
            let dead = self.dead_neighbor_hits(cluster.center.id);
            recon.leak_corr(cluster, &dead);

            if self.hycal_hits.len() >= MAX_HYCAL_CLUSTERS {
                self.overflow += 1;
                continue;
            }
            let calib = self
                .module(cluster.center.id)
                .map(|m| m.calib)
                .unwrap_or_default();
            self.hycal_hits.push(recon.reconstruct(cluster, &calib));
        }
        self.module_clusters = clusters;

        if self.overflow > 0 {
            spdlog::debug!(
                "HyCal cluster capacity reached, dropped {} clusters",
                self.overflow
            );
        }
    }

    pub fn module_hits(&self) -> &[ModuleHit] {
        &self.module_hits
    }

    pub fn clusters(&self) -> &[ModuleCluster] {
        &self.module_clusters
    }

    pub fn hits(&self) -> &[HyCalHit] {
        &self.hycal_hits
    }

    /// Number of clusters dropped in the last event because of the capacity limit
    pub fn overflow(&self) -> usize {
        self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hycal::profile::ClusterProfile;
    use crate::hycal::square::SquareCluster;
    use crate::recon_config::HyCalSettings;
    use std::sync::Arc;

    #[test]
    fn test_lookup_and_dead() {
        let mut hycal = HyCalDetector::prad();
        assert!(hycal.module(1001 + 100).is_some());
        assert!(hycal.module(99999).is_none());
        // W101 is row 2, column 32; its right neighbor is W102
        hycal.set_dead_modules(&[1102]);
        assert!(hycal.is_dead(1102));
        let dead = hycal.dead_neighbor_hits(1101);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, 1102);
        assert!(!hycal.add_energy(1102, 10.0));
        assert!(!hycal.add_energy(424242, 10.0));
    }

    #[test]
    fn test_event_cycle_clears() {
        let settings = HyCalSettings::default();
        let profile = Arc::new(ClusterProfile::prad());
        let method = ClusterMethod::Square(SquareCluster::new(&settings));
        let recon = ClusterReconstructor::new(settings, profile);
        let mut hycal = HyCalDetector::prad();
        // center of the crystal region, row 10 column 10
        let center = 1001 + 10 * 34 + 10;
        hycal.clear();
        hycal.add_energy(center, 800.0);
        hycal.add_energy(center + 1, 60.0);
        hycal.add_energy(center - 34, 40.0);
        hycal.reconstruct(&method, &recon);
        assert_eq!(hycal.hits().len(), 1);
        assert_eq!(hycal.hits()[0].cid, center);

        hycal.clear();
        hycal.reconstruct(&method, &recon);
        assert!(hycal.hits().is_empty());
        assert!(hycal.module_hits().is_empty());
    }

    #[test]
    fn test_cluster_capacity() {
        let settings = HyCalSettings::default();
        let profile = Arc::new(ClusterProfile::prad());
        let method = ClusterMethod::new(&settings, profile.clone());
        let recon = ClusterReconstructor::new(settings, profile);
        let mut hycal = HyCalDetector::prad();
        hycal.clear();
        // every other crystal row and column, 17 x 17 minus the one in the beam hole
        let mut n_filled = 0;
        for row in (0..34).step_by(2) {
            for col in (0..34).step_by(2) {
                if hycal.add_energy(1001 + row * 34 + col, 200.0) {
                    n_filled += 1;
                }
            }
        }
        assert_eq!(n_filled, 288);
        hycal.reconstruct(&method, &recon);
        assert_eq!(hycal.clusters().len(), 288);
        assert_eq!(hycal.hits().len(), MAX_HYCAL_CLUSTERS);
        assert_eq!(hycal.overflow(), 288 - MAX_HYCAL_CLUSTERS);

        hycal.clear();
        assert_eq!(hycal.overflow(), 0);
    }

    #[test]
    fn test_calibration_file() {
        let path = std::env::temp_dir().join("prad_recon_calib.yaml");
        let yaml_str = "
- { id: 1351, base_energy: 1000.0, non_linear: 0.05 }
- { id: 424242, base_energy: 1000.0, non_linear: 0.05 }
";
        std::fs::write(&path, yaml_str).unwrap();
        let calibs = read_calib_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(calibs.len(), 2);

        let mut hycal = HyCalDetector::prad();
        // the unknown module is skipped
        assert_eq!(hycal.apply_calib(&calibs), 1);
        let calib = hycal.module(1351).unwrap().calib;
        assert_eq!(calib.non_linear, 0.05);
        assert!((calib.alpha(2000.0) - 0.05).abs() < 1e-6);

        assert!(matches!(
            read_calib_file(Path::new("/definitely/not/here.yaml")),
            Err(CalibError::BadFilePath(_))
        ));
    }
}
