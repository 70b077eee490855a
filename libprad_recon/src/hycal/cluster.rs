use std::sync::Arc;

use super::detector::CalibConst;
use super::hit::HyCalHit;
use super::module::{hit_distance, set_flag, HitFlag, ModuleCluster, ModuleHit, ModuleType};
use super::profile::ClusterProfile;
use crate::constants::{CORNER_ADJACENT, CRYSTAL_EC, CRYSTAL_X0, LEAD_GLASS_EC, LEAD_GLASS_X0};
use crate::recon_config::HyCalSettings;

/// ClusterReconstructor turns accepted module clusters into HyCal hits.
///
/// It is shared by all of the clustering methods: acceptance, leakage recovery from dead
/// modules, logarithmically weighted position, shower depth and non-linearity correction.
#[derive(Debug, Clone)]
pub struct ClusterReconstructor {
    settings: HyCalSettings,
    profile: Arc<ClusterProfile>,
}

impl ClusterReconstructor {
    pub fn new(settings: HyCalSettings, profile: Arc<ClusterProfile>) -> Self {
        Self { settings, profile }
    }

    pub fn settings(&self) -> &HyCalSettings {
        &self.settings
    }

    /// A cluster is accepted if it is energetic and large enough
    pub fn check_cluster(&self, cluster: &ModuleCluster) -> bool {
        cluster.energy >= self.settings.min_cluster_energy
            && cluster.hits.len() >= self.settings.min_cluster_size
    }

    /// Logarithmic weight of a module carrying `energy` out of `total`
    pub fn log_weight(&self, energy: f32, total: f32) -> f32 {
        if energy <= 0.0 || total <= 0.0 {
            return 0.0;
        }
        (self.settings.log_weight_threshold + (energy / total).ln()).max(0.0)
    }

    /// Longitudinal shower depth for a shower of `energy` MeV in a module type
    pub fn shower_depth(&self, kind: ModuleType, energy: f32) -> f32 {
        if !self.settings.depth_corr || energy <= 0.0 {
            return 0.0;
        }
        let (x0, ec) = match kind {
            ModuleType::PbWO4 => (CRYSTAL_X0, CRYSTAL_EC),
            ModuleType::PbGlass => (LEAD_GLASS_X0, LEAD_GLASS_EC),
        };
        x0 * (energy / ec).log2()
    }

    /// Weighted position from the hits around `center`. Returns (x, y, number of modules used)
    fn position<'a, I>(&self, center: &ModuleHit, hits: I) -> (f32, f32, usize)
    where
        I: Iterator<Item = &'a ModuleHit> + Clone,
    {
        let local = hits.filter(|h| hit_distance(center, h) < CORNER_ADJACENT);
        let total: f32 = local.clone().map(|h| h.energy).sum();

        let mut count = 0;
        let (mut wx, mut wy, mut wsum) = (0.0, 0.0, 0.0);
        for hit in local {
            count += 1;
            let w = self.log_weight(hit.energy, total);
            wx += w * hit.geo.x;
            wy += w * hit.geo.y;
            wsum += w;
        }

        if wsum > 0.0 {
            (wx / wsum, wy / wsum, count)
        } else {
            (center.geo.x, center.geo.y, count)
        }
    }

    fn estimate_leaks(&self, leaks: &mut [ModuleHit], x: f32, y: f32, energy: f32) {
        for leak in leaks.iter_mut() {
            leak.energy = self.profile.fraction_at(&leak.geo, x, y) * energy;
        }
    }

    /// Recover energy lost in the dead modules around the cluster center.
    ///
    /// The first estimate places the shower at the center module; every iteration then
    /// recomputes the position including the estimated dead module energies and updates
    /// the estimates from the profile. Dead modules whose final estimate is above
    /// `least_leak` of the cluster energy are added to the cluster.
    pub fn leak_corr(&self, cluster: &mut ModuleCluster, dead: &[ModuleHit]) {
        if dead.is_empty() || cluster.is_empty() {
            return;
        }
        set_flag(&mut cluster.flag, HitFlag::DeadNeighbor);

        let mut leaks: Vec<ModuleHit> = dead.to_vec();
        let center = cluster.center;
        self.estimate_leaks(&mut leaks, center.geo.x, center.geo.y, cluster.energy);

        for _ in 0..self.settings.leak_iters {
            let (x, y, _) = self.position(&center, cluster.hits.iter().chain(leaks.iter()));
            self.estimate_leaks(&mut leaks, x, y, cluster.energy);
        }

        let threshold = self.settings.least_leak * cluster.energy;
        for leak in leaks {
            if leak.energy > threshold {
                cluster.leakage += leak.energy;
                cluster.add_hit(leak);
                set_flag(&mut cluster.flag, HitFlag::LeakCorr);
            }
        }
    }

    /// Reconstruct a HyCal hit from an accepted cluster
    pub fn reconstruct(&self, cluster: &ModuleCluster, calib: &CalibConst) -> HyCalHit {
        let center = &cluster.center;
        let (x, y, npos) = self.position(center, cluster.hits.iter());

        let mut energy = cluster.energy;
        let mut lin_corr = 1.0;
        let alpha = calib.alpha(energy);
        if alpha.abs() < self.settings.nonlin_limit {
            lin_corr = 1.0 / (1.0 + alpha);
            energy *= lin_corr;
        }

        let z = center.geo.z + self.shower_depth(center.geo.kind, energy);

        let leakage = if cluster.energy > 0.0 {
            cluster.leakage / cluster.energy
        } else {
            0.0
        };

        HyCalHit {
            cid: center.id,
            flag: cluster.flag | center.layout.flag,
            x,
            y,
            z,
            energy,
            lin_corr,
            leakage,
            nblocks: cluster.hits.len(),
            npos,
        }
    }
}
