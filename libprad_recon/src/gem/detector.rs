use serde::{Deserialize, Serialize};

use super::cluster::GemClusterMethod;
use super::plane::{GemPlane, PlaneType};
use crate::constants::{X_PLANE_APVS, Y_PLANE_APVS};
use crate::coord::DetectorId;

/// A 2D GEM hit, made from one X and one Y cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GemHit {
    pub det: DetectorId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub x_charge: f32,
    pub y_charge: f32,
    pub x_peak: f32,
    pub y_peak: f32,
    pub x_size: usize,
    pub y_size: usize,
}

/// An APV card plugged into a plane. `slot` is its position along the plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApvConnection {
    pub plane: usize,
    pub slot: usize,
}

/// GemDetector owns its planes and the APV arena.
///
/// Planes refer to their APVs by index into `apvs` and each APV refers back to its plane
/// by index into `planes`.
#[derive(Debug, Clone)]
pub struct GemDetector {
    id: DetectorId,
    planes: Vec<GemPlane>,
    apvs: Vec<ApvConnection>,
    hits: Vec<GemHit>,
    overflow: usize,
}

impl GemDetector {
    /// A detector with both planes and no APV connected
    pub fn new(id: DetectorId, x_plane: GemPlane, y_plane: GemPlane) -> Self {
        Self {
            id,
            planes: vec![x_plane, y_plane],
            apvs: Vec::new(),
            hits: Vec::new(),
            overflow: 0,
        }
    }

    /// A PRad GEM with every APV slot of both planes connected
    pub fn prad(id: DetectorId) -> Self {
        let mut gem = Self::new(id, GemPlane::prad(PlaneType::X), GemPlane::prad(PlaneType::Y));
        for slot in 0..X_PLANE_APVS {
            gem.connect_apv(PlaneType::X, slot);
        }
        for slot in 0..Y_PLANE_APVS {
            gem.connect_apv(PlaneType::Y, slot);
        }
        gem
    }

    pub fn id(&self) -> DetectorId {
        self.id
    }

    /// Connect an APV to a plane slot and return its index in the arena
    pub fn connect_apv(&mut self, plane: PlaneType, slot: usize) -> usize {
        let plane_idx = plane.index();
        if let Some(existing) = self
            .apvs
            .iter()
            .position(|a| a.plane == plane_idx && a.slot == slot)
        {
            spdlog::warn!(
                "APV slot {} of {} plane {} is already connected",
                slot,
                self.id,
                plane
            );
            return existing;
        }
        let idx = self.apvs.len();
        self.apvs.push(ApvConnection {
            plane: plane_idx,
            slot,
        });
        self.planes[plane_idx].apvs.push(idx);
        idx
    }

    pub fn apv(&self, idx: usize) -> Option<&ApvConnection> {
        self.apvs.get(idx)
    }

    pub fn plane(&self, kind: PlaneType) -> &GemPlane {
        &self.planes[kind.index()]
    }

    pub fn add_strip_hit(&mut self, plane: PlaneType, strip: i32, charge: f32) -> bool {
        self.planes[plane.index()].add_strip_hit(strip, charge, false)
    }

    /// Reset all planes and hits
    pub fn clear(&mut self) {
        self.planes.iter_mut().for_each(GemPlane::clear);
        self.hits.clear();
        self.overflow = 0;
    }

    /// Cluster both planes and cross them into 2D hits
    pub fn reconstruct(&mut self, method: &GemClusterMethod) {
        self.hits.clear();
        self.overflow = 0;

        if let Some(plane) = self.planes.iter().find(|p| p.apv_count() == 0) {
            spdlog::warn!(
                "{} plane {} has no APV connected, no hits reconstructed",
                self.id,
                plane.kind()
            );
            return;
        }

        for plane in self.planes.iter_mut() {
            plane.form_clusters(method);
        }
        let (hits, overflow) = method.cartesian_hits(
            self.id,
            self.plane(PlaneType::X).clusters(),
            self.plane(PlaneType::Y).clusters(),
        );
        self.hits = hits;
        self.overflow = overflow;
        if overflow > 0 {
            spdlog::debug!("{} hit capacity reached, dropped {} hits", self.id, overflow);
        }
    }

    pub fn hits(&self) -> &[GemHit] {
        &self.hits
    }

    /// Number of 2D hits dropped in the last event because of the capacity limit
    pub fn overflow(&self) -> usize {
        self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{STRIP_PITCH, X_PLANE_SIZE, Y_PLANE_SIZE};
    use crate::recon_config::GemSettings;

    #[test]
    fn test_apv_arena() {
        let mut gem = GemDetector::prad(DetectorId::Gem1);
        assert_eq!(gem.plane(PlaneType::X).apv_count(), 12);
        assert_eq!(gem.plane(PlaneType::Y).apv_count(), 24);
        let idx = gem.connect_apv(PlaneType::Y, 3);
        assert_eq!(gem.plane(PlaneType::Y).apv_count(), 24);
        let apv = gem.apv(idx).unwrap();
        assert_eq!(apv.plane, PlaneType::Y.index());
        assert_eq!(apv.slot, 3);
    }

    #[test]
    fn test_reconstruct_hits() {
        let mut gem = GemDetector::prad(DetectorId::Gem2);
        let method = GemClusterMethod::new(&GemSettings::default());
        gem.clear();
        gem.add_strip_hit(PlaneType::X, 700, 30.0);
        gem.add_strip_hit(PlaneType::X, 701, 50.0);
        gem.add_strip_hit(PlaneType::X, 900, 40.0);
        gem.add_strip_hit(PlaneType::Y, 1500, 60.0);
        gem.reconstruct(&method);
        assert_eq!(gem.hits().len(), 2);
        assert!(gem.hits().iter().all(|h| h.det == DetectorId::Gem2));
        assert_eq!(gem.hits()[0].x_size, 2);
        assert_eq!(gem.hits()[0].y_charge, 60.0);

        gem.clear();
        gem.reconstruct(&method);
        assert!(gem.hits().is_empty());
    }

    #[test]
    fn test_unconnected_plane() {
        let mut gem = GemDetector::new(
            DetectorId::Gem1,
            GemPlane::new(PlaneType::X, X_PLANE_SIZE, STRIP_PITCH, 1.0, 1536),
            GemPlane::new(PlaneType::Y, Y_PLANE_SIZE, STRIP_PITCH, 1.0, 3072),
        );
        gem.connect_apv(PlaneType::X, 0);
        gem.add_strip_hit(PlaneType::X, 100, 30.0);
        gem.add_strip_hit(PlaneType::Y, 100, 30.0);
        gem.reconstruct(&GemClusterMethod::new(&GemSettings::default()));
        assert!(gem.hits().is_empty());
    }
}
