use std::sync::Arc;

use super::coord::{CoordSystem, DetectorId};
use super::event::{OverflowCounts, RawEvent, ReconEvent};
use super::gem::apv::{
    process_strip, ApvMode, PedestalAccumulator, PedestalTable, StripKey, StripOutput,
};
use super::gem::cluster::GemClusterMethod;
use super::gem::detector::GemDetector;
use super::hycal::cluster::ClusterReconstructor;
use super::hycal::detector::HyCalDetector;
use super::hycal::method::ClusterMethod;
use super::hycal::profile::ClusterProfile;
use super::matching::DetMatch;
use super::recon_config::ReconConfig;

/// EventReconstructor takes one raw event through every stage: HyCal clustering and
/// cluster reconstruction, GEM strip clustering, the move to the beam line frame and the
/// HyCal-GEM matching.
///
/// It owns its detectors, so one reconstructor must be used by a single thread. The
/// cluster profile and pedestal table are shared.
#[derive(Debug, Clone)]
pub struct EventReconstructor {
    hycal: HyCalDetector,
    gems: Vec<GemDetector>,
    method: ClusterMethod,
    cluster_recon: ClusterReconstructor,
    gem_method: GemClusterMethod,
    matcher: DetMatch,
    coords: CoordSystem,
    pedestals: Arc<PedestalTable>,
    zero_sup_threshold: f32,
}

impl EventReconstructor {
    pub fn new(
        config: &ReconConfig,
        profile: Arc<ClusterProfile>,
        coords: CoordSystem,
        pedestals: Arc<PedestalTable>,
    ) -> Self {
        let mut hycal = HyCalDetector::prad();
        hycal.set_dead_modules(&config.dead_modules);
        Self {
            hycal,
            gems: vec![
                GemDetector::prad(DetectorId::Gem1),
                GemDetector::prad(DetectorId::Gem2),
            ],
            method: ClusterMethod::new(&config.hycal, profile.clone()),
            cluster_recon: ClusterReconstructor::new(config.hycal.clone(), profile),
            gem_method: GemClusterMethod::new(&config.gem),
            matcher: DetMatch::new(config.matching.clone()),
            coords,
            pedestals,
            zero_sup_threshold: config.gem.zero_sup_threshold,
        }
    }

    pub fn hycal(&self) -> &HyCalDetector {
        &self.hycal
    }

    pub fn hycal_mut(&mut self) -> &mut HyCalDetector {
        &mut self.hycal
    }

    pub fn gem(&self, det: DetectorId) -> Option<&GemDetector> {
        self.gems.iter().find(|g| g.id() == det)
    }

    fn gem_index(&self, det: DetectorId) -> Option<usize> {
        self.gems.iter().position(|g| g.id() == det)
    }

    /// Reset every detector container
    pub fn clear(&mut self) {
        self.hycal.clear();
        self.gems.iter_mut().for_each(GemDetector::clear);
    }

    fn fill(&mut self, event: &RawEvent) {
        for module in event.modules.iter() {
            self.hycal.add_energy(module.id, module.energy);
        }

        for strip in event.gem.iter() {
            let Some(idx) = self.gem_index(strip.detector) else {
                spdlog::warn!(
                    "Event {} has strip data for {}, which is not a GEM",
                    event.event_number,
                    strip.detector
                );
                continue;
            };
            let key = StripKey {
                detector: strip.detector,
                plane: strip.plane,
                strip: strip.strip,
            };
            let pedestal = self.pedestals.get(&key);
            if let StripOutput::Hit(charge) = process_strip(
                ApvMode::Physics,
                &strip.samples,
                &pedestal,
                self.zero_sup_threshold,
            ) {
                self.gems[idx].add_strip_hit(strip.plane, strip.strip, charge);
            }
        }
    }

    /// Reconstruct one event. Containers are cleared first, so a bad event never leaks
    /// into the next one.
    pub fn reconstruct(&mut self, event: &RawEvent) -> ReconEvent {
        self.clear();
        self.fill(event);

        self.hycal.reconstruct(&self.method, &self.cluster_recon);
        for gem in self.gems.iter_mut() {
            gem.reconstruct(&self.gem_method);
        }

        let mut hycal_hits = self.hycal.hits().to_vec();
        self.coords.transform_hits(DetectorId::HyCal, &mut hycal_hits);
        let mut gem_hits = [Vec::new(), Vec::new()];
        for (hits, gem) in gem_hits.iter_mut().zip(self.gems.iter()) {
            *hits = gem.hits().to_vec();
            self.coords.transform_hits(gem.id(), hits);
        }
        let [gem1_hits, gem2_hits] = gem_hits;

        let matches = self.matcher.match_hits(&hycal_hits, &gem1_hits, &gem2_hits);
        ReconEvent {
            event_number: event.event_number,
            hycal_hits,
            gem1_hits,
            gem2_hits,
            matches,
            overflow: OverflowCounts {
                hycal: self.hycal.overflow(),
                gem1: self.gems[0].overflow(),
                gem2: self.gems[1].overflow(),
            },
        }
    }

    /// Add the strip levels of a pedestal event to the accumulator
    pub fn accumulate_pedestal(&self, event: &RawEvent, accumulator: &mut PedestalAccumulator) {
        for strip in event.gem.iter() {
            let key = StripKey {
                detector: strip.detector,
                plane: strip.plane,
                strip: strip.strip,
            };
            if let StripOutput::Level(level) = process_strip(
                ApvMode::Pedestal,
                &strip.samples,
                &self.pedestals.get(&key),
                self.zero_sup_threshold,
            ) {
                accumulator.add(key, level);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{GemStripData, ModuleEnergy};
    use crate::gem::plane::PlaneType;
    use crate::hycal::detector::ModuleCalib;
    use crate::hycal::module::HitFlag;

    fn reconstructor(config: &ReconConfig) -> EventReconstructor {
        EventReconstructor::new(
            config,
            Arc::new(ClusterProfile::prad()),
            CoordSystem::default(),
            Arc::new(PedestalTable::default()),
        )
    }

    fn strip(detector: DetectorId, plane: PlaneType, strip: i32) -> GemStripData {
        GemStripData {
            detector,
            plane,
            strip,
            samples: vec![100.0, 150.0, 120.0],
        }
    }

    // W row 10, column 10 sits at (-135.0, 135.0). Seen from the target, GEM1 strips 394
    // (X) and 1845 (Y) point at it.
    fn shower_event(event_number: u64) -> RawEvent {
        RawEvent {
            event_number,
            modules: vec![ModuleEnergy {
                id: 1351,
                energy: 1000.0,
            }],
            gem: vec![
                strip(DetectorId::Gem1, PlaneType::X, 394),
                strip(DetectorId::Gem1, PlaneType::Y, 1845),
            ],
        }
    }

    #[test]
    fn test_full_event() {
        let mut recon = reconstructor(&ReconConfig::default());
        let event = recon.reconstruct(&shower_event(11));
        assert_eq!(event.event_number, 11);
        assert_eq!(event.hycal_hits.len(), 1);
        let hit = event.hycal_hits[0];
        assert_eq!(hit.cid, 1351);
        assert!(hit.is(HitFlag::PbWO4));
        assert!((hit.x + 135.005).abs() < 1e-2);
        assert!(hit.z > 5817.0);
        assert_eq!(event.gem1_hits.len(), 1);
        assert!((event.gem1_hits[0].z - 5407.0).abs() < 1e-3);
        assert!(event.gem2_hits.is_empty());
        assert_eq!(event.matches.len(), 1);
        assert_eq!(event.matches[0].gem1, Some(0));
        assert_eq!(event.matches[0].best, Some((DetectorId::Gem1, 0)));
        assert_eq!(event.overflow.total(), 0);
    }

    #[test]
    fn test_calibration_corrects_energy() {
        let mut recon = reconstructor(&ReconConfig::default());
        let raw = RawEvent {
            event_number: 6,
            modules: vec![ModuleEnergy {
                id: 1351,
                energy: 2000.0,
            }],
            gem: Vec::new(),
        };
        let uncalibrated = recon.reconstruct(&raw);
        assert_eq!(uncalibrated.hycal_hits[0].lin_corr, 1.0);

        let calib = ModuleCalib {
            id: 1351,
            base_energy: 1000.0,
            non_linear: 0.05,
        };
        assert_eq!(recon.hycal_mut().apply_calib(&[calib]), 1);
        let event = recon.reconstruct(&raw);
        let hit = event.hycal_hits[0];
        assert!((hit.lin_corr - 1.0 / 1.05).abs() < 1e-5);
        assert!((hit.energy - 2000.0 / 1.05).abs() < 1e-2);
    }

    #[test]
    fn test_events_do_not_leak() {
        let mut recon = reconstructor(&ReconConfig::default());
        recon.reconstruct(&shower_event(1));
        let empty = recon.reconstruct(&RawEvent {
            event_number: 2,
            ..Default::default()
        });
        assert!(empty.hycal_hits.is_empty());
        assert!(empty.gem1_hits.is_empty());
        assert!(empty.matches.is_empty());
        assert!(recon.hycal().module_hits().is_empty());
    }

    #[test]
    fn test_low_energy_cluster_rejected() {
        let mut recon = reconstructor(&ReconConfig::default());
        let event = recon.reconstruct(&RawEvent {
            event_number: 3,
            modules: vec![ModuleEnergy { id: 1351, energy: 30.0 }],
            gem: Vec::new(),
        });
        // one cluster is formed, but it is below the minimum cluster energy
        assert_eq!(recon.hycal().clusters().len(), 1);
        assert!(event.hycal_hits.is_empty());
    }

    #[test]
    fn test_dead_modules_from_config() {
        let config = ReconConfig {
            dead_modules: vec![1351],
            ..Default::default()
        };
        let mut recon = reconstructor(&config);
        let event = recon.reconstruct(&shower_event(4));
        assert!(event.hycal_hits.is_empty());
    }

    #[test]
    fn test_strip_data_for_hycal_is_skipped() {
        let mut recon = reconstructor(&ReconConfig::default());
        let mut raw = shower_event(5);
        raw.gem.push(strip(DetectorId::HyCal, PlaneType::X, 500));
        let event = recon.reconstruct(&raw);
        assert_eq!(event.gem1_hits.len(), 1);
    }

    #[test]
    fn test_accumulate_pedestal() {
        let recon = reconstructor(&ReconConfig::default());
        let mut acc = PedestalAccumulator::default();
        recon.accumulate_pedestal(&shower_event(1), &mut acc);
        recon.accumulate_pedestal(&shower_event(2), &mut acc);
        let table = acc.finish();
        assert_eq!(table.len(), 2);
        let key = StripKey {
            detector: DetectorId::Gem1,
            plane: PlaneType::X,
            strip: 394,
        };
        let ped = table.get(&key);
        assert!((ped.mean - 123.333).abs() < 1e-2);
        assert!(ped.rms.abs() < 1e-3);
    }
}
