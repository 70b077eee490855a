use serde::{Deserialize, Serialize};

use super::coord::{project, DetectorId};
use super::gem::detector::GemHit;
use super::hycal::hit::HyCalHit;
use super::hycal::module::{set_flag, test_flag, HitFlag};
use super::recon_config::MatchSettings;

/// The GEM hits matched to one HyCal hit.
///
/// Indices point into the hit lists given to the matcher; `None` means no hit of that
/// detector fell inside the window. The candidate lists hold every hit inside the window,
/// closest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchedIndex {
    pub hycal: usize,
    pub gem1: Option<usize>,
    pub gem2: Option<usize>,
    pub gem1_candidates: Vec<usize>,
    pub gem2_candidates: Vec<usize>,
    /// The closest of the GEM1/GEM2 matches
    pub best: Option<(DetectorId, usize)>,
    pub flag: u32,
}

impl MatchedIndex {
    pub fn is(&self, bit: HitFlag) -> bool {
        test_flag(self.flag, bit)
    }

    /// Both GEMs have a hit in the window
    pub fn is_overlap(&self) -> bool {
        self.is(HitFlag::OverlapMatch)
    }
}

/// Matches HyCal hits with GEM hits, all in the beam line frame
#[derive(Debug, Clone)]
pub struct DetMatch {
    settings: MatchSettings,
}

impl DetMatch {
    pub fn new(settings: MatchSettings) -> Self {
        Self { settings }
    }

    /// Position resolution (mm) of HyCal at a hit
    pub fn resolution(&self, hit: &HyCalHit) -> f32 {
        if hit.is(HitFlag::Transition) {
            self.settings.transition_resolution
        } else if hit.is(HitFlag::PbWO4) {
            self.settings.pwo_resolution
        } else {
            self.settings.glass_resolution
        }
    }

    /// Matching window (mm) of a hit
    pub fn window(&self, hit: &HyCalHit) -> f32 {
        self.settings.match_sigma * self.resolution(hit)
    }

    /// Distance between the two hits once the closer one to the target is projected to
    /// the z of the other one
    pub fn projected_distance(&self, hycal: &HyCalHit, gem: &GemHit) -> f32 {
        let target_z = self.settings.target_z;
        let (hx, hy, gx, gy) = if gem.z <= hycal.z {
            let (gx, gy) = project(gem.x, gem.y, gem.z, target_z, hycal.z);
            (hycal.x, hycal.y, gx, gy)
        } else {
            let (hx, hy) = project(hycal.x, hycal.y, hycal.z, target_z, gem.z);
            (hx, hy, gem.x, gem.y)
        };
        (hx - gx).hypot(hy - gy)
    }

    // Hits of one GEM inside the window, closest first
    fn candidates(&self, hit: &HyCalHit, gem: &[GemHit]) -> Vec<(usize, f32)> {
        let window = self.window(hit);
        let mut found: Vec<(usize, f32)> = gem
            .iter()
            .enumerate()
            .map(|(idx, g)| (idx, self.projected_distance(hit, g)))
            .filter(|(_, dist)| *dist < window)
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found
    }

    /// Match every HyCal hit against both GEMs. The output follows the HyCal hit order
    pub fn match_hits(
        &self,
        hycal: &[HyCalHit],
        gem1: &[GemHit],
        gem2: &[GemHit],
    ) -> Vec<MatchedIndex> {
        let mut matched = Vec::with_capacity(hycal.len());
        for (idx, hit) in hycal.iter().enumerate() {
            let c1 = self.candidates(hit, gem1);
            let c2 = self.candidates(hit, gem2);
            let mut result = MatchedIndex {
                hycal: idx,
                gem1: c1.first().map(|c| c.0),
                gem2: c2.first().map(|c| c.0),
                gem1_candidates: c1.iter().map(|c| c.0).collect(),
                gem2_candidates: c2.iter().map(|c| c.0).collect(),
                ..Default::default()
            };

            result.best = match (c1.first(), c2.first()) {
                (Some(a), Some(b)) => {
                    set_flag(&mut result.flag, HitFlag::Gem1Match);
                    set_flag(&mut result.flag, HitFlag::Gem2Match);
                    set_flag(&mut result.flag, HitFlag::OverlapMatch);
                    if b.1 < a.1 {
                        Some((DetectorId::Gem2, b.0))
                    } else {
                        Some((DetectorId::Gem1, a.0))
                    }
                }
                (Some(a), None) => {
                    set_flag(&mut result.flag, HitFlag::Gem1Match);
                    Some((DetectorId::Gem1, a.0))
                }
                (None, Some(b)) => {
                    set_flag(&mut result.flag, HitFlag::Gem2Match);
                    Some((DetectorId::Gem2, b.0))
                }
                (None, None) => None,
            };
            matched.push(result);
        }
        matched
    }
}
