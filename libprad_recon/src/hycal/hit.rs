use serde::{Deserialize, Serialize};

use super::module::{test_flag, HitFlag};

/// A reconstructed HyCal hit, the output of cluster reconstruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HyCalHit {
    /// Id of the center module
    pub cid: i32,
    pub flag: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub energy: f32,
    /// Non-linearity correction factor applied to the energy (1 if not applied)
    pub lin_corr: f32,
    /// Fraction of the energy recovered from dead modules
    pub leakage: f32,
    pub nblocks: usize,
    pub npos: usize,
}

impl HyCalHit {
    pub fn is(&self, bit: HitFlag) -> bool {
        test_flag(self.flag, bit)
    }
}
