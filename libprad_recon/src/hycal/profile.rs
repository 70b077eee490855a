// Transverse shower profile used for leakage recovery and energy sharing between showers.
//
// The table stores, per module type, the fraction of the shower energy deposited in a
// module whose center is (dx, dy) module sizes away from the shower center. Values are
// tabulated on a regular grid from 0 to PROFILE_RANGE in both directions and bilinearly
// interpolated; the profile is symmetric so only |dx| and |dy| are used.
//
// The default table is integrated from the Lednev parametrization of the cumulative
// transverse shower distribution:
//
//   F(x, y) = 1/4 + 1/(2 pi) * sum_i a_i [atan(x/b_i) + atan(y/b_i)
//                                         + atan(x y / (b_i sqrt(b_i^2 + x^2 + y^2)))]
//
// with sum_i a_i = 1, so the fraction in a unit cell is a finite difference of F.
use ndarray::Array3;
use std::f64::consts::PI;

use super::module::{Geometry, ModuleType};

pub const PROFILE_STEP: f32 = 0.02;
pub const PROFILE_RANGE: f32 = 5.0;
pub const PROFILE_BINS: usize = 251;

/// Two component Lednev shower shape, lengths in module sizes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowerShape {
    pub amplitudes: [f64; 2],
    pub slopes: [f64; 2],
}

impl ShowerShape {
    pub const PBWO4: Self = Self {
        amplitudes: [0.85, 0.15],
        slopes: [0.18, 0.75],
    };
    pub const PBGLASS: Self = Self {
        amplitudes: [0.87, 0.13],
        slopes: [0.16, 0.70],
    };

    fn cumulative(&self, x: f64, y: f64) -> f64 {
        let mut sum = 0.0;
        for (a, b) in self.amplitudes.iter().zip(self.slopes.iter()) {
            let r = (b * b + x * x + y * y).sqrt();
            sum += a * ((x / b).atan() + (y / b).atan() + (x * y / (b * r)).atan());
        }
        0.25 + sum / (2.0 * PI)
    }

    /// Fraction of the shower contained in a unit cell centered at (dx, dy)
    pub fn cell_fraction(&self, dx: f64, dy: f64) -> f64 {
        let f = |x, y| self.cumulative(x, y);
        f(dx + 0.5, dy + 0.5) - f(dx - 0.5, dy + 0.5) - f(dx + 0.5, dy - 0.5)
            + f(dx - 0.5, dy - 0.5)
    }
}

/// Immutable lookup table of shower energy fractions, indexed by module type, |dx|, |dy|
#[derive(Debug, Clone)]
pub struct ClusterProfile {
    table: Array3<f32>,
}

impl ClusterProfile {
    /// Tabulate the profile from a shower shape for each module type
    pub fn from_shower_shapes(glass: &ShowerShape, crystal: &ShowerShape) -> Self {
        let mut table = Array3::<f32>::zeros((2, PROFILE_BINS, PROFILE_BINS));
        for (kind, shape) in [(ModuleType::PbGlass, glass), (ModuleType::PbWO4, crystal)] {
            for ix in 0..PROFILE_BINS {
                for iy in 0..=ix {
                    let dx = (ix as f32 * PROFILE_STEP) as f64;
                    let dy = (iy as f32 * PROFILE_STEP) as f64;
                    let frac = shape.cell_fraction(dx, dy).max(0.0) as f32;
                    table[[kind.index(), ix, iy]] = frac;
                    table[[kind.index(), iy, ix]] = frac;
                }
            }
        }
        Self { table }
    }

    /// The default PRad profile
    pub fn prad() -> Self {
        Self::from_shower_shapes(&ShowerShape::PBGLASS, &ShowerShape::PBWO4)
    }

    /// Energy fraction at a distance (dx, dy) in module sizes
    pub fn get(&self, kind: ModuleType, dx: f32, dy: f32) -> f32 {
        let (dx, dy) = (dx.abs(), dy.abs());
        if dx >= PROFILE_RANGE || dy >= PROFILE_RANGE {
            return 0.0;
        }
        let fx = dx / PROFILE_STEP;
        let fy = dy / PROFILE_STEP;
        let ix = (fx as usize).min(PROFILE_BINS - 2);
        let iy = (fy as usize).min(PROFILE_BINS - 2);
        let tx = fx - ix as f32;
        let ty = fy - iy as f32;
        let k = kind.index();
        let v00 = self.table[[k, ix, iy]];
        let v10 = self.table[[k, ix + 1, iy]];
        let v01 = self.table[[k, ix, iy + 1]];
        let v11 = self.table[[k, ix + 1, iy + 1]];
        (1.0 - tx) * (1.0 - ty) * v00 + tx * (1.0 - ty) * v10 + (1.0 - tx) * ty * v01
            + tx * ty * v11
    }

    /// Expected energy fraction in a module for a shower centered at (x, y)
    pub fn fraction_at(&self, module: &Geometry, x: f32, y: f32) -> f32 {
        let dx = (x - module.x) / module.size_x;
        let dy = (y - module.y) / module.size_y;
        self.get(module.kind, dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_normalization() {
        let shape = ShowerShape::PBWO4;
        let mut total = 0.0;
        for i in -6..=6 {
            for j in -6..=6 {
                total += shape.cell_fraction(i as f64, j as f64);
            }
        }
        // the wide component leaks a few percent outside a 13x13 block
        assert!(total > 0.9 && total <= 1.0, "total fraction {total}");
    }

    #[test]
    fn test_profile_symmetry_and_falloff() {
        let profile = ClusterProfile::prad();
        let center = profile.get(ModuleType::PbWO4, 0.0, 0.0);
        let side = profile.get(ModuleType::PbWO4, 1.0, 0.0);
        let corner = profile.get(ModuleType::PbWO4, 1.0, 1.0);
        assert!(center > side && side > corner && corner > 0.0);
        assert!(center < 1.0);
        let a = profile.get(ModuleType::PbWO4, 0.3, 1.1);
        let b = profile.get(ModuleType::PbWO4, 1.1, 0.3);
        assert!((a - b).abs() < 1e-6);
        assert_eq!(profile.get(ModuleType::PbWO4, -1.0, 0.0), side);
        assert_eq!(profile.get(ModuleType::PbGlass, 6.0, 0.0), 0.0);
    }
}
