// Per run detector coordinates. Every detector has an offset and three tilt angles
// (radians); a point in the detector frame is rotated about x, then y, then z, and then
// shifted by the offset into the beam line frame, where the target sits on the z axis.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::constants::{GEM1_NOMINAL_Z, GEM2_NOMINAL_Z, HYCAL_NOMINAL_Z};
use super::error::CoordError;
use super::gem::detector::GemHit;
use super::hycal::hit::HyCalHit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetectorId {
    HyCal,
    Gem1,
    Gem2,
}

impl DetectorId {
    pub const ALL: [DetectorId; 3] = [DetectorId::HyCal, DetectorId::Gem1, DetectorId::Gem2];

    pub fn index(&self) -> usize {
        match self {
            Self::HyCal => 0,
            Self::Gem1 => 1,
            Self::Gem2 => 2,
        }
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HyCal => write!(f, "HyCal"),
            Self::Gem1 => write!(f, "GEM1"),
            Self::Gem2 => write!(f, "GEM2"),
        }
    }
}

/// Position and tilt of one detector for runs starting at `run_number`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetCoord {
    pub run_number: i32,
    pub det: DetectorId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default)]
    pub theta_x: f32,
    #[serde(default)]
    pub theta_y: f32,
    #[serde(default)]
    pub theta_z: f32,
}

impl DetCoord {
    /// Surveyed position of a detector, no offset and no tilt
    pub fn nominal(det: DetectorId) -> Self {
        let z = match det {
            DetectorId::HyCal => HYCAL_NOMINAL_Z,
            DetectorId::Gem1 => GEM1_NOMINAL_Z,
            DetectorId::Gem2 => GEM2_NOMINAL_Z,
        };
        Self {
            run_number: 0,
            det,
            x: 0.0,
            y: 0.0,
            z,
            theta_x: 0.0,
            theta_y: 0.0,
            theta_z: 0.0,
        }
    }

    /// Move a point from the detector frame to the beam line frame
    pub fn transform(&self, x: f32, y: f32, z: f32) -> (f32, f32, f32) {
        let (sin, cos) = self.theta_x.sin_cos();
        let (y, z) = (y * cos - z * sin, y * sin + z * cos);
        let (sin, cos) = self.theta_y.sin_cos();
        let (x, z) = (x * cos + z * sin, -x * sin + z * cos);
        let (sin, cos) = self.theta_z.sin_cos();
        let (x, y) = (x * cos - y * sin, x * sin + y * cos);
        (x + self.x, y + self.y, z + self.z)
    }
}

/// Move a point along the line from the target to the plane at `z_to`
pub fn project(x: f32, y: f32, z: f32, target_z: f32, z_to: f32) -> (f32, f32) {
    let depth = z - target_z;
    if depth == 0.0 {
        return (x, y);
    }
    let scale = (z_to - target_z) / depth;
    (x * scale, y * scale)
}

/// Anything with a position that can be moved into the beam line frame
pub trait Transformable {
    fn position(&self) -> (f32, f32, f32);
    fn set_position(&mut self, x: f32, y: f32, z: f32);
}

impl Transformable for HyCalHit {
    fn position(&self) -> (f32, f32, f32) {
        (self.x, self.y, self.z)
    }

    fn set_position(&mut self, x: f32, y: f32, z: f32) {
        (self.x, self.y, self.z) = (x, y, z);
    }
}

impl Transformable for GemHit {
    fn position(&self) -> (f32, f32, f32) {
        (self.x, self.y, self.z)
    }

    fn set_position(&mut self, x: f32, y: f32, z: f32) {
        (self.x, self.y, self.z) = (x, y, z);
    }
}

/// The coordinates of all detectors for one run
#[derive(Debug, Clone, PartialEq)]
pub struct CoordSystem {
    run_number: i32,
    coords: [DetCoord; 3],
}

impl Default for CoordSystem {
    fn default() -> Self {
        Self {
            run_number: 0,
            coords: DetectorId::ALL.map(DetCoord::nominal),
        }
    }
}

impl CoordSystem {
    /// Pick the coordinates of a run from a database of entries. The entries of the
    /// largest run number not above `run_number` are used.
    pub fn from_entries(entries: &[DetCoord], run_number: i32) -> Result<Self, CoordError> {
        if entries.is_empty() {
            return Err(CoordError::NoEntries);
        }
        let chosen_run = match entries
            .iter()
            .map(|e| e.run_number)
            .filter(|r| *r <= run_number)
            .max()
        {
            Some(run) => run,
            None => {
                let first = entries.iter().map(|e| e.run_number).min().unwrap_or_default();
                spdlog::warn!(
                    "No coordinates defined before run {}, using those of run {}",
                    run_number,
                    first
                );
                first
            }
        };

        let mut coords = [DetCoord::nominal(DetectorId::HyCal); 3];
        for det in DetectorId::ALL {
            let entry = entries
                .iter()
                .find(|e| e.run_number == chosen_run && e.det == det)
                .ok_or_else(|| CoordError::MissingDetector(chosen_run, det.to_string()))?;
            coords[det.index()] = *entry;
        }
        Ok(Self {
            run_number: chosen_run,
            coords,
        })
    }

    pub fn read_file(path: &Path, run_number: i32) -> Result<Self, CoordError> {
        if !path.exists() {
            return Err(CoordError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        let entries: Vec<DetCoord> = serde_yaml::from_str(&yaml_str)?;
        Self::from_entries(&entries, run_number)
    }

    /// Run number of the database entries in use
    pub fn run_number(&self) -> i32 {
        self.run_number
    }

    pub fn coord(&self, det: DetectorId) -> &DetCoord {
        &self.coords[det.index()]
    }

    pub fn transform(&self, det: DetectorId, x: f32, y: f32, z: f32) -> (f32, f32, f32) {
        self.coords[det.index()].transform(x, y, z)
    }

    /// Move a list of hits from the frame of `det` to the beam line frame
    pub fn transform_hits<T: Transformable>(&self, det: DetectorId, hits: &mut [T]) {
        for hit in hits.iter_mut() {
            let (x, y, z) = hit.position();
            let (x, y, z) = self.transform(det, x, y, z);
            hit.set_position(x, y, z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(run_number: i32, det: DetectorId, x: f32) -> DetCoord {
        DetCoord {
            run_number,
            x,
            ..DetCoord::nominal(det)
        }
    }

    #[test]
    fn test_choose_run() {
        let mut entries = Vec::new();
        for (run, x) in [(1000, 1.0), (1200, 2.0)] {
            for det in DetectorId::ALL {
                entries.push(entry(run, det, x));
            }
        }
        let coord = CoordSystem::from_entries(&entries, 1100).unwrap();
        assert_eq!(coord.run_number(), 1000);
        assert_eq!(coord.coord(DetectorId::Gem2).x, 1.0);
        let coord = CoordSystem::from_entries(&entries, 5000).unwrap();
        assert_eq!(coord.run_number(), 1200);
        // before every entry the first one is used
        let coord = CoordSystem::from_entries(&entries, 10).unwrap();
        assert_eq!(coord.run_number(), 1000);
    }

    #[test]
    fn test_missing_entries() {
        assert!(matches!(
            CoordSystem::from_entries(&[], 1),
            Err(CoordError::NoEntries)
        ));
        let entries = vec![entry(1, DetectorId::HyCal, 0.0)];
        assert!(matches!(
            CoordSystem::from_entries(&entries, 1),
            Err(CoordError::MissingDetector(1, _))
        ));
    }

    #[test]
    fn test_transform() {
        let mut coord = DetCoord::nominal(DetectorId::Gem1);
        coord.x = 1.0;
        let (x, y, z) = coord.transform(10.0, 20.0, 0.0);
        assert_eq!((x, y, z), (11.0, 20.0, GEM1_NOMINAL_Z));

        coord.theta_z = std::f32::consts::FRAC_PI_2;
        let (x, y, _) = coord.transform(10.0, 0.0, 0.0);
        assert!((x - 1.0).abs() < 1e-4);
        assert!((y - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_transform_hits() {
        let system = CoordSystem::default();
        let mut hits = vec![HyCalHit {
            x: 5.0,
            y: -5.0,
            z: 12.0,
            ..Default::default()
        }];
        system.transform_hits(DetectorId::HyCal, &mut hits);
        assert_eq!(hits[0].z, HYCAL_NOMINAL_Z + 12.0);
        assert_eq!(hits[0].x, 5.0);
    }

    #[test]
    fn test_project() {
        let (x, y) = project(10.0, -4.0, 500.0, 0.0, 1000.0);
        assert_eq!((x, y), (20.0, -8.0));
        let (x, y) = project(10.0, -4.0, 600.0, 100.0, 1100.0);
        assert_eq!((x, y), (20.0, -8.0));
        assert_eq!(project(3.0, 3.0, 0.0, 0.0, 100.0), (3.0, 3.0));
    }
}
