// APV sample processing. Each strip of an APV delivers a few time samples per event. In
// physics mode the samples are pedestal subtracted and zero suppressed, in pedestal mode
// their average is collected to build the pedestal table of the next physics run.
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::plane::PlaneType;
use crate::coord::DetectorId;
use crate::error::PedestalError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApvMode {
    #[default]
    Physics,
    Pedestal,
}

/// Pedestal level and noise of one strip
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pedestal {
    pub mean: f32,
    pub rms: f32,
}

/// What a strip produced for one event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StripOutput {
    /// Strip above the zero suppression threshold, with its charge
    Hit(f32),
    Suppressed,
    /// Average raw level of the strip, for pedestal accumulation
    Level(f32),
}

/// Process the time samples of one strip
pub fn process_strip(
    mode: ApvMode,
    samples: &[f32],
    pedestal: &Pedestal,
    zero_sup_threshold: f32,
) -> StripOutput {
    if samples.is_empty() {
        return StripOutput::Suppressed;
    }
    let n = samples.len() as f32;
    match mode {
        ApvMode::Pedestal => StripOutput::Level(samples.iter().sum::<f32>() / n),
        ApvMode::Physics => {
            let average = samples.iter().map(|s| s - pedestal.mean).sum::<f32>() / n;
            if average > zero_sup_threshold * pedestal.rms {
                let charge = samples
                    .iter()
                    .map(|s| s - pedestal.mean)
                    .fold(f32::MIN, f32::max);
                StripOutput::Hit(charge)
            } else {
                StripOutput::Suppressed
            }
        }
    }
}

/// Identifies one strip of the whole GEM system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StripKey {
    pub detector: DetectorId,
    pub plane: PlaneType,
    pub strip: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PedestalEntry {
    detector: DetectorId,
    plane: PlaneType,
    strip: i32,
    mean: f32,
    rms: f32,
}

/// Pedestals of every strip. Strips without an entry have a zero pedestal
#[derive(Debug, Clone, Default)]
pub struct PedestalTable {
    entries: FxHashMap<StripKey, Pedestal>,
}

impl PedestalTable {
    pub fn get(&self, key: &StripKey) -> Pedestal {
        self.entries.get(key).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, key: StripKey, pedestal: Pedestal) {
        self.entries.insert(key, pedestal);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn read_file(path: &Path) -> Result<Self, PedestalError> {
        if !path.exists() {
            return Err(PedestalError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        let list: Vec<PedestalEntry> = serde_yaml::from_str(&yaml_str)?;
        let mut table = Self::default();
        for entry in list {
            table.insert(
                StripKey {
                    detector: entry.detector,
                    plane: entry.plane,
                    strip: entry.strip,
                },
                Pedestal {
                    mean: entry.mean,
                    rms: entry.rms,
                },
            );
        }
        Ok(table)
    }

    /// Write the table sorted by strip
    pub fn write_file(&self, path: &Path) -> Result<(), PedestalError> {
        let mut keys: Vec<&StripKey> = self.entries.keys().collect();
        keys.sort();
        let list: Vec<PedestalEntry> = keys
            .into_iter()
            .map(|key| {
                let ped = self.entries[key];
                PedestalEntry {
                    detector: key.detector,
                    plane: key.plane,
                    strip: key.strip,
                    mean: ped.mean,
                    rms: ped.rms,
                }
            })
            .collect();
        let yaml_str = serde_yaml::to_string(&list)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningSum {
    count: u64,
    sum: f64,
    sum2: f64,
}

/// Collects strip levels over a pedestal run
#[derive(Debug, Clone, Default)]
pub struct PedestalAccumulator {
    sums: FxHashMap<StripKey, RunningSum>,
}

impl PedestalAccumulator {
    pub fn add(&mut self, key: StripKey, level: f32) {
        let entry = self.sums.entry(key).or_default();
        entry.count += 1;
        entry.sum += level as f64;
        entry.sum2 += (level as f64).powi(2);
    }

    /// Absorb the sums of another accumulator
    pub fn merge(&mut self, other: PedestalAccumulator) {
        for (key, other) in other.sums {
            let entry = self.sums.entry(key).or_default();
            entry.count += other.count;
            entry.sum += other.sum;
            entry.sum2 += other.sum2;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Mean and rms of every strip seen so far
    pub fn finish(&self) -> PedestalTable {
        let mut table = PedestalTable::default();
        for (key, sums) in self.sums.iter() {
            if sums.count == 0 {
                continue;
            }
            let n = sums.count as f64;
            let mean = sums.sum / n;
            let variance = (sums.sum2 / n - mean * mean).max(0.0);
            table.insert(
                *key,
                Pedestal {
                    mean: mean as f32,
                    rms: variance.sqrt() as f32,
                },
            );
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(strip: i32) -> StripKey {
        StripKey {
            detector: DetectorId::Gem1,
            plane: PlaneType::X,
            strip,
        }
    }

    #[test]
    fn test_physics_mode() {
        let pedestal = Pedestal {
            mean: 100.0,
            rms: 4.0,
        };
        // average 30 above pedestal, threshold 5 * 4 = 20
        let out = process_strip(ApvMode::Physics, &[120.0, 140.0, 130.0], &pedestal, 5.0);
        assert_eq!(out, StripOutput::Hit(40.0));
        let out = process_strip(ApvMode::Physics, &[110.0, 115.0, 120.0], &pedestal, 5.0);
        assert_eq!(out, StripOutput::Suppressed);
        let out = process_strip(ApvMode::Physics, &[], &pedestal, 5.0);
        assert_eq!(out, StripOutput::Suppressed);
    }

    #[test]
    fn test_pedestal_mode() {
        let out = process_strip(ApvMode::Pedestal, &[10.0, 20.0, 30.0], &Pedestal::default(), 5.0);
        assert_eq!(out, StripOutput::Level(20.0));
    }

    #[test]
    fn test_accumulator() {
        let mut acc = PedestalAccumulator::default();
        acc.add(key(3), 98.0);
        acc.add(key(3), 102.0);
        let mut other = PedestalAccumulator::default();
        other.add(key(3), 100.0);
        other.add(key(3), 100.0);
        other.add(key(7), 50.0);
        acc.merge(other);
        let table = acc.finish();
        assert_eq!(table.len(), 2);
        let ped = table.get(&key(3));
        assert!((ped.mean - 100.0).abs() < 1e-6);
        assert!((ped.rms - 2.0_f32.sqrt()).abs() < 1e-5);
        assert_eq!(table.get(&key(7)).rms, 0.0);
        assert_eq!(table.get(&key(8)), Pedestal::default());
    }

    #[test]
    fn test_table_file() {
        let mut table = PedestalTable::default();
        table.insert(key(1), Pedestal { mean: 10.0, rms: 1.5 });
        let path = std::env::temp_dir().join("prad_recon_pedestal_test.yaml");
        table.write_file(&path).unwrap();
        let read = PedestalTable::read_file(&path).unwrap();
        assert_eq!(read.get(&key(1)), Pedestal { mean: 10.0, rms: 1.5 });
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            PedestalTable::read_file(&path),
            Err(PedestalError::BadFilePath(_))
        ));
    }
}
