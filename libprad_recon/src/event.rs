// Event records read from and written to disk. Both are YAML documents:
//
// input:  a list of RawEvent, each with calibrated module energies and GEM strip samples
// output: a ReconOutput with the run number, a creation stamp and one ReconEvent per event
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::coord::DetectorId;
use super::error::EventFileError;
use super::gem::detector::GemHit;
use super::gem::plane::PlaneType;
use super::hycal::hit::HyCalHit;
use super::matching::MatchedIndex;

/// Calibrated energy (MeV) of one HyCal module
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModuleEnergy {
    pub id: i32,
    pub energy: f32,
}

/// Time samples of one GEM strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemStripData {
    pub detector: DetectorId,
    pub plane: PlaneType,
    pub strip: i32,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_number: u64,
    #[serde(default)]
    pub modules: Vec<ModuleEnergy>,
    #[serde(default)]
    pub gem: Vec<GemStripData>,
}

/// Number of hits dropped because of the per event capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowCounts {
    pub hycal: usize,
    pub gem1: usize,
    pub gem2: usize,
}

impl OverflowCounts {
    pub fn total(&self) -> usize {
        self.hycal + self.gem1 + self.gem2
    }
}

/// Everything reconstructed from one event, in the beam line frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconEvent {
    pub event_number: u64,
    pub hycal_hits: Vec<HyCalHit>,
    pub gem1_hits: Vec<GemHit>,
    pub gem2_hits: Vec<GemHit>,
    pub matches: Vec<MatchedIndex>,
    pub overflow: OverflowCounts,
}

/// Read every event of an event file
pub fn read_event_file(path: &Path) -> Result<Vec<RawEvent>, EventFileError> {
    if !path.exists() {
        return Err(EventFileError::BadFilePath(path.to_path_buf()));
    }
    let yaml_str = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str::<Vec<RawEvent>>(&yaml_str)?)
}

/// The output document of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconOutput {
    pub created: String,
    pub run_number: i32,
    pub events: Vec<ReconEvent>,
}

impl ReconOutput {
    pub fn new(run_number: i32, events: Vec<ReconEvent>) -> Result<Self, EventFileError> {
        Ok(Self {
            created: OffsetDateTime::now_utc().format(&Rfc3339)?,
            run_number,
            events,
        })
    }

    pub fn write_file(&self, path: &Path) -> Result<(), EventFileError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml_str)?;
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_events() {
        let yaml_str = "
- event_number: 7
  modules:
    - { id: 1562, energy: 850.5 }
    - { id: 1563, energy: 40.0 }
  gem:
    - { detector: Gem1, plane: X, strip: 700, samples: [10.0, 40.0, 30.0] }
- event_number: 8
";
        let events: Vec<RawEvent> = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].modules[0].id, 1562);
        assert_eq!(events[0].gem[0].plane, PlaneType::X);
        assert_eq!(events[0].gem[0].detector, DetectorId::Gem1);
        assert!(events[1].modules.is_empty());
        assert!(events[1].gem.is_empty());
    }

    #[test]
    fn test_missing_event_file() {
        assert!(matches!(
            read_event_file(Path::new("/not/a/real/events.yaml")),
            Err(EventFileError::BadFilePath(_))
        ));
    }

    #[test]
    fn test_output_file() {
        let event = ReconEvent {
            event_number: 3,
            hycal_hits: vec![HyCalHit {
                cid: 1562,
                energy: 900.0,
                ..Default::default()
            }],
            ..Default::default()
        };
        let output = ReconOutput::new(1288, vec![event.clone()]).unwrap();
        assert!(!output.created.is_empty());
        let path = std::env::temp_dir().join("prad_recon_output_test.yaml");
        output.write_file(&path).unwrap();
        let read = ReconOutput::read_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read.run_number, 1288);
        assert_eq!(read.events, vec![event]);
    }
}
