use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::coord::CoordSystem;
use super::error::{CalibError, ConfigError, CoordError, PedestalError};
use super::gem::apv::PedestalTable;
use super::hycal::detector::{read_calib_file, ModuleCalib};
use super::recon_config::{ConfigWarning, ReconConfig};

/// Structure representing the application configuration. Contains pathing and run information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub event_path: PathBuf,
    pub output_path: PathBuf,
    pub recon_config_path: Option<PathBuf>,
    pub coord_path: Option<PathBuf>,
    pub calib_path: Option<PathBuf>,
    pub pedestal_path: Option<PathBuf>,
    pub pedestal_run: bool,
    pub run_number: i32,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. All fields will be empty/invalid
    fn default() -> Self {
        Self {
            event_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            recon_config_path: None,
            coord_path: None,
            calib_path: None,
            pedestal_path: None,
            pedestal_run: false,
            run_number: 0,
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Load the reconstruction settings, or the defaults if no file is given
    pub fn load_recon_config(&self) -> Result<(ReconConfig, Vec<ConfigWarning>), ConfigError> {
        match &self.recon_config_path {
            Some(path) => ReconConfig::read_config_file(path),
            None => Ok((ReconConfig::default(), Vec::new())),
        }
    }

    /// Load the detector coordinates of the run, or the nominal ones if no file is given
    pub fn load_coords(&self) -> Result<CoordSystem, CoordError> {
        match &self.coord_path {
            Some(path) => CoordSystem::read_file(path, self.run_number),
            None => Ok(CoordSystem::default()),
        }
    }

    /// Load the HyCal module calibrations. Without a file every module is uncalibrated
    pub fn load_calib(&self) -> Result<Vec<ModuleCalib>, CalibError> {
        match &self.calib_path {
            Some(path) => read_calib_file(path),
            None => Ok(Vec::new()),
        }
    }

    /// Load the GEM pedestals, or an empty table if no file is given
    pub fn load_pedestals(&self) -> Result<PedestalTable, PedestalError> {
        match &self.pedestal_path {
            Some(path) => PedestalTable::read_file(path),
            None => Ok(PedestalTable::default()),
        }
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}
