use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Reconstruction settings must be a YAML mapping of keys to values")]
    NotAMapping,
}

#[derive(Debug, Error)]
pub enum CalibError {
    #[error("Could not open calibration file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum CoordError {
    #[error("Failed to load coordinates as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Coordinate system failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Coordinate system failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Coordinate database is empty")]
    NoEntries,
    #[error("Run {0} does not define coordinates for detector {1}")]
    MissingDetector(i32, String),
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Event file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Failed to format the output creation time: {0}")]
    TimeFormatError(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum PedestalError {
    #[error("Pedestal table failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Pedestal table failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Could not open pedestal file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to calibration error: {0}")]
    CalibError(#[from] CalibError),
    #[error("Processor failed due to coordinate error: {0}")]
    CoordError(#[from] CoordError),
    #[error("Processor failed due to event file error: {0}")]
    EventFileError(#[from] EventFileError),
    #[error("Processor failed due to pedestal error: {0}")]
    PedestalError(#[from] PedestalError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Processor failed to convert output to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Processor was given an invalid number of workers: {0}")]
    BadWorkerCount(i32),
    #[error("A reconstruction worker panicked")]
    WorkerPanic,
}
