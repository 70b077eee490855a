//! # prad_recon
//!
//! prad_recon is the PRad HyCal and GEM event reconstruction, written in Rust. It takes
//! calibrated HyCal module energies and GEM strip samples, clusters them into hits,
//! moves every hit into the beam line frame and matches the HyCal hits with the GEM hits.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./prad_recon_cli` from the top
//! level prad_recon repository. To use the CLI see the `prad_recon_cli` README.
//!
//! ## Configuration
//!
//! A run is described by a YAML configuration:
//!
//! ```yml
//! event_path: None
//! output_path: None
//! recon_config_path: null
//! coord_path: null
//! calib_path: null
//! pedestal_path: null
//! pedestal_run: false
//! run_number: 0
//! n_threads: 1
//! ```
//!
//! - `event_path`: YAML list of events, each with its module energies and GEM strip samples
//! - `output_path`: where the reconstructed events (or the pedestal table) are written
//! - `recon_config_path`: reconstruction settings. If `null` the defaults are used
//! - `coord_path`: detector coordinate database. If `null` the nominal PRad positions are used
//! - `calib_path`: YAML list of HyCal module calibrations, `{ id, base_energy, non_linear }`.
//!   If `null` no non-linearity correction is applied
//! - `pedestal_path`: GEM strip pedestals. If `null` every pedestal is zero
//! - `pedestal_run`: accumulate pedestals instead of reconstructing
//! - `n_threads`: number of workers the events are divided amongst. Must be at least 1.
//!
//! ### Reconstruction Settings
//!
//! The settings file is a YAML mapping of keys to values, for example
//!
//! ```yml
//! Cluster Method: Primex
//! Min Cluster Energy: 50.0
//! Leakage Iterations: 3
//! SPLIT_CLUSTER_DIFF: 14.0
//! Dead Modules: [1562, 2011]
//! ```
//!
//! A missing or malformed value is replaced by its default and a warning is logged.
//!
//! ### Coordinate Database
//!
//! A YAML list of detector coordinates. For a run, the entries with the largest run number
//! not after the run are used. Angles are in radians.
//!
//! ```yml
//! - { run_number: 1000, det: HyCal, x: 0.0, y: 0.0, z: 5817.0, theta_x: 0.0, theta_y: 0.0, theta_z: 0.0 }
//! ```
//!
//! ## Output
//!
//! prad_recon will output two files: the reconstructed events as YAML and a log file. The
//! output document is
//!
//! ```text
//! created: <RFC 3339 time stamp>
//! run_number: <run>
//! events:
//! |---- event_number, overflow
//! |---- hycal_hits - cid, flag, x, y, z, energy, lin_corr, leakage, nblocks, npos
//! |---- gem1_hits, gem2_hits - det, x, y, z, x_charge, y_charge, x_peak, y_peak, x_size, y_size
//! |---- matches - hycal, gem1, gem2, gem1_candidates, gem2_candidates, best, flag
//! ```
//!
//! Hits are in the beam line frame, in mm. Match indices point into the hit lists of the
//! same event.
pub mod config;
pub mod constants;
pub mod coord;
pub mod error;
pub mod event;
pub mod gem;
pub mod hycal;
pub mod matching;
pub mod process;
pub mod recon_config;
pub mod reconstructor;
pub mod worker_status;
