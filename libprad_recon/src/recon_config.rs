// Reconstruction settings are a flat YAML mapping whose keys are the human readable
// names used by the PRad configuration files, e.g.
//
//   Min Module Energy: 1.0
//   Square Size: 5
//   SPLIT_CLUSTER_DIFF: 14
//
// A missing or malformed value is never fatal: the default is used and a warning is
// logged and handed back to the caller.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::Path;

use super::error::ConfigError;

/// Which HyCal clustering algorithm to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterMethodKind {
    Square,
    #[default]
    Island,
    Primex,
}

/// Settings of the HyCal clustering and cluster reconstruction
#[derive(Debug, Clone, PartialEq)]
pub struct HyCalSettings {
    pub method: ClusterMethodKind,
    pub min_module_energy: f32,
    pub min_center_energy: f32,
    pub min_cluster_energy: f32,
    pub min_cluster_size: usize,
    pub log_weight_threshold: f32,
    pub leak_iters: usize,
    pub least_leak: f32,
    pub nonlin_limit: f32,
    pub depth_corr: bool,
    pub square_size: usize,
    pub corner_connection: bool,
    pub split_iter: usize,
    pub least_split: f32,
}

impl Default for HyCalSettings {
    fn default() -> Self {
        Self {
            method: ClusterMethodKind::default(),
            min_module_energy: 1.0,
            min_center_energy: 10.0,
            min_cluster_energy: 50.0,
            min_cluster_size: 1,
            log_weight_threshold: 3.6,
            leak_iters: 3,
            least_leak: 0.05,
            nonlin_limit: 0.6,
            depth_corr: true,
            square_size: 5,
            corner_connection: false,
            split_iter: 6,
            least_split: 0.01,
        }
    }
}

/// Settings of the GEM strip clustering
#[derive(Debug, Clone, PartialEq)]
pub struct GemSettings {
    pub min_cluster_hits: usize,
    pub max_cluster_hits: usize,
    pub split_cluster_diff: f32,
    pub cross_talk_threshold: f32,
    pub zero_sup_threshold: f32,
}

impl Default for GemSettings {
    fn default() -> Self {
        Self {
            min_cluster_hits: 1,
            max_cluster_hits: 20,
            split_cluster_diff: 14.0,
            cross_talk_threshold: 0.0,
            zero_sup_threshold: 5.0,
        }
    }
}

/// Settings of the HyCal-GEM matching
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSettings {
    pub match_sigma: f32,
    pub pwo_resolution: f32,
    pub glass_resolution: f32,
    pub transition_resolution: f32,
    pub target_z: f32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            match_sigma: 3.0,
            pwo_resolution: 2.5,
            glass_resolution: 6.5,
            transition_resolution: 5.0,
            target_z: 0.0,
        }
    }
}

/// A setting that could not be read and was replaced by its default
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub key: String,
    pub reason: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "setting '{}' {}", self.key, self.reason)
    }
}

/// All the reconstruction settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconConfig {
    pub hycal: HyCalSettings,
    pub gem: GemSettings,
    pub matching: MatchSettings,
    pub dead_modules: Vec<i32>,
}

// Helper that pulls typed values out of the mapping and records what went wrong
struct KeyValues {
    map: Mapping,
    warnings: Vec<ConfigWarning>,
}

impl KeyValues {
    fn value<T: DeserializeOwned + fmt::Debug>(&mut self, key: &str, default: T) -> T {
        match self.map.remove(key) {
            Some(v) => match serde_yaml::from_value::<T>(v) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.warn(key, format!("is malformed ({e}), using default {default:?}"));
                    default
                }
            },
            None => {
                self.warn(key, format!("is missing, using default {default:?}"));
                default
            }
        }
    }

    fn warn(&mut self, key: &str, reason: String) {
        let warning = ConfigWarning {
            key: key.to_string(),
            reason,
        };
        spdlog::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

impl ReconConfig {
    /// Read settings from a YAML file
    pub fn read_config_file(path: &Path) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        if !path.exists() {
            return Err(ConfigError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml_str)
    }

    /// Parse settings from YAML text. Returns the settings and the list of substituted defaults
    pub fn from_yaml_str(yaml_str: &str) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let map = if yaml_str.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(yaml_str)? {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => return Err(ConfigError::NotAMapping),
            }
        };
        let mut kv = KeyValues {
            map,
            warnings: Vec::new(),
        };

        let h = HyCalSettings::default();
        let hycal = HyCalSettings {
            method: kv.value("Cluster Method", h.method),
            min_module_energy: kv.value("Min Module Energy", h.min_module_energy),
            min_center_energy: kv.value("Min Center Energy", h.min_center_energy),
            min_cluster_energy: kv.value("Min Cluster Energy", h.min_cluster_energy),
            min_cluster_size: kv.value("Minimum Cluster Size", h.min_cluster_size),
            log_weight_threshold: kv.value("Log Weight Threshold", h.log_weight_threshold),
            leak_iters: kv.value("Leakage Iterations", h.leak_iters),
            least_leak: kv.value("Least Leakage Fraction", h.least_leak),
            nonlin_limit: kv.value("Non Linearity Limit", h.nonlin_limit),
            depth_corr: kv.value("Shower Depth Correction", h.depth_corr),
            square_size: kv.value("Square Size", h.square_size),
            corner_connection: kv.value("Corner Connection", h.corner_connection),
            split_iter: kv.value("Split Iteration", h.split_iter),
            least_split: kv.value("Least Split Fraction", h.least_split),
        };

        let g = GemSettings::default();
        let gem = GemSettings {
            min_cluster_hits: kv.value("MIN_CLUSTER_HITS", g.min_cluster_hits),
            max_cluster_hits: kv.value("MAX_CLUSTER_HITS", g.max_cluster_hits),
            split_cluster_diff: kv.value("SPLIT_CLUSTER_DIFF", g.split_cluster_diff),
            cross_talk_threshold: kv.value("CROSS_TALK_THRESHOLD", g.cross_talk_threshold),
            zero_sup_threshold: kv.value("Zero Suppression Threshold", g.zero_sup_threshold),
        };

        let m = MatchSettings::default();
        let matching = MatchSettings {
            match_sigma: kv.value("Matching Sigma", m.match_sigma),
            pwo_resolution: kv.value("PbWO4 Resolution", m.pwo_resolution),
            glass_resolution: kv.value("PbGlass Resolution", m.glass_resolution),
            transition_resolution: kv.value("Transition Resolution", m.transition_resolution),
            target_z: kv.value("Target Z", m.target_z),
        };

        let dead_modules = kv.value("Dead Modules", Vec::<i32>::new());

        for key in kv.map.keys() {
            spdlog::warn!("Unrecognized reconstruction setting {:?} is ignored", key);
        }

        Ok((
            Self {
                hycal,
                gem,
                matching,
                dead_modules,
            },
            kv.warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let yaml = "
Min Module Energy: 2.5
Square Size: 3
Cluster Method: Square
Shower Depth Correction: false
SPLIT_CLUSTER_DIFF: 20
Dead Modules: [1, 1100]
";
        let (config, warnings) = ReconConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.hycal.min_module_energy, 2.5);
        assert_eq!(config.hycal.square_size, 3);
        assert_eq!(config.hycal.method, ClusterMethodKind::Square);
        assert!(!config.hycal.depth_corr);
        assert_eq!(config.gem.split_cluster_diff, 20.0);
        assert_eq!(config.dead_modules, vec![1, 1100]);
        assert!(warnings.iter().all(|w| w.key != "Square Size"));
        assert!(warnings.iter().any(|w| w.key == "Min Cluster Energy"));
    }

    #[test]
    fn test_malformed_value_uses_default() {
        let (config, warnings) =
            ReconConfig::from_yaml_str("Leakage Iterations: lots\n").unwrap();
        assert_eq!(config.hycal.leak_iters, HyCalSettings::default().leak_iters);
        let warning = warnings
            .iter()
            .find(|w| w.key == "Leakage Iterations")
            .unwrap();
        assert!(warning.reason.contains("malformed"));
    }

    #[test]
    fn test_empty_settings() {
        let (config, warnings) = ReconConfig::from_yaml_str("").unwrap();
        assert_eq!(config, ReconConfig::default());
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_not_a_mapping() {
        assert!(ReconConfig::from_yaml_str("- 1\n- 2\n").is_err());
    }
}
