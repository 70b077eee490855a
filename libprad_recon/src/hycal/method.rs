use std::sync::Arc;

use super::island::IslandCluster;
use super::module::{ModuleCluster, ModuleHit};
use super::primex::PrimexCluster;
use super::profile::ClusterProfile;
use super::square::SquareCluster;
use crate::recon_config::{ClusterMethodKind, HyCalSettings};

/// The capability shared by all HyCal clustering algorithms
pub trait FormClusters {
    /// Group the module hits of one event into clusters, replacing the content of `clusters`
    fn form_clusters(&self, hits: &[ModuleHit], clusters: &mut Vec<ModuleCluster>);
}

/// The configured clustering algorithm
#[derive(Debug, Clone)]
pub enum ClusterMethod {
    Square(SquareCluster),
    Island(IslandCluster),
    Primex(PrimexCluster),
}

impl ClusterMethod {
    pub fn new(settings: &HyCalSettings, profile: Arc<ClusterProfile>) -> Self {
        match settings.method {
            ClusterMethodKind::Square => Self::Square(SquareCluster::new(settings)),
            ClusterMethodKind::Island => Self::Island(IslandCluster::new(settings, profile)),
            ClusterMethodKind::Primex => Self::Primex(PrimexCluster::new(settings, profile)),
        }
    }

    pub fn kind(&self) -> ClusterMethodKind {
        match self {
            Self::Square(_) => ClusterMethodKind::Square,
            Self::Island(_) => ClusterMethodKind::Island,
            Self::Primex(_) => ClusterMethodKind::Primex,
        }
    }
}

impl FormClusters for ClusterMethod {
    fn form_clusters(&self, hits: &[ModuleHit], clusters: &mut Vec<ModuleCluster>) {
        match self {
            Self::Square(m) => m.form_clusters(hits, clusters),
            Self::Island(m) => m.form_clusters(hits, clusters),
            Self::Primex(m) => m.form_clusters(hits, clusters),
        }
    }
}
