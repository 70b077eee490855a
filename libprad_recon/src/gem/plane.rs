use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use super::cluster::GemClusterMethod;
use super::strip::{StripCluster, StripHit};
use crate::constants::{
    APV_CHANNELS, STRIP_PITCH, X_PLANE_APVS, X_PLANE_OVERLAP_STRIPS, X_PLANE_SIZE, X_STRIP_MAX,
    X_STRIP_MIN, Y_PLANE_APVS, Y_PLANE_SIZE,
};

/// The two readout planes of a GEM detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlaneType {
    X,
    Y,
}

impl PlaneType {
    pub const ALL: [PlaneType; 2] = [PlaneType::X, PlaneType::Y];

    pub fn index(&self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
        }
    }
}

impl std::fmt::Display for PlaneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
        }
    }
}

/// One readout plane: its geometry, the APVs attached to it and the hits of the event
#[derive(Debug, Clone)]
pub struct GemPlane {
    kind: PlaneType,
    size: f32,
    pitch: f32,
    orient: f32,
    n_strips: usize,
    /// Indices into the detector APV arena
    pub(crate) apvs: Vec<usize>,
    fired: BitVec,
    hits: Vec<StripHit>,
    clusters: Vec<StripCluster>,
}

impl GemPlane {
    pub fn new(kind: PlaneType, size: f32, pitch: f32, orient: f32, n_strips: usize) -> Self {
        Self {
            kind,
            size,
            pitch,
            orient,
            n_strips,
            apvs: Vec::new(),
            fired: bitvec![0; n_strips],
            hits: Vec::new(),
            clusters: Vec::new(),
        }
    }

    /// A PRad plane of the given type with no APV connected yet
    pub fn prad(kind: PlaneType) -> Self {
        let (size, n_apvs) = match kind {
            PlaneType::X => (X_PLANE_SIZE, X_PLANE_APVS),
            PlaneType::Y => (Y_PLANE_SIZE, Y_PLANE_APVS),
        };
        Self::new(kind, size, STRIP_PITCH, 1.0, n_apvs * APV_CHANNELS)
    }

    pub fn kind(&self) -> PlaneType {
        self.kind
    }

    pub fn n_strips(&self) -> usize {
        self.n_strips
    }

    pub fn apv_count(&self) -> usize {
        self.apvs.len()
    }

    /// Position of a strip along the plane axis, in the detector frame (mm)
    pub fn strip_position(&self, strip: i32) -> f32 {
        let offset = match self.kind {
            // the two halves of the X plane overlap by a few strips
            PlaneType::X => -0.5 * (self.size + X_PLANE_OVERLAP_STRIPS * self.pitch),
            PlaneType::Y => -0.5 * self.size,
        };
        self.orient * (offset + self.pitch * strip as f32)
    }

    /// Add a strip hit for the current event. Returns false if the strip was rejected
    pub fn add_strip_hit(&mut self, strip: i32, charge: f32, cross_talk: bool) -> bool {
        if self.kind == PlaneType::X && !(X_STRIP_MIN..=X_STRIP_MAX).contains(&strip) {
            return false;
        }
        if strip < 0 || strip as usize >= self.n_strips {
            spdlog::warn!(
                "Strip {} is outside of GEM plane {} ({} strips), skipping it",
                strip,
                self.kind,
                self.n_strips
            );
            return false;
        }
        if self.fired[strip as usize] {
            spdlog::warn!(
                "Strip {} of GEM plane {} fired twice, keeping the first hit",
                strip,
                self.kind
            );
            return false;
        }
        self.fired.set(strip as usize, true);
        let mut hit = StripHit::new(strip, charge, self.strip_position(strip));
        hit.cross_talk = cross_talk;
        self.hits.push(hit);
        true
    }

    pub fn hits(&self) -> &[StripHit] {
        &self.hits
    }

    pub fn clusters(&self) -> &[StripCluster] {
        &self.clusters
    }

    pub fn form_clusters(&mut self, method: &GemClusterMethod) {
        self.clusters = method.form_clusters(&self.hits);
    }

    /// Reset the hits and clusters of the plane
    pub fn clear(&mut self) {
        self.fired.fill(false);
        self.hits.clear();
        self.clusters.clear();
    }
}
