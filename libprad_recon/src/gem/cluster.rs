// GEM strip clustering. The hits of one plane go through four steps:
//
// 1. sort by strip and group runs of strips with no gap larger than one
// 2. split groups at charge valleys (a drop and a following rise both larger than the
//    split threshold); the valley strip is shared, with half of its charge in each half
// 3. drop groups that are too small or too large
// 4. compute the charge weighted position of what is left
//
// Clusters whose peak is below the cross talk threshold are flagged and removed before
// X and Y clusters are crossed into 2D hits.
use super::detector::GemHit;
use super::strip::{StripCluster, StripHit};
use crate::constants::MAX_GEM_HITS;
use crate::coord::DetectorId;
use crate::recon_config::GemSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct GemClusterMethod {
    min_cluster_hits: usize,
    max_cluster_hits: usize,
    split_cluster_diff: f32,
    cross_talk_threshold: f32,
}

impl GemClusterMethod {
    pub fn new(settings: &GemSettings) -> Self {
        Self {
            min_cluster_hits: settings.min_cluster_hits,
            max_cluster_hits: settings.max_cluster_hits,
            split_cluster_diff: settings.split_cluster_diff,
            cross_talk_threshold: settings.cross_talk_threshold,
        }
    }

    /// Sort the hits and group runs of neighboring strips
    pub fn group_hits(&self, hits: &[StripHit]) -> Vec<StripCluster> {
        let mut sorted = hits.to_vec();
        sorted.sort_by_key(|h| h.strip);

        let mut clusters: Vec<StripCluster> = Vec::new();
        for hit in sorted {
            match clusters.last_mut() {
                Some(cluster) if cluster.hits.last().is_some_and(|l| hit.strip - l.strip <= 1) => {
                    cluster.hits.push(hit);
                }
                _ => {
                    clusters.push(StripCluster::new(vec![hit]));
                }
            }
        }
        clusters
    }

    // Index of the first valley of a cluster, if any
    fn find_valley(&self, hits: &[StripHit]) -> Option<usize> {
        if hits.len() < 3 {
            return None;
        }
        let mut descending = false;
        let mut minimum = 0;
        for i in 0..hits.len() - 1 {
            let (charge, next) = (hits[i].charge, hits[i + 1].charge);
            if descending {
                if charge < hits[minimum].charge {
                    minimum = i;
                }
                if next - charge > self.split_cluster_diff {
                    return Some(minimum);
                }
            } else if charge - next > self.split_cluster_diff {
                descending = true;
                minimum = i + 1;
            }
        }
        None
    }

    /// Split clusters at their charge valleys until none is left
    pub fn split_cluster(&self, clusters: &mut Vec<StripCluster>) {
        let mut i = 0;
        while i < clusters.len() {
            match self.find_valley(&clusters[i].hits) {
                Some(valley) => {
                    let cluster = &mut clusters[i];
                    cluster.hits[valley].charge /= 2.0;
                    let right = cluster.hits.split_off(valley);
                    cluster.hits.push(right[0]);
                    clusters.insert(i + 1, StripCluster::new(right));
                    // the left half may hold another valley
                }
                None => i += 1,
            }
        }
    }

    /// Remove clusters with a size outside of the allowed range
    pub fn filter_cluster(&self, clusters: &mut Vec<StripCluster>) {
        clusters.retain(|c| (self.min_cluster_hits..=self.max_cluster_hits).contains(&c.size()));
    }

    /// Flag clusters whose peak charge is below the cross talk threshold
    pub fn flag_cross_talk(&self, clusters: &mut [StripCluster]) {
        if self.cross_talk_threshold <= 0.0 {
            return;
        }
        for cluster in clusters.iter_mut() {
            if cluster.peak_charge < self.cross_talk_threshold {
                cluster.cross_talk = true;
                cluster.hits.iter_mut().for_each(|h| h.cross_talk = true);
            }
        }
    }

    /// Full clustering of the hits of one plane
    pub fn form_clusters(&self, hits: &[StripHit]) -> Vec<StripCluster> {
        let mut clusters = self.group_hits(hits);
        self.split_cluster(&mut clusters);
        self.filter_cluster(&mut clusters);
        clusters.iter_mut().for_each(StripCluster::reconstruct);
        self.flag_cross_talk(&mut clusters);
        clusters.retain(|c| !c.cross_talk);
        clusters
    }

    /// Cross every X cluster with every Y cluster, up to the hit capacity.
    /// Returns the hits and the number of combinations dropped.
    pub fn cartesian_hits(
        &self,
        det: DetectorId,
        x_clusters: &[StripCluster],
        y_clusters: &[StripCluster],
    ) -> (Vec<GemHit>, usize) {
        let total = x_clusters.len() * y_clusters.len();
        let mut hits = Vec::with_capacity(total.min(MAX_GEM_HITS));
        for xc in x_clusters {
            for yc in y_clusters {
                if hits.len() >= MAX_GEM_HITS {
                    return (hits, total - MAX_GEM_HITS);
                }
                hits.push(GemHit {
                    det,
                    x: xc.position,
                    y: yc.position,
                    z: 0.0,
                    x_charge: xc.total_charge,
                    y_charge: yc.total_charge,
                    x_peak: xc.peak_charge,
                    y_peak: yc.peak_charge,
                    x_size: xc.size(),
                    y_size: yc.size(),
                });
            }
        }
        (hits, 0)
    }
}
