/// One GEM strip above threshold in the current event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StripHit {
    pub strip: i32,
    pub charge: f32,
    /// Position of the strip along the plane axis (mm)
    pub position: f32,
    pub cross_talk: bool,
}

impl StripHit {
    pub fn new(strip: i32, charge: f32, position: f32) -> Self {
        Self {
            strip,
            charge,
            position,
            cross_talk: false,
        }
    }
}

/// A group of neighboring strips of one plane.
///
/// Hits are sorted by strip and no gap between consecutive strips is larger than one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StripCluster {
    pub position: f32,
    pub peak_charge: f32,
    pub total_charge: f32,
    pub cross_talk: bool,
    pub hits: Vec<StripHit>,
}

impl StripCluster {
    pub fn new(hits: Vec<StripHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn size(&self) -> usize {
        self.hits.len()
    }

    /// Fill position and charges from the hits. An empty or chargeless cluster sits at 0
    pub fn reconstruct(&mut self) {
        self.total_charge = self.hits.iter().map(|h| h.charge).sum();
        self.peak_charge = self.hits.iter().map(|h| h.charge).fold(0.0, f32::max);
        self.position = if self.total_charge > 0.0 {
            self.hits.iter().map(|h| h.position * h.charge).sum::<f32>() / self.total_charge
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hit_cluster() {
        let mut cluster = StripCluster::new(vec![StripHit::new(42, 17.5, -3.2)]);
        cluster.reconstruct();
        assert_eq!(cluster.position, -3.2);
        assert_eq!(cluster.peak_charge, 17.5);
        assert_eq!(cluster.total_charge, 17.5);
    }

    #[test]
    fn test_weighted_position() {
        let mut cluster = StripCluster::new(vec![
            StripHit::new(1, 10.0, 0.0),
            StripHit::new(2, 30.0, 0.4),
        ]);
        cluster.reconstruct();
        assert!((cluster.position - 0.3).abs() < 1e-6);
        assert_eq!(cluster.peak_charge, 30.0);
        assert_eq!(cluster.total_charge, 40.0);
    }

    #[test]
    fn test_zero_charge() {
        let mut cluster = StripCluster::new(vec![StripHit::new(5, 0.0, 12.0)]);
        cluster.reconstruct();
        assert_eq!(cluster.position, 0.0);
        let mut empty = StripCluster::default();
        empty.reconstruct();
        assert_eq!(empty.total_charge, 0.0);
    }
}
