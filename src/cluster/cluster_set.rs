use crate::{
    cluster::{Cluster, ClusterId, Member},
    geo::BoundingBox,
};

/**
 * The output of one processing pass of the cluster index.
 *
 * Clusters of two or more records get a pie chart icon, a group of one degenerates to a plain
 * marker and is listed with the singles instead.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSet {
    /// The zoom level this set was computed for.
    pub zoom: f64,
    /// Clusters with a population of at least 2, in creation order.
    pub clusters: Vec<Cluster>,
    /// Records not grouped with any other, in registration order.
    pub singles: Vec<Member>,
    /// Length of each cluster's stats vector.
    num_categories: usize,
}

impl ClusterSet {
    pub(crate) fn new(
        zoom: f64,
        clusters: Vec<Cluster>,
        singles: Vec<Member>,
        num_categories: usize,
    ) -> Self {
        ClusterSet {
            zoom,
            clusters,
            singles,
            num_categories,
        }
    }

    /// A set with nothing in it.
    pub fn empty(zoom: f64, num_categories: usize) -> Self {
        Self::new(zoom, vec![], vec![], num_categories)
    }

    /// `true` when there was nothing visible to cluster, callers show a "nothing found" state.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.singles.is_empty()
    }

    /// Total number of visible records, clustered or not.
    pub fn population(&self) -> u32 {
        self.clusters.iter().map(|c| c.population).sum::<u32>() + self.singles.len() as u32
    }

    /// Visible record counts per category over the whole set.
    pub fn stats(&self) -> Vec<u32> {
        let mut stats = vec![0u32; self.num_categories];

        for cluster in &self.clusters {
            for (total, n) in stats.iter_mut().zip(&cluster.stats) {
                *total += n;
            }
        }

        for single in &self.singles {
            stats[single.category.index()] += 1;
        }

        stats
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// Bounds around every visible record.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let cluster_boxes = self.clusters.iter().map(|c| c.bounds);
        let single_boxes = self.singles.iter().map(|s| BoundingBox {
            ll: s.position,
            ur: s.position,
        });

        cluster_boxes
            .chain(single_boxes)
            .reduce(|acc, b| acc.union(&b))
    }

    /// The clusters and singles whose icons fall inside `area`.
    pub fn in_area(&self, area: &BoundingBox) -> (Vec<&Cluster>, Vec<&Member>) {
        let clusters = self
            .clusters
            .iter()
            .filter(|c| area.contains(c.position))
            .collect();
        let singles = self
            .singles
            .iter()
            .filter(|s| area.contains(s.position))
            .collect();

        (clusters, singles)
    }
}
