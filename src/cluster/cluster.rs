use crate::{
    category::CategoryId,
    geo::{great_circle_distance, BoundingBox, Coord},
    record::RecordId,
};
use std::fmt::{self, Display};

/// Identifies a cluster within one processing pass. Lower ids were created first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub u32);

impl Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// A visible record as the cluster index sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Member {
    pub id: RecordId,
    pub position: Coord,
    pub category: CategoryId,
}

/**
 * The aggregate properties of a group of nearby, visible, records.
 *
 * Clusters are rebuilt whenever the visible records or the zoom level change, they never outlive
 * the processing pass that made them.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Average position of the members, where the icon goes.
    pub position: Coord,
    /// Minimal rectangle around all the members.
    pub bounds: BoundingBox,
    /// The distance from the cluster center to the farthest member in kilometers.
    pub radius: f64,
    /// The number of members.
    pub population: u32,
    /// Member count per category, indexed by category id. Sums to `population`.
    pub stats: Vec<u32>,
    /// Ids of the members in registration order.
    pub members: Vec<RecordId>,
}

impl Cluster {
    /// Summarize a group of members.
    ///
    /// `num_categories` sets the length of the stats vector. Members must not be empty.
    pub(crate) fn summarize(id: ClusterId, members: &[Member], num_categories: usize) -> Self {
        debug_assert!(!members.is_empty());

        let mut stats = vec![0u32; num_categories];
        let mut bounds = BoundingBox::empty();
        let mut lat = 0.0;
        let mut lon = 0.0;

        for m in members {
            stats[m.category.index()] += 1;
            bounds.extend(m.position);
            lat += m.position.lat;
            lon += m.position.lon;
        }

        let count = members.len() as f64;
        let position = Coord {
            lat: lat / count,
            lon: lon / count,
        };

        let radius = members
            .iter()
            .map(|m| great_circle_distance(m.position.lat, m.position.lon, position.lat, position.lon))
            .fold(0.0, f64::max);

        Cluster {
            id,
            position,
            bounds,
            radius,
            population: members.len() as u32,
            stats,
            members: members.iter().map(|m| m.id).collect(),
        }
    }

    /// Does this cluster hold members of more than one category?
    pub fn is_mixed(&self) -> bool {
        self.stats.iter().filter(|&&n| n > 0).count() > 1
    }
}
