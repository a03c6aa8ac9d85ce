/*!
 * Types and functions for working with clusters.
 *
 * A cluster describes the aggregate properties of a group of nearby visible records, recomputed
 * whenever the visible set or the zoom level changes.
 */

pub use cluster::{Cluster, ClusterId, Member};
pub use cluster_set::ClusterSet;
pub use index::SpatialClusterIndex;

mod cluster;
mod cluster_set;
mod index;
