use crate::{
    cluster::{Cluster, ClusterId, ClusterSet, Member},
    config::ClusterOptions,
    geo::{BoundingBox, WorldPixel},
    record::RecordId,
    registry::{MarkerRegistry, PendingChanges},
    viewport::Viewport,
};
use rustc_hash::FxHashMap;

/// A grid cell on the projected plane, `min_distance` pixels on a side.
type Cell = (i64, i64);

/// A cluster under construction.
#[derive(Debug, Clone)]
struct Bucket {
    /// Where the first member landed, other markers are merged by distance to this point.
    anchor: WorldPixel,
    cell: Option<Cell>,
    /// Registry slots and members, sorted by slot.
    slots: Vec<usize>,
    members: Vec<Member>,
    /// Summary for the current members, `None` after any change.
    summary: Option<Cluster>,
}

impl Bucket {
    fn is_alive(&self) -> bool {
        !self.slots.is_empty()
    }
}

/**
 * Groups the visible markers of a [MarkerRegistry] into clusters for a zoom level.
 *
 * Markers are visited in registration order. Each one joins the cluster with the nearest anchor
 * closer than `min_distance` screen pixels, ties going to the cluster created first, or else starts
 * a cluster of its own. Anchors are kept in a hash grid with cells the size of the merge distance,
 * so only the 3x3 block of cells around a marker has to be searched.
 *
 * Batched changes (category toggles, new result sets, zoom changes) trigger a full rebuild, which
 * always yields the same clusters for the same registry state and zoom. Visibility changes of a
 * few single markers are applied locally: a shown marker is placed like it would be at the end of
 * a rebuild, a hidden marker just leaves its cluster.
 */
#[derive(Debug, Clone)]
pub struct SpatialClusterIndex {
    min_distance: f64,
    incremental_limit: usize,
    num_categories: usize,
    zoom: Option<f64>,
    buckets: Vec<Bucket>,
    /// Buckets emptied by incremental updates, still taking up a place in `buckets`.
    dead: usize,
    grid: FxHashMap<Cell, Vec<u32>>,
    assignment: Vec<Option<u32>>,
    snapshot: ClusterSet,
}

impl SpatialClusterIndex {
    pub fn new(options: &ClusterOptions, num_categories: usize) -> Self {
        SpatialClusterIndex {
            min_distance: options.min_distance,
            incremental_limit: options.incremental_limit,
            num_categories,
            zoom: None,
            buckets: vec![],
            dead: 0,
            grid: FxHashMap::default(),
            assignment: vec![],
            snapshot: ClusterSet::empty(0.0, num_categories),
        }
    }

    /// The merge distance in screen pixels.
    pub fn min_distance(&self) -> f64 {
        self.min_distance
    }

    /// The result of the last processing pass.
    pub fn clusters(&self) -> &ClusterSet {
        &self.snapshot
    }

    /// Bring the clusters up to date with the registry and viewport as they are right now.
    ///
    /// Nothing is recomputed if neither the registry nor the zoom level changed since the last
    /// call.
    pub fn process_view(
        &mut self,
        registry: &mut MarkerRegistry,
        viewport: &Viewport,
    ) -> &ClusterSet {
        let pending = registry.take_pending();
        let zoom_changed = self.zoom != Some(viewport.zoom);

        match pending {
            _ if zoom_changed => self.rebuild(registry, viewport.zoom),
            PendingChanges::Everything => self.rebuild(registry, viewport.zoom),
            PendingChanges::Slots(slots) if slots.len() > self.incremental_limit => {
                self.rebuild(registry, viewport.zoom)
            }
            PendingChanges::Slots(slots) => self.update(registry, &slots),
            PendingChanges::None => {}
        }

        &self.snapshot
    }

    /// Throw away all clusters and group every visible marker from scratch.
    pub fn rebuild(&mut self, registry: &MarkerRegistry, zoom: f64) {
        self.zoom = Some(zoom);
        self.buckets.clear();
        self.dead = 0;
        self.grid.clear();
        self.assignment.clear();
        self.assignment.resize(registry.len(), None);

        for (slot, record) in registry.visible() {
            let member = Member {
                id: record.id,
                position: record.position,
                category: record.category,
            };
            self.place(slot, member, zoom);
        }

        self.refresh_snapshot();

        log::debug!(
            "rebuilt clusters at zoom {}: {} clusters, {} singles",
            zoom,
            self.snapshot.clusters.len(),
            self.snapshot.singles.len()
        );
    }

    /// Apply visibility changes of single markers without a rebuild.
    fn update(&mut self, registry: &MarkerRegistry, slots: &[usize]) {
        let zoom = match self.zoom {
            Some(zoom) => zoom,
            None => return,
        };

        if self.assignment.len() < registry.len() {
            self.assignment.resize(registry.len(), None);
        }

        for &slot in slots {
            let marker = match registry.marker(slot) {
                Some(marker) => marker,
                None => continue,
            };

            match (marker.filtered, self.assignment[slot]) {
                (true, Some(bucket_id)) => self.remove(slot, bucket_id),
                (false, None) => {
                    let member = Member {
                        id: marker.record.id,
                        position: marker.record.position,
                        category: marker.record.category,
                    };
                    self.place(slot, member, zoom);
                }
                _ => {}
            }
        }

        self.compact();
        self.refresh_snapshot();

        log::debug!(
            "updated {} markers in place: {} clusters, {} singles",
            slots.len(),
            self.snapshot.clusters.len(),
            self.snapshot.singles.len()
        );
    }

    /// Put a marker in the nearest qualifying cluster, or start a new one.
    fn place(&mut self, slot: usize, member: Member, zoom: f64) {
        let px = member.position.to_world_pixel(zoom);

        let bucket_id = match self.nearest_anchor(px) {
            Some(bucket_id) => bucket_id,
            None => {
                let bucket_id = self.buckets.len() as u32;
                let cell = self.cell_of(px);
                if let Some(cell) = cell {
                    self.grid.entry(cell).or_default().push(bucket_id);
                }

                self.buckets.push(Bucket {
                    anchor: px,
                    cell,
                    slots: vec![],
                    members: vec![],
                    summary: None,
                });

                bucket_id
            }
        };

        let bucket = &mut self.buckets[bucket_id as usize];
        let pos = match bucket.slots.binary_search(&slot) {
            Ok(_) => return,
            Err(pos) => pos,
        };
        bucket.slots.insert(pos, slot);
        bucket.members.insert(pos, member);
        bucket.summary = None;

        self.assignment[slot] = Some(bucket_id);
    }

    /// Take a marker out of its cluster. A cluster left empty is dropped, otherwise it keeps its
    /// anchor.
    fn remove(&mut self, slot: usize, bucket_id: u32) {
        self.assignment[slot] = None;

        let bucket = &mut self.buckets[bucket_id as usize];
        if let Ok(pos) = bucket.slots.binary_search(&slot) {
            bucket.slots.remove(pos);
            bucket.members.remove(pos);
            bucket.summary = None;
        }

        if !bucket.is_alive() {
            self.dead += 1;
            if let Some(cell) = bucket.cell {
                if let Some(ids) = self.grid.get_mut(&cell) {
                    ids.retain(|&id| id != bucket_id);
                    if ids.is_empty() {
                        self.grid.remove(&cell);
                    }
                }
            }
        }
    }

    /// Drop emptied buckets once they make up half of all buckets.
    ///
    /// Live buckets keep their relative order, so ties still go to the cluster created first.
    fn compact(&mut self) {
        if self.dead == 0 || self.dead * 2 < self.buckets.len() {
            return;
        }

        let mut remap: Vec<Option<u32>> = Vec::with_capacity(self.buckets.len());
        let mut kept: Vec<Bucket> = Vec::with_capacity(self.buckets.len() - self.dead);
        for (old_id, mut bucket) in self.buckets.drain(..).enumerate() {
            if !bucket.is_alive() {
                remap.push(None);
                continue;
            }

            let new_id = kept.len();
            if new_id != old_id {
                // The summary carries the old cluster id.
                bucket.summary = None;
            }
            remap.push(Some(new_id as u32));
            kept.push(bucket);
        }

        log::debug!("compacted {} empty clusters", self.dead);

        self.buckets = kept;
        self.dead = 0;

        self.grid.clear();
        for (id, bucket) in self.buckets.iter().enumerate() {
            if let Some(cell) = bucket.cell {
                self.grid.entry(cell).or_default().push(id as u32);
            }
        }

        for assigned in self.assignment.iter_mut() {
            *assigned = assigned.and_then(|old| remap[old as usize]);
        }
    }

    /// The grid cell for a point, `None` when nothing can ever merge.
    fn cell_of(&self, px: WorldPixel) -> Option<Cell> {
        if self.min_distance > 0.0 {
            Some((
                (px.x / self.min_distance).floor() as i64,
                (px.y / self.min_distance).floor() as i64,
            ))
        } else {
            None
        }
    }

    /// Find the bucket with the closest anchor strictly within the merge distance.
    fn nearest_anchor(&self, px: WorldPixel) -> Option<u32> {
        let (cx, cy) = self.cell_of(px)?;

        let mut best: Option<(f64, u32)> = None;
        for x in (cx - 1)..=(cx + 1) {
            for y in (cy - 1)..=(cy + 1) {
                let ids = match self.grid.get(&(x, y)) {
                    Some(ids) => ids,
                    None => continue,
                };

                for &id in ids {
                    let dist = self.buckets[id as usize].anchor.distance(px);
                    if dist >= self.min_distance {
                        continue;
                    }

                    best = match best {
                        Some((best_dist, best_id))
                            if best_dist < dist || (best_dist == dist && best_id < id) =>
                        {
                            Some((best_dist, best_id))
                        }
                        _ => Some((dist, id)),
                    };
                }
            }
        }

        best.map(|(_, id)| id)
    }

    /// Rebuild the output from the buckets, only summarizing buckets that changed.
    fn refresh_snapshot(&mut self) {
        let num_categories = self.num_categories;
        let mut clusters = vec![];
        let mut singles: Vec<(usize, Member)> = vec![];

        for (i, bucket) in self.buckets.iter_mut().enumerate() {
            match bucket.slots.len() {
                0 => {}
                1 => singles.push((bucket.slots[0], bucket.members[0])),
                _ => {
                    if bucket.summary.is_none() {
                        bucket.summary = Some(Cluster::summarize(
                            ClusterId(i as u32),
                            &bucket.members,
                            num_categories,
                        ));
                    }

                    if let Some(summary) = &bucket.summary {
                        clusters.push(summary.clone());
                    }
                }
            }
        }

        singles.sort_unstable_by_key(|(slot, _)| *slot);
        let singles = singles.into_iter().map(|(_, member)| member).collect();

        self.snapshot = ClusterSet::new(
            self.zoom.unwrap_or(0.0),
            clusters,
            singles,
            self.num_categories,
        );
    }

    /// Ids of the visible markers inside `area`, in registration order.
    pub fn markers_in_area(&self, area: &BoundingBox) -> Vec<RecordId> {
        let mut found: Vec<(usize, RecordId)> = vec![];

        for bucket in self.buckets.iter().filter(|b| b.is_alive()) {
            if let Some(summary) = &bucket.summary {
                if !summary.bounds.overlaps(area) {
                    continue;
                }
            }

            for (slot, member) in bucket.slots.iter().zip(&bucket.members) {
                if area.contains(member.position) {
                    found.push((*slot, member.id));
                }
            }
        }

        found.sort_unstable_by_key(|(slot, _)| *slot);
        found.into_iter().map(|(_, id)| id).collect()
    }
}
