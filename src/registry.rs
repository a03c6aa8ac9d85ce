/*!
 * Visibility bookkeeping for the markers on the map.
 *
 * The registry is the single source of truth for whether a record is drawn. Legend checkboxes
 * write to it through the view synchronizer and read their state back from it.
 *
 * Changing flags does not re-cluster anything. Callers batch as many changes as they like and
 * then ask the cluster index to process the view once.
 */
use crate::{
    category::{CategoryId, CategoryRegistry},
    record::{Record, RecordId},
};
use rustc_hash::FxHashMap;

/// A registered record along with its visibility flag.
#[derive(Debug, Clone)]
pub struct Marker {
    pub record: Record,
    /// When `true` the record is excluded from clustering and rendering.
    pub filtered: bool,
}

/// What changed since the cluster index last looked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingChanges {
    /// Nothing.
    None,
    /// The visibility of these slots flipped.
    Slots(Vec<usize>),
    /// Too much to track, start over.
    Everything,
}

/// Per category lists of markers with their filtered flags.
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    markers: Vec<Marker>,
    slots: FxHashMap<RecordId, usize>,
    by_category: Vec<Vec<usize>>,
    hidden: Vec<bool>,
    skipped: usize,
    pending: PendingChanges,
}

impl MarkerRegistry {
    /// Create an empty registry with one member list per category.
    pub fn new(categories: &CategoryRegistry) -> Self {
        MarkerRegistry {
            markers: vec![],
            slots: FxHashMap::default(),
            by_category: vec![vec![]; categories.len()],
            hidden: vec![false; categories.len()],
            skipped: 0,
            pending: PendingChanges::Everything,
        }
    }

    /// Remove every marker.
    pub fn clear(&mut self) {
        self.markers.clear();
        self.slots.clear();
        self.by_category.iter_mut().for_each(|list| list.clear());
        self.hidden.iter_mut().for_each(|h| *h = false);
        self.skipped = 0;
        self.pending = PendingChanges::Everything;
    }

    /// Add a record to its category's member list.
    ///
    /// Records without usable coordinates, records whose category is not in the registry, and
    /// records whose id is already registered are skipped. Returns whether the record was
    /// registered.
    pub fn register(&mut self, record: Record, filtered: bool) -> bool {
        if !record.position.is_valid() {
            log::warn!(
                "skipping record {} with bad coordinates {}",
                record.id,
                record.position
            );
            self.skipped += 1;
            return false;
        }

        let members = match self.by_category.get_mut(record.category.index()) {
            Some(members) => members,
            None => {
                log::warn!(
                    "skipping record {} with unregistered category {}",
                    record.id,
                    record.category
                );
                self.skipped += 1;
                return false;
            }
        };

        if self.slots.contains_key(&record.id) {
            log::debug!("skipping duplicate registration of record {}", record.id);
            self.skipped += 1;
            return false;
        }

        let slot = self.markers.len();
        members.push(slot);
        self.slots.insert(record.id, slot);
        self.markers.push(Marker { record, filtered });
        self.pending = PendingChanges::Everything;

        true
    }

    /// Mark every member of the given categories as filtered (or not).
    ///
    /// This must be followed by processing the view for the change to show up on the map.
    pub fn set_filtered(&mut self, categories: &[CategoryId], filtered: bool) {
        for &cat in categories {
            let members = match self.by_category.get(cat.index()) {
                Some(members) => members,
                None => continue,
            };

            for &slot in members {
                self.markers[slot].filtered = filtered;
            }
            self.hidden[cat.index()] = filtered;
        }

        self.pending = PendingChanges::Everything;
    }

    /// Change the visibility of a single marker.
    ///
    /// Returns `false` if there is no such marker.
    pub fn set_marker_filtered(&mut self, id: RecordId, filtered: bool) -> bool {
        let slot = match self.slots.get(&id) {
            Some(slot) => *slot,
            None => return false,
        };

        let marker = &mut self.markers[slot];
        if marker.filtered == filtered {
            return true;
        }
        marker.filtered = filtered;

        if let PendingChanges::Slots(slots) = &mut self.pending {
            slots.push(slot);
        } else if self.pending == PendingChanges::None {
            self.pending = PendingChanges::Slots(vec![slot]);
        }

        true
    }

    /// Hand the accumulated changes to the cluster index.
    pub(crate) fn take_pending(&mut self) -> PendingChanges {
        std::mem::replace(&mut self.pending, PendingChanges::None)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Number of records that were offered but not registered.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// All markers in registration order.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn marker(&self, slot: usize) -> Option<&Marker> {
        self.markers.get(slot)
    }

    pub(crate) fn slot_of(&self, id: RecordId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn get(&self, id: RecordId) -> Option<&Marker> {
        self.slot_of(id).map(|slot| &self.markers[slot])
    }

    pub fn is_filtered(&self, id: RecordId) -> Option<bool> {
        self.get(id).map(|m| m.filtered)
    }

    /// Has the whole category been switched off?
    pub fn is_category_hidden(&self, category: CategoryId) -> bool {
        self.hidden.get(category.index()).copied().unwrap_or(false)
    }

    /// Slots of the members of a category.
    pub fn members(&self, category: CategoryId) -> &[usize] {
        self.by_category
            .get(category.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Categories with at least one registered marker, in registry order.
    pub fn categories_present(&self) -> Vec<CategoryId> {
        self.by_category
            .iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(i, _)| CategoryId(i as u8))
            .collect()
    }

    /// Iterate over the slots and records of markers that are not filtered.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.markers
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.filtered)
            .map(|(slot, m)| (slot, &m.record))
    }

    pub fn visible_count(&self) -> usize {
        self.markers.iter().filter(|m| !m.filtered).count()
    }

    pub fn visible_records(&self) -> Vec<&Record> {
        self.visible().map(|(_, r)| r).collect()
    }
}
