/*!
 * Geo-tagged infrastructure records and the store holding a full data load.
 */
use crate::{
    category::{CategoryId, CategoryRegistry},
    error::TrackerMapError,
    geo::{BoundingBox, Coord},
    TrackerMapResult,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    path::Path,
};

/// Stable identifier of a record, unique within a data load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// Display metadata passed through to popups and tables untouched.
pub type Attributes = BTreeMap<String, Value>;

/// One infrastructure unit, e.g. a coal plant unit or a pipeline terminal.
///
/// The category is fixed at creation. Visibility is tracked by the
/// [MarkerRegistry](crate::MarkerRegistry), not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub position: Coord,
    pub category: CategoryId,
    pub attributes: Attributes,
}

impl Record {
    pub fn new(id: u64, lat: f64, lon: f64, category: CategoryId) -> Self {
        Record {
            id: RecordId(id),
            position: Coord { lat, lon },
            category,
            attributes: Attributes::new(),
        }
    }

    /// Builder style helper to attach an attribute.
    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes
            .insert(key.to_owned(), Value::String(value.to_owned()));
        self
    }

    /// Get the display text of a scalar attribute.
    ///
    /// Strings are returned as is, numbers and booleans are formatted, and `null`, arrays, and
    /// objects are treated as missing.
    pub fn attribute_text(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A human readable name for the record.
    pub fn title(&self) -> String {
        self.attribute_text("unit")
            .or_else(|| self.attribute_text("name"))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

/// A record as it comes out of the data source, before any validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: u64,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// Counts of what happened to the raw records during a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted: usize,
    pub unknown_category: usize,
    pub bad_position: usize,
    pub duplicate_id: usize,
}

impl LoadReport {
    pub fn dropped(&self) -> usize {
        self.unknown_category + self.bad_position + self.duplicate_id
    }

    /// Merge the counts from another load.
    pub fn absorb(&mut self, other: LoadReport) {
        self.accepted += other.accepted;
        self.unknown_category += other.unknown_category;
        self.bad_position += other.bad_position;
        self.duplicate_id += other.duplicate_id;
    }

    fn log_summary(&self) {
        if self.unknown_category > 0 {
            log::warn!(
                "dropped {} records with an unknown category",
                self.unknown_category
            );
        }
        if self.bad_position > 0 {
            log::warn!(
                "dropped {} records with missing or invalid coordinates",
                self.bad_position
            );
        }
        if self.duplicate_id > 0 {
            log::warn!("dropped {} records with a duplicate id", self.duplicate_id);
        }
    }
}

impl Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "{} accepted, {} unknown category, {} bad position, {} duplicate id",
            self.accepted, self.unknown_category, self.bad_position, self.duplicate_id
        )
    }
}

/// The full, unfiltered, set of records from a data load.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    /// Validate raw records and keep the usable ones, in their original order.
    ///
    /// Malformed source data is expected, so bad records are skipped and counted rather than
    /// failing the whole load.
    pub fn from_raw<I>(raws: I, categories: &CategoryRegistry) -> (Self, LoadReport)
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut store = RecordStore::default();
        let report = store.extend_raw(raws, categories);
        (store, report)
    }

    /// Add another batch of raw records. Ids already in the store count as duplicates.
    pub fn extend_raw<I>(&mut self, raws: I, categories: &CategoryRegistry) -> LoadReport
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut report = LoadReport::default();
        let mut seen: FxHashSet<RecordId> = self.records.iter().map(|r| r.id).collect();

        for raw in raws {
            let category = match categories.id_of(&raw.category) {
                Some(id) => id,
                None => {
                    log::debug!("record {} has unknown category '{}'", raw.id, raw.category);
                    report.unknown_category += 1;
                    continue;
                }
            };

            let position = match (raw.lat, raw.lng) {
                (Some(lat), Some(lon)) => Coord { lat, lon },
                _ => {
                    log::debug!("record {} has no coordinates", raw.id);
                    report.bad_position += 1;
                    continue;
                }
            };

            if !position.is_valid() {
                log::debug!("record {} has invalid coordinates {}", raw.id, position);
                report.bad_position += 1;
                continue;
            }

            let id = RecordId(raw.id);
            if !seen.insert(id) {
                log::debug!("record {} is a duplicate", raw.id);
                report.duplicate_id += 1;
                continue;
            }

            self.records.push(Record {
                id,
                position,
                category,
                attributes: raw.attributes,
            });
            report.accepted += 1;
        }

        report.log_summary();
        report
    }

    /// Load a JSON array of raw records from a file.
    pub fn load_json<P: AsRef<Path>>(
        path: P,
        categories: &CategoryRegistry,
    ) -> TrackerMapResult<(Self, LoadReport)> {
        let mut store = RecordStore::default();
        let report = store.extend_json(path, categories)?;
        Ok((store, report))
    }

    /// Add the records from a JSON file to this store.
    pub fn extend_json<P: AsRef<Path>>(
        &mut self,
        path: P,
        categories: &CategoryRegistry,
    ) -> TrackerMapResult<LoadReport> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)?;
        let raws: Vec<RawRecord> = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|err| format!("error parsing {}: {}", path.display(), err))?;

        log::debug!("read {} raw records from {}", raws.len(), path.display());

        Ok(self.extend_raw(raws, categories))
    }

    /// Fail if nothing usable was loaded.
    pub fn ensure_not_empty(&self) -> TrackerMapResult<()> {
        if self.records.is_empty() {
            Err(TrackerMapError {
                msg: "no usable records in the data source",
            }
            .into())
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// All the records in a category, in load order.
    pub fn in_category(&self, category: CategoryId) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |r| r.category == category)
    }

    /// The distinct categories present, in registry order.
    pub fn categories_present(&self) -> Vec<CategoryId> {
        categories_present(&self.records)
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::around(self.records.iter().map(|r| r.position))
    }
}

/// The distinct categories of a list of records, in registry order.
pub fn categories_present(records: &[Record]) -> Vec<CategoryId> {
    let mut ids: Vec<CategoryId> = records.iter().map(|r| r.category).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(id: u64, lat: Option<f64>, lng: Option<f64>, category: &str) -> RawRecord {
        RawRecord {
            id,
            lat,
            lng,
            category: category.to_owned(),
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_bad_records_are_dropped_and_counted() {
        let reg = CategoryRegistry::coal_plant_statuses();
        let raws = vec![
            raw(1, Some(45.0), Some(-120.0), "operating"),
            raw(2, Some(45.0), Some(-120.0), "demolished"),
            raw(3, None, Some(-120.0), "operating"),
            raw(4, Some(145.0), Some(-120.0), "retired"),
            raw(1, Some(46.0), Some(-121.0), "retired"),
            raw(5, Some(-33.9), Some(18.4), "Construction"),
        ];

        let (store, report) = RecordStore::from_raw(raws, &reg);

        assert_eq!(store.len(), 2);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.unknown_category, 1);
        assert_eq!(report.bad_position, 2);
        assert_eq!(report.duplicate_id, 1);
        assert_eq!(report.dropped(), 4);

        let ids: Vec<u64> = store.records().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 5]);
        assert_eq!(
            store.get(RecordId(5)).unwrap().category,
            reg.id_of("construction").unwrap()
        );
    }

    #[test]
    fn test_categories_present_in_registry_order() {
        let records = vec![
            Record::new(1, 0.0, 0.0, CategoryId(7)),
            Record::new(2, 0.0, 0.0, CategoryId(2)),
            Record::new(3, 0.0, 0.0, CategoryId(7)),
        ];
        assert_eq!(
            categories_present(&records),
            vec![CategoryId(2), CategoryId(7)]
        );
    }

    #[test]
    fn test_attribute_text_and_title() {
        let mut rec = Record::new(9, 0.0, 0.0, CategoryId(0)).with_attribute("plant", "Big Plant");
        rec.attributes
            .insert("capacity_mw".to_owned(), serde_json::json!(600));

        assert_eq!(rec.attribute_text("capacity_mw").as_deref(), Some("600"));
        assert_eq!(rec.attribute_text("missing"), None);
        assert_eq!(rec.title(), "#9");

        let rec = rec.with_attribute("unit", "Unit 1");
        assert_eq!(rec.title(), "Unit 1");
    }

    #[test]
    fn test_raw_records_from_json() {
        let json = r#"[
            {"id": 1, "lat": 10.0, "lng": 20.0, "category": "operating",
             "attributes": {"unit": "A", "capacity_mw": 300}},
            {"id": 2, "lat": null, "lng": 20.0, "category": "operating"}
        ]"#;

        let raws: Vec<RawRecord> = serde_json::from_str(json).unwrap();
        let (store, report) = RecordStore::from_raw(raws, &CategoryRegistry::default());

        assert_eq!(store.len(), 1);
        assert_eq!(report.bad_position, 1);
        assert_eq!(store.records()[0].position, Coord { lat: 10.0, lon: 20.0 });
    }
}
