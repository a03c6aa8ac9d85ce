use std::{cell::RefCell, rc::Rc};
use trackermap::{
    categories_present, place_search, render_pie, BoundingBox, Category, CategoryId,
    CategoryRegistry, ClusterOptions, ClusterSet, Coord, FeatureEvent, GeocodeHit, Geocoder,
    LegendEntry, LegendView, MapConfig, MapLayer, MapView, MarkerRegistry, RawRecord, Record,
    RecordId, RecordStore, SearchKind, SearchQuery, SearchResult, SpatialClusterIndex, TableView,
    UiEvent, ViewState, ViewSynchronizer, Viewport, NOTHING_FOUND,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Recording collaborators
 *-----------------------------------------------------------------------------------------------*/
struct RecordingMap {
    viewport: Viewport,
    layers: Vec<MapLayer>,
    fits: Vec<BoundingBox>,
}

impl RecordingMap {
    fn new(zoom: f64) -> Self {
        RecordingMap {
            viewport: Viewport::world(zoom),
            layers: vec![],
            fits: vec![],
        }
    }

    fn last_layer(&self) -> &MapLayer {
        self.layers.last().expect("nothing drawn")
    }
}

impl MapView for RecordingMap {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn draw(&mut self, layer: &MapLayer) {
        self.layers.push(layer.clone());
    }

    fn fit_bounds(&mut self, bounds: BoundingBox) {
        self.fits.push(bounds);
    }
}

#[derive(Default)]
struct RecordingLegend {
    shown: Vec<Vec<LegendEntry>>,
}

impl RecordingLegend {
    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .shown
            .last()
            .map(|entries| entries.iter().map(|e| e.key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl LegendView for RecordingLegend {
    fn show_categories(&mut self, entries: &[LegendEntry]) {
        self.shown.push(entries.to_vec());
    }
}

#[derive(Default)]
struct RecordingTable {
    rows: Vec<RecordId>,
    title: String,
    label: String,
}

impl TableView for RecordingTable {
    fn render_rows(&mut self, records: &[&Record], title: &str) {
        self.rows = records.iter().map(|r| r.id).collect();
        self.title = title.to_owned();
    }

    fn set_results_label(&mut self, label: &str) {
        self.label = label.to_owned();
    }
}

type TestSync<'c> = ViewSynchronizer<'c, RecordingMap, RecordingLegend, RecordingTable>;

fn synchronizer(config: &MapConfig, zoom: f64) -> TestSync<'_> {
    ViewSynchronizer::new(
        config,
        RecordingMap::new(zoom),
        RecordingLegend::default(),
        RecordingTable::default(),
    )
}

/*-------------------------------------------------------------------------------------------------
 *                                          Test data
 *-----------------------------------------------------------------------------------------------*/

/// Two categories, A then B.
fn ab_config(min_distance: f64) -> MapConfig {
    let categories = CategoryRegistry::new(vec![
        Category::new("a", "A", "#ff0000", true),
        Category::new("b", "B", "#0000ff", true),
    ])
    .unwrap();

    MapConfig {
        categories,
        cluster: ClusterOptions {
            min_distance,
            ..ClusterOptions::default()
        },
        ..MapConfig::default()
    }
}

/// Three records close together, categories A, A, B.
fn aab_records() -> Vec<Record> {
    vec![
        Record::new(1, 10.0, 10.0, CategoryId(0)),
        Record::new(2, 10.001, 10.001, CategoryId(0)),
        Record::new(3, 10.002, 10.0, CategoryId(1)),
    ]
}

/// A small deterministic pseudo random generator so the bulk tests are repeatable.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn scattered_records(n: u64, num_categories: u8) -> Vec<Record> {
    let mut rng = Lcg(42);
    (0..n)
        .map(|id| {
            let lat = 20.0 + 30.0 * rng.next_f64();
            let lon = -120.0 + 50.0 * rng.next_f64();
            let cat = (rng.next_f64() * num_categories as f64) as u8 % num_categories;
            Record::new(id, lat, lon, CategoryId(cat))
        })
        .collect()
}

fn assert_population_conserved(set: &ClusterSet, registry: &MarkerRegistry) {
    for cluster in &set.clusters {
        assert_eq!(cluster.stats.iter().sum::<u32>(), cluster.population);
        assert_eq!(cluster.members.len() as u32, cluster.population);
        assert!(cluster.population >= 2);
    }

    let clustered: u32 = set.clusters.iter().map(|c| c.population).sum();
    assert_eq!(
        clustered as usize + set.singles.len(),
        registry.visible_count()
    );
}

/*-------------------------------------------------------------------------------------------------
 *                                         Properties
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_population_conservation() {
    let config = MapConfig::default();
    let mut registry = MarkerRegistry::new(&config.categories);
    for record in scattered_records(600, config.categories.len() as u8) {
        registry.register(record, false);
    }
    registry.set_filtered(&[CategoryId(2)], true);

    let mut index = SpatialClusterIndex::new(&config.cluster, config.categories.len());

    for zoom in [0.0, 2.5, 5.0, 8.0, 12.0] {
        let set = index
            .process_view(&mut registry, &Viewport::world(zoom))
            .clone();
        assert_population_conserved(&set, &registry);
    }
}

#[test]
fn test_filtered_records_are_excluded_and_restored() {
    let config = MapConfig::default();
    let mut registry = MarkerRegistry::new(&config.categories);
    for record in scattered_records(400, config.categories.len() as u8) {
        registry.register(record, false);
    }

    let mut index = SpatialClusterIndex::new(&config.cluster, config.categories.len());
    let viewport = Viewport::world(4.0);
    let before = index.process_view(&mut registry, &viewport).clone();

    let hidden = [CategoryId(0), CategoryId(7)];
    registry.set_filtered(&hidden, true);
    let filtered = index.process_view(&mut registry, &viewport).clone();

    for cluster in &filtered.clusters {
        for cat in hidden {
            assert_eq!(cluster.stats[cat.index()], 0);
        }
        for id in &cluster.members {
            assert_eq!(registry.is_filtered(*id), Some(false));
        }
    }
    for single in &filtered.singles {
        assert!(!hidden.contains(&single.category));
    }
    assert_population_conserved(&filtered, &registry);

    registry.set_filtered(&hidden, false);
    let after = index.process_view(&mut registry, &viewport).clone();
    assert_eq!(before, after);
}

#[test]
fn test_single_marker_filter_round_trip() {
    let config = MapConfig::default();
    let mut registry = MarkerRegistry::new(&config.categories);
    for record in scattered_records(300, config.categories.len() as u8) {
        registry.register(record, false);
    }

    let mut index = SpatialClusterIndex::new(&config.cluster, config.categories.len());
    let viewport = Viewport::world(3.0);
    index.process_view(&mut registry, &viewport);

    for id in [5, 17, 42, 250] {
        assert!(registry.set_marker_filtered(RecordId(id), true));
    }
    let set = index.process_view(&mut registry, &viewport).clone();
    assert_population_conserved(&set, &registry);
    for id in [5, 17, 42, 250] {
        let id = RecordId(id);
        assert!(set.clusters.iter().all(|c| !c.members.contains(&id)));
        assert!(set.singles.iter().all(|s| s.id != id));
    }

    for id in [5, 17, 42, 250] {
        assert!(registry.set_marker_filtered(RecordId(id), false));
    }
    let set = index.process_view(&mut registry, &viewport).clone();
    assert_population_conserved(&set, &registry);
    assert_eq!(set.population(), 300);
}

#[test]
fn test_slice_order_follows_registry() {
    let config = ab_config(30.0);

    // Same records, B first this time.
    let mut records = aab_records();
    records.reverse();

    let mut sync = synchronizer(&config, 2.0);
    sync.apply_result_set(records, "Reversed");

    let layer = sync.map().last_layer();
    assert_eq!(layer.clusters.len(), 1);

    let icon = &layer.clusters[0].icon;
    let cats: Vec<CategoryId> = icon.slices.iter().map(|s| s.category).collect();
    assert_eq!(cats, vec![CategoryId(0), CategoryId(1)]);

    let again = render_pie(&[2, 1], 3, &config.categories, &config.icon);
    assert_eq!(**icon, again);
}

#[test]
fn test_process_is_idempotent() {
    let config = MapConfig::default();
    let mut registry = MarkerRegistry::new(&config.categories);
    for record in scattered_records(500, config.categories.len() as u8) {
        registry.register(record, false);
    }

    let mut index = SpatialClusterIndex::new(&config.cluster, config.categories.len());
    let viewport = Viewport::world(6.0);

    let first = index.process_view(&mut registry, &viewport).clone();
    let second = index.process_view(&mut registry, &viewport).clone();
    assert_eq!(first, second);

    index.rebuild(&registry, viewport.zoom);
    assert_eq!(&first, index.clusters());
}

#[test]
fn test_legend_matches_result_set() {
    let config = MapConfig::default();
    let records = scattered_records(50, 3);

    let mut sync = synchronizer(&config, 3.0);
    sync.apply_result_set(records.clone(), "Some");

    let mut expected: Vec<String> = categories_present(&records)
        .into_iter()
        .map(|id| config.categories.get(id).unwrap().key.clone())
        .collect();
    expected.sort();

    assert_eq!(sync.legend().keys(), expected);

    // A smaller result set shrinks the legend.
    let op = config.categories.id_of("operating").unwrap();
    sync.apply_result_set(vec![Record::new(1, 0.0, 0.0, op)], "One");
    assert_eq!(sync.legend().keys(), vec!["operating".to_owned()]);
}

/*-------------------------------------------------------------------------------------------------
 *                                         Scenarios
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_scenario_a_one_mixed_cluster() {
    let config = ab_config(30.0);
    let mut sync = synchronizer(&config, 2.0);

    sync.apply_result_set(aab_records(), "ABC");

    let set = sync.clusters();
    assert_eq!(set.clusters.len(), 1);
    assert!(set.singles.is_empty());
    assert_eq!(set.clusters[0].population, 3);
    assert_eq!(set.clusters[0].stats, vec![2, 1]);

    assert_eq!(sync.table().rows, vec![RecordId(1), RecordId(2), RecordId(3)]);
    assert_eq!(sync.table().title, "Records for ABC");
    assert_eq!(sync.legend().keys(), vec!["a".to_owned(), "b".to_owned()]);
}

#[test]
fn test_scenario_b_zero_radius_never_merges() {
    let config = ab_config(0.0);
    let mut sync = synchronizer(&config, 2.0);

    sync.apply_result_set(aab_records(), "ABC");

    let set = sync.clusters();
    assert!(set.clusters.is_empty());
    assert_eq!(set.singles.len(), 3);

    let layer = sync.map().last_layer();
    assert!(layer.clusters.is_empty());
    assert_eq!(layer.markers.len(), 3);
}

#[test]
fn test_scenario_c_toggle_category() {
    let config = ab_config(30.0);
    let mut sync = synchronizer(&config, 2.0);

    sync.apply_result_set(aab_records(), "ABC");
    sync.handle(UiEvent::CategoryToggled {
        key: "a".to_owned(),
        checked: false,
    });

    let set = sync.clusters();
    assert_eq!(set.population(), 1);
    assert_eq!(set.stats(), vec![0, 1]);

    // A group of one is drawn as a plain marker.
    assert!(set.clusters.is_empty());
    assert_eq!(set.singles[0].id, RecordId(3));

    assert_eq!(sync.table().rows, vec![RecordId(3)]);
    assert_eq!(sync.state(), ViewState::Rendered);

    // And back again.
    sync.toggle_category("a", true);
    assert_eq!(sync.clusters().clusters[0].stats, vec![2, 1]);
}

#[test]
fn test_scenario_d_nothing_found() {
    let config = ab_config(30.0);
    let mut sync = synchronizer(&config, 2.0);

    sync.apply_result_set(aab_records(), "ABC");
    sync.apply_result_set(vec![], "Nowhere");

    assert!(sync.is_empty());
    assert!(sync.clusters().is_empty());
    assert!(sync.map().last_layer().is_empty());
    assert!(sync.legend().shown.last().unwrap().is_empty());
    assert!(sync.table().rows.is_empty());
    assert_eq!(sync.table().label, NOTHING_FOUND);
}

#[test]
fn test_bad_coordinates_are_dropped() {
    let config = ab_config(30.0);
    let mut sync = synchronizer(&config, 2.0);

    let mut records = aab_records();
    records.push(Record::new(10, f64::NAN, f64::NAN, CategoryId(0)));
    records.push(Record::new(11, f64::NAN, 5.0, CategoryId(1)));
    records.push(Record::new(12, 10.0, 400.0, CategoryId(0)));

    sync.apply_result_set(records, "ABC");

    assert_eq!(sync.registry().len(), 3);
    assert_eq!(sync.registry().skipped(), 3);
    assert_eq!(sync.clusters().population(), 3);
    assert_population_conserved(sync.clusters(), sync.registry());
    assert_eq!(sync.table().rows, vec![RecordId(1), RecordId(2), RecordId(3)]);
    assert_eq!(sync.table().label, "3 results");
}

#[test]
fn test_scenario_e_latest_fit_wins() {
    let config = ab_config(30.0);
    let mut sync = synchronizer(&config, 2.0);

    let first = BoundingBox {
        ll: Coord { lat: 0.0, lon: 0.0 },
        ur: Coord { lat: 1.0, lon: 1.0 },
    };
    let second = BoundingBox {
        ll: Coord {
            lat: 40.0,
            lon: -100.0,
        },
        ur: Coord {
            lat: 45.0,
            lon: -90.0,
        },
    };

    sync.handle(UiEvent::SearchStarted);
    sync.handle(UiEvent::SearchResult(SearchResult {
        records: aab_records(),
        label: "First".to_owned(),
        bounds: Some(first),
    }));

    sync.handle(UiEvent::SearchStarted);
    sync.handle(UiEvent::SearchResult(SearchResult {
        records: vec![Record::new(9, 42.0, -95.0, CategoryId(1))],
        label: "Second".to_owned(),
        bounds: Some(second),
    }));

    assert!(sync.map().fits.is_empty());

    sync.handle(UiEvent::RenderComplete);
    sync.handle(UiEvent::RenderComplete);

    assert_eq!(sync.map().fits, vec![second]);
    assert_eq!(sync.label(), "Second");
}

/*-------------------------------------------------------------------------------------------------
 *                                    End to end, from raw data
 *-----------------------------------------------------------------------------------------------*/
fn raw(id: u64, lat: Option<f64>, lng: Option<f64>, category: &str, country: &str) -> RawRecord {
    let mut attributes = trackermap::Attributes::new();
    attributes.insert("country".into(), country.into());
    attributes.insert("unit".into(), format!("Unit {}", id).into());

    RawRecord {
        id,
        lat,
        lng,
        category: category.to_owned(),
        attributes,
    }
}

struct OneCountryGeocoder;

impl Geocoder for OneCountryGeocoder {
    fn lookup(&self, address: &str) -> Option<GeocodeHit> {
        if address.contains("abidjan") {
            Some(GeocodeHit {
                country: Some("Côte d'Ivoire".to_owned()),
                bounds: None,
            })
        } else {
            None
        }
    }
}

#[test]
fn test_search_to_views() {
    let config = MapConfig::default();
    let raws = vec![
        raw(1, Some(5.3), Some(-4.0), "operating", "Ivory Coast"),
        raw(2, Some(5.31), Some(-4.01), "construction", "Ivory Coast"),
        raw(3, None, Some(-4.0), "operating", "Ivory Coast"),
        raw(4, Some(5.3), Some(-4.0), "no such status", "Ivory Coast"),
        raw(5, Some(6.5), Some(3.4), "retired", "Nigeria"),
        raw(1, Some(5.3), Some(-4.0), "operating", "Ivory Coast"),
    ];

    let (store, report) = RecordStore::from_raw(raws, &config.categories);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.bad_position, 1);
    assert_eq!(report.unknown_category, 1);
    assert_eq!(report.duplicate_id, 1);
    assert!(store.ensure_not_empty().is_ok());

    let query = place_search(&OneCountryGeocoder, " Abidjan ", &config.search).unwrap();
    assert_eq!(query, SearchQuery::Country("Ivory Coast".to_owned()));
    assert!(place_search(&OneCountryGeocoder, "Atlantis", &config.search).is_err());

    let events = Rc::new(RefCell::new(vec![]));
    let sink = Rc::clone(&events);

    let mut sync = synchronizer(&config, 3.0);
    sync.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

    sync.handle(UiEvent::SearchStarted);
    assert_eq!(sync.state(), ViewState::Loading);

    sync.handle(UiEvent::SearchResult(query.run(&store, &config)));
    assert_eq!(sync.state(), ViewState::Rendered);
    assert_eq!(sync.table().title, "Records for Ivory Coast");
    assert_eq!(sync.table().label, "2 results");
    assert_eq!(
        sync.legend().keys(),
        vec!["construction".to_owned(), "operating".to_owned()]
    );

    let cluster = sync.clusters().clusters[0].id;
    sync.handle(UiEvent::ClusterClicked(cluster));
    sync.handle(UiEvent::MarkerClicked(RecordId(5)));
    sync.handle(UiEvent::MarkerClicked(RecordId(2)));

    let events = events.borrow();
    assert_eq!(events.len(), 2);
    match &events[0] {
        FeatureEvent::OverlappingMarkers { records, .. } => assert_eq!(records.len(), 2),
        other => panic!("unexpected event {:?}", other),
    }
    match &events[1] {
        FeatureEvent::FeatureActivated(record) => assert_eq!(record.id, RecordId(2)),
        other => panic!("unexpected event {:?}", other),
    }

    let everything = SearchQuery::dispatch(SearchKind::Everything, "");
    sync.handle(UiEvent::SearchStarted);
    sync.handle(UiEvent::SearchResult(everything.run(&store, &config)));
    assert_eq!(sync.table().rows.len(), 3);
    assert_eq!(sync.table().title, "Records for All Trackers");
}

#[test]
fn test_load_json_file() {
    let config = MapConfig::default();
    let path = std::env::temp_dir().join(format!("trackermap-test-{}.json", std::process::id()));

    let json = r#"[
        {"id": 1, "lat": 45.0, "lng": -120.0, "category": "operating",
         "attributes": {"unit": "Boardman", "capacity_mw": 601}},
        {"id": 2, "lat": 95.0, "lng": -120.0, "category": "operating"},
        {"id": 3, "lat": null, "lng": -120.0, "category": "retired"}
    ]"#;
    std::fs::write(&path, json).unwrap();

    let (store, report) = RecordStore::load_json(&path, &config.categories).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(report.bad_position, 2);

    let record = &store.records()[0];
    assert_eq!(record.title(), "Boardman");
    assert_eq!(record.attribute_text("capacity_mw").as_deref(), Some("601"));
}
