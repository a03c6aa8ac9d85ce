/*!
 * Keeps the map, the legend, and the results table showing the same result set.
 *
 * The [ViewSynchronizer] owns the marker registry and the cluster index. The map, legend, and
 * table widgets are collaborators behind the [MapView], [LegendView], and [TableView] traits; the
 * host UI forwards what the user does as [UiEvent]s and listens for [FeatureEvent]s.
 *
 * Everything happens synchronously in the thread handling the event, a result set is either fully
 * applied to all three views or not at all.
 */
use crate::{
    category::CategoryId,
    cluster::{ClusterId, ClusterSet, SpatialClusterIndex},
    config::MapConfig,
    geo::{BoundingBox, Coord},
    icon::{ClusterIcon, IconBuilder, IconCache, PieIconBuilder},
    marker::{DefaultMarkerPreparer, MarkerPreparer, MarkerStyle},
    record::{Record, RecordId},
    registry::MarkerRegistry,
    search::SearchResult,
    table::table_title,
    viewport::Viewport,
};
use std::rc::Rc;
use strum::{AsRefStr, Display};

/// Results label for an empty result set.
pub const NOTHING_FOUND: &str = "Nothing found";

/*-------------------------------------------------------------------------------------------------
 *                                    Collaborator Interfaces
 *-----------------------------------------------------------------------------------------------*/

/// A cluster icon ready to be placed on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterMarker {
    pub id: ClusterId,
    pub position: Coord,
    pub bounds: BoundingBox,
    pub population: u32,
    pub stats: Vec<u32>,
    pub icon: Rc<ClusterIcon>,
}

/// A single record drawn as a plain marker.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleMarker {
    pub id: RecordId,
    pub position: Coord,
    pub category: CategoryId,
    pub style: MarkerStyle,
}

/// Everything the map should show, replacing whatever it showed before.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapLayer {
    pub zoom: f64,
    pub clusters: Vec<ClusterMarker>,
    pub markers: Vec<SingleMarker>,
}

impl MapLayer {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.markers.is_empty()
    }
}

/// The map widget.
pub trait MapView {
    /// Where the map is looking right now.
    fn viewport(&self) -> Viewport;
    /// Replace the markers on the map.
    fn draw(&mut self, layer: &MapLayer);
    /// Move the map so the bounds are in view.
    fn fit_bounds(&mut self, bounds: BoundingBox);
}

/// A legend checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub key: String,
    pub text: String,
    pub color: String,
    pub checked: bool,
}

/// The legend with one checkbox per category.
pub trait LegendView {
    /// Show checkboxes for these categories only, an empty list hides the legend.
    fn show_categories(&mut self, entries: &[LegendEntry]);
}

/// The results table.
pub trait TableView {
    fn render_rows(&mut self, records: &[&Record], title: &str);
    fn set_results_label(&mut self, label: &str);
}

/*-------------------------------------------------------------------------------------------------
 *                                           Events
 *-----------------------------------------------------------------------------------------------*/

/// Things the user does, forwarded by the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The map was panned or zoomed.
    ViewportChanged,
    /// A legend checkbox was clicked.
    CategoryToggled { key: String, checked: bool },
    /// A search was submitted and its data is being fetched.
    SearchStarted,
    /// The search data arrived.
    SearchResult(SearchResult),
    /// The map finished laying out what it was last asked to draw.
    RenderComplete,
    MarkerClicked(RecordId),
    ClusterClicked(ClusterId),
}

/// Things the host UI should respond to, e.g. by opening a detail panel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureEvent {
    /// A single record was selected.
    FeatureActivated(Record),
    /// A cluster was selected, these are the records under it.
    OverlappingMarkers { records: Vec<Record>, center: Coord },
}

/// Where a search session is at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum ViewState {
    Idle,
    Loading,
    Rendered,
}

/*-------------------------------------------------------------------------------------------------
 *                                       View Synchronizer
 *-----------------------------------------------------------------------------------------------*/

type Listener = Box<dyn FnMut(&FeatureEvent)>;

/// A viewport fit waiting for the map to finish rendering.
#[derive(Debug, Clone, Copy)]
struct PendingFit {
    generation: u64,
    bounds: BoundingBox,
}

/// Only the latest scheduled fit survives until the map reports it is done rendering.
#[derive(Debug, Default)]
struct FitScheduler {
    generation: u64,
    pending: Option<PendingFit>,
}

impl FitScheduler {
    fn schedule(&mut self, bounds: BoundingBox) {
        self.generation += 1;
        let next = PendingFit {
            generation: self.generation,
            bounds,
        };

        if let Some(old) = self.pending.replace(next) {
            log::debug!(
                "fit {} to {} superseded by fit {}",
                old.generation,
                old.bounds,
                next.generation
            );
        }
    }

    fn cancel(&mut self) {
        if let Some(old) = self.pending.take() {
            log::debug!("fit {} to {} cancelled", old.generation, old.bounds);
        }
    }

    fn take(&mut self) -> Option<PendingFit> {
        self.pending.take()
    }
}

/**
 * Coordinates the map clusters, legend checkboxes, and table rows for one result set at a time.
 *
 * The marker registry inside is the single source of truth for what is visible. Legend toggles
 * write to it, then the clusters and table are brought up to date from it.
 */
pub struct ViewSynchronizer<'c, M, L, T> {
    config: &'c MapConfig,
    map: M,
    legend: L,
    table: T,
    registry: MarkerRegistry,
    index: SpatialClusterIndex,
    icons: IconCache,
    icon_builder: Box<dyn IconBuilder>,
    marker_preparer: Box<dyn MarkerPreparer>,
    listeners: Vec<Listener>,
    state: ViewState,
    label: String,
    fits: FitScheduler,
}

impl<'c, M, L, T> ViewSynchronizer<'c, M, L, T>
where
    M: MapView,
    L: LegendView,
    T: TableView,
{
    /// Create a synchronizer with the default pie icons and markers.
    pub fn new(config: &'c MapConfig, map: M, legend: L, table: T) -> Self {
        let num_categories = config.categories.len();

        ViewSynchronizer {
            config,
            map,
            legend,
            table,
            registry: MarkerRegistry::new(&config.categories),
            index: SpatialClusterIndex::new(&config.cluster, num_categories),
            icons: IconCache::default(),
            icon_builder: Box::new(PieIconBuilder),
            marker_preparer: Box::new(DefaultMarkerPreparer),
            listeners: vec![],
            state: ViewState::Idle,
            label: String::new(),
            fits: FitScheduler::default(),
        }
    }

    /// Use a different cluster icon.
    pub fn with_icon_builder(mut self, builder: Box<dyn IconBuilder>) -> Self {
        self.icon_builder = builder;
        self.icons.clear();
        self
    }

    /// Use a different single marker style.
    pub fn with_marker_preparer(mut self, preparer: Box<dyn MarkerPreparer>) -> Self {
        self.marker_preparer = preparer;
        self
    }

    /// Register a listener for marker and cluster selections.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&FeatureEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Route an event from the host UI.
    pub fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::ViewportChanged => self.viewport_changed(),
            UiEvent::CategoryToggled { key, checked } => self.toggle_category(&key, checked),
            UiEvent::SearchStarted => self.begin_search(),
            UiEvent::SearchResult(result) => self.apply(result),
            UiEvent::RenderComplete => self.render_complete(),
            UiEvent::MarkerClicked(id) => self.marker_clicked(id),
            UiEvent::ClusterClicked(id) => self.cluster_clicked(id),
        }
    }

    /// A new search was submitted, its results will arrive later.
    pub fn begin_search(&mut self) {
        if self.state == ViewState::Rendered {
            self.transition(ViewState::Idle);
        }
        self.transition(ViewState::Loading);
    }

    /// Show the results of a search and move the map to them once it has rendered.
    pub fn apply(&mut self, result: SearchResult) {
        let SearchResult {
            records,
            label,
            bounds,
        } = result;

        self.apply_result_set(records, &label);

        match bounds {
            Some(bounds) => self.fits.schedule(bounds),
            None => self.fits.cancel(),
        }
    }

    /**
     * Replace the result set shown in all three views.
     *
     * Every category starts out checked or not according to its configured default, whatever
     * the user toggled for the previous result set. Categories with no records in the result set
     * get no checkbox.
     *
     * # Arguments
     * records - the new result set.
     * label - describes the result set in the table title.
     */
    pub fn apply_result_set(&mut self, records: Vec<Record>, label: &str) {
        self.registry.clear();
        self.icons.clear();
        for record in records {
            self.registry.register(record, false);
        }

        let present = self.registry.categories_present();
        let hidden: Vec<CategoryId> = present
            .iter()
            .copied()
            .filter(|&id| {
                self.config
                    .categories
                    .get(id)
                    .map(|cat| !cat.visible)
                    .unwrap_or(false)
            })
            .collect();
        self.registry.set_filtered(&hidden, true);

        self.label = label.to_owned();
        self.redraw();

        let entries: Vec<LegendEntry> = present
            .iter()
            .filter_map(|&id| self.config.categories.get(id))
            .map(|cat| LegendEntry {
                key: cat.key.clone(),
                text: cat.text.clone(),
                color: cat.color.clone(),
                checked: cat.visible,
            })
            .collect();
        self.legend.show_categories(&entries);

        self.update_table();

        log::debug!(
            "applied result set '{}': {} records, {} categories",
            self.label,
            self.registry.len(),
            entries.len()
        );

        self.transition(ViewState::Rendered);
    }

    /// A legend checkbox changed.
    pub fn toggle_category(&mut self, key: &str, checked: bool) {
        self.toggle_categories(&[(key, checked)]);
    }

    /// Apply several legend changes with a single re-cluster.
    pub fn toggle_categories(&mut self, changes: &[(&str, bool)]) {
        let mut changed = false;

        for &(key, checked) in changes {
            match self.config.categories.id_of(key) {
                Some(id) => {
                    self.registry.set_filtered(&[id], !checked);
                    changed = true;
                }
                None => log::warn!("toggle of unknown category '{}'", key),
            }
        }

        if changed {
            self.redraw();
            self.update_table();
        }
    }

    /// Show or hide a single record. Returns `false` if it is not in the current result set.
    pub fn set_marker_filtered(&mut self, id: RecordId, filtered: bool) -> bool {
        if !self.registry.set_marker_filtered(id, filtered) {
            log::warn!("no marker for record {}", id);
            return false;
        }

        self.redraw();
        self.update_table();
        true
    }

    /// The map moved, re-cluster for the current zoom and draw what is in view.
    pub fn viewport_changed(&mut self) {
        self.redraw();
    }

    /// The map is done rendering, apply the latest scheduled fit if there is one.
    pub fn render_complete(&mut self) {
        if let Some(fit) = self.fits.take() {
            log::debug!("applying fit {} to {}", fit.generation, fit.bounds);
            self.map.fit_bounds(fit.bounds);
        }
    }

    pub fn marker_clicked(&mut self, id: RecordId) {
        match self.registry.get(id) {
            Some(marker) if !marker.filtered => {
                let event = FeatureEvent::FeatureActivated(marker.record.clone());
                self.emit(&event);
            }
            _ => log::warn!("click on unknown marker {}", id),
        }
    }

    /// Report every visible record within the bounds of the clicked cluster.
    pub fn cluster_clicked(&mut self, id: ClusterId) {
        let (bounds, center) = match self.index.clusters().cluster(id) {
            Some(cluster) => (cluster.bounds, cluster.position),
            None => {
                log::warn!("click on unknown cluster {}", id);
                return;
            }
        };

        let records: Vec<Record> = self
            .index
            .markers_in_area(&bounds)
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .map(|m| m.record.clone())
            .collect();

        let event = FeatureEvent::OverlappingMarkers { records, center };
        self.emit(&event);
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Is this the "Nothing found" state?
    pub fn is_empty(&self) -> bool {
        self.state == ViewState::Rendered && self.registry.is_empty()
    }

    /// The label of the current result set.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The clusters as of the last processing pass.
    pub fn clusters(&self) -> &ClusterSet {
        self.index.clusters()
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MapConfig {
        self.config
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn legend(&self) -> &L {
        &self.legend
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Give back the collaborators.
    pub fn into_parts(self) -> (M, L, T) {
        (self.map, self.legend, self.table)
    }

    /*---------------------------------------------------------------------------------------------
     *                                  Private Implementation
     *-------------------------------------------------------------------------------------------*/

    fn transition(&mut self, next: ViewState) {
        if self.state != next {
            log::debug!("view state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Re-cluster from the registry and viewport as they are now, then draw.
    fn redraw(&mut self) {
        let viewport = self.map.viewport();
        self.index.process_view(&mut self.registry, &viewport);

        let area = viewport.draw_area(self.config.cluster.view_padding);
        let set = self.index.clusters();

        let clusters = set
            .clusters
            .iter()
            .filter(|c| area.contains(c.position))
            .map(|c| ClusterMarker {
                id: c.id,
                position: c.position,
                bounds: c.bounds,
                population: c.population,
                stats: c.stats.clone(),
                icon: self.icons.get_or_build(
                    &c.stats,
                    c.population,
                    self.icon_builder.as_ref(),
                    self.config,
                ),
            })
            .collect();

        let markers = set
            .singles
            .iter()
            .filter(|s| area.contains(s.position))
            .filter_map(|s| self.registry.get(s.id))
            .map(|m| SingleMarker {
                id: m.record.id,
                position: m.record.position,
                category: m.record.category,
                style: self.marker_preparer.prepare(&m.record, self.config),
            })
            .collect();

        let layer = MapLayer {
            zoom: viewport.zoom,
            clusters,
            markers,
        };

        self.map.draw(&layer);
    }

    fn update_table(&mut self) {
        let records = self.registry.visible_records();

        let results = if records.is_empty() {
            NOTHING_FOUND.to_owned()
        } else if records.len() == 1 {
            "1 result".to_owned()
        } else {
            format!("{} results", records.len())
        };

        self.table.render_rows(&records, &table_title(&self.label));
        self.table.set_results_label(&results);
    }

    fn emit(&mut self, event: &FeatureEvent) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }
}
