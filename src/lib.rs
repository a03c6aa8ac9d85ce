pub use category::{Category, CategoryId, CategoryRegistry, MAX_CATEGORIES};
pub use cluster::{Cluster, ClusterId, ClusterSet, Member, SpatialClusterIndex};
pub use config::{ClusterOptions, CountryGroup, IconStyle, MapConfig, SearchOptions, TableOptions};
pub use error::{GeocodeError, TrackerMapError, TrackerMapResult};
pub use geo::{great_circle_distance, BoundingBox, Coord, WorldPixel};
pub use icon::{
    label_font_size, pie_radius, render_pie, ClusterIcon, IconBuilder, IconCache, PieIconBuilder,
    PieSlice,
};
pub use kml::{kml_color, KmlFile, KmlMapView, KmlWriter, KmzFile};
pub use marker::{DefaultMarkerPreparer, MarkerPreparer, MarkerStyle};
pub use record::{
    categories_present, Attributes, LoadReport, RawRecord, Record, RecordId, RecordStore,
};
pub use registry::{Marker, MarkerRegistry};
pub use search::{
    clean_address, country_alias, place_search, GeocodeHit, Geocoder, SearchKind, SearchQuery,
    SearchResult,
};
pub use synchronizer::{
    ClusterMarker, FeatureEvent, LegendEntry, LegendView, MapLayer, MapView, SingleMarker,
    TableView, UiEvent, ViewState, ViewSynchronizer, NOTHING_FOUND,
};
pub use table::{column_titles, table_title, TableCell, TableRow};
pub use viewport::Viewport;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod category;
mod cluster;
mod config;
mod error;
mod geo;
mod icon;
mod kml;
mod marker;
mod record;
mod registry;
mod search;
mod synchronizer;
mod table;
mod viewport;
