use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
};
use trackermap::{
    KmlFile, KmlMapView, KmzFile, LegendEntry, LegendView, LoadReport, MapConfig,
    Record, RecordStore, SearchKind, SearchQuery, TableView, TrackerMapResult, UiEvent,
    ViewSynchronizer, Viewport,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Cluster tracker records and export the map to KML.
///
/// This program loads every record file in a directory, runs one search over them, clusters the
/// results at a zoom level, and writes the clusters and markers to a KML or KMZ file.
///
#[derive(Debug, Parser)]
#[clap(name = "trackermap")]
#[clap(author, version, about)]
struct TrackerMapOptionsInit {
    /// Directory with the JSON record files.
    ///
    /// Every "*.json" file below it is loaded. If this is not specified, then the program will
    /// check for it in the "TRACKER_DATA" environment variable.
    #[clap(short, long)]
    #[clap(env = "TRACKER_DATA")]
    data_dir: PathBuf,

    /// A JSON configuration file, the coal plant tracker defaults are used without one.
    #[clap(short, long)]
    #[clap(env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// The kind of search, one of everything, region, country, subnational, or text.
    #[clap(short, long, default_value = "everything")]
    kind: SearchKind,

    /// What to search for, e.g. "India - Gujarat" for a subnational search.
    #[clap(short, long, default_value = "")]
    place: String,

    /// The zoom level to cluster at.
    #[clap(short, long, default_value_t = 2.0)]
    zoom: f64,

    /// Comma separated category keys to hide.
    #[clap(long)]
    hide: Option<String>,

    /// Directory to write one SVG per distinct cluster icon into.
    #[clap(short, long)]
    icons_dir: Option<PathBuf>,

    /// The output file, a ".kmz" extension makes a zipped archive with the icons inside.
    output: PathBuf,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct TrackerMapOptionsChecked {
    data_dir: PathBuf,
    config: Option<PathBuf>,
    query: SearchQuery,
    zoom: f64,
    hide: Vec<String>,
    icons_dir: Option<PathBuf>,
    output: PathBuf,
    kmz: bool,
    verbose: bool,
}

impl Display for TrackerMapOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?;
        writeln!(f, "    Data directory: {}", self.data_dir.display())?;
        match &self.config {
            Some(config) => writeln!(f, "     Configuration: {}", config.display())?,
            None => writeln!(f, "     Configuration: default")?,
        }
        writeln!(f, "            Search: {:?}", self.query)?;
        writeln!(f, "              Zoom: {}", self.zoom)?;
        writeln!(f, "            Hidden: {}", self.hide.join(", "))?;
        writeln!(f, "            Output: {}", self.output.display())?;
        if let Some(icons_dir) = &self.icons_dir {
            writeln!(f, "             Icons: {}", icons_dir.display())?;
        }
        writeln!(f, "\n")?;

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> TrackerMapResult<TrackerMapOptionsChecked> {
    let TrackerMapOptionsInit {
        data_dir,
        config,
        kind,
        place,
        zoom,
        hide,
        icons_dir,
        output,
        verbose,
    } = TrackerMapOptionsInit::parse();

    if !data_dir.is_dir() {
        return Err(format!("data directory {} does not exist", data_dir.display()).into());
    }

    if !(0.0..=22.0).contains(&zoom) {
        return Err(format!("zoom must be between 0 and 22, not {}", zoom).into());
    }

    if kind != SearchKind::Everything && place.trim().is_empty() {
        return Err(format!("a {} search needs a --place", kind.as_ref()).into());
    }

    let hide: Vec<String> = hide
        .map(|h| {
            h.split(',')
                .map(|k| k.trim().to_owned())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let kmz = output
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("kmz"))
        .unwrap_or(false);

    let checked = TrackerMapOptionsChecked {
        data_dir,
        config,
        query: SearchQuery::dispatch(kind, &place),
        zoom,
        hide,
        icons_dir,
        output,
        kmz,
        verbose,
    };

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                  Console legend and table
 *-----------------------------------------------------------------------------------------------*/
struct LogLegend;

impl LegendView for LogLegend {
    fn show_categories(&mut self, entries: &[LegendEntry]) {
        if entries.is_empty() {
            log::info!("legend hidden");
        }

        for entry in entries {
            let mark = if entry.checked { "x" } else { " " };
            log::info!("legend [{}] {}", mark, entry.text);
        }
    }
}

struct LogTable;

impl TableView for LogTable {
    fn render_rows(&mut self, records: &[&Record], title: &str) {
        log::info!("{}: {} rows", title, records.len());
        for record in records {
            log::debug!("    {:>8} {}", record.id, record.title());
        }
    }

    fn set_results_label(&mut self, label: &str) {
        log::info!("{}", label);
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> TrackerMapResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .with_module_level("trackermap", level)
        .init()?;

    log::debug!("{}", opts);

    let config = match &opts.config {
        Some(path) => MapConfig::load_json(path)?,
        None => MapConfig::default(),
    };

    let store = load_records(&opts.data_dir, &config)?;

    let result = opts.query.run(&store, &config);

    let view = KmlMapView::new(Viewport::world(opts.zoom));
    let mut sync = ViewSynchronizer::new(&config, view, LogLegend, LogTable);

    sync.handle(UiEvent::SearchStarted);
    sync.handle(UiEvent::SearchResult(result));

    if !opts.hide.is_empty() {
        let changes: Vec<(&str, bool)> = opts.hide.iter().map(|k| (k.as_str(), false)).collect();
        sync.toggle_categories(&changes);
    }

    sync.handle(UiEvent::RenderComplete);
    sync.handle(UiEvent::ViewportChanged);

    let set = sync.clusters();
    if sync.is_empty() {
        log::warn!("Nothing found for {}", sync.label());
    } else {
        log::info!(
            "{} records in {} clusters and {} single markers at zoom {}",
            set.population(),
            set.clusters.len(),
            set.singles.len(),
            opts.zoom
        );
    }

    let view = sync.map();
    let icons = view.icon_files();

    if let Some(icons_dir) = &opts.icons_dir {
        std::fs::create_dir_all(icons_dir)?;
        for (name, svg) in &icons {
            std::fs::write(icons_dir.join(name), svg)?;
        }
        log::info!("wrote {} icons to {}", icons.len(), icons_dir.display());
    }

    if opts.kmz {
        let mut kfile = KmzFile::new(&opts.output)?;
        for (name, svg) in &icons {
            kfile.add_file(&format!("icons/{}", name), svg.as_bytes());
        }
        view.export(&mut kfile, &config, sync.registry(), Some("icons"))?;
        kfile.finish()?;
    } else {
        let prefix = opts
            .icons_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());
        let mut kfile = KmlFile::new(&opts.output)?;
        view.export(&mut kfile, &config, sync.registry(), prefix.as_deref())?;
        kfile.finish()?;
    }

    log::info!("wrote {}", opts.output.display());

    Ok(())
}

/// Load every JSON record file under a directory, in file name order.
fn load_records(data_dir: &Path, config: &MapConfig) -> TrackerMapResult<RecordStore> {
    let mut store = RecordStore::default();
    let mut report = LoadReport::default();

    for entry in walkdir::WalkDir::new(data_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|res| res.ok())
        // Ignore directories, WalkDir will take care of recursing into them.
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext == "json")
                .unwrap_or(false)
        })
    {
        log::debug!("loading {}", entry.path().display());
        let file_report = store.extend_json(entry.path(), &config.categories)?;
        report.absorb(file_report);
    }

    log::info!("loaded {} from {}", report, data_dir.display());
    store.ensure_not_empty()?;

    Ok(store)
}
