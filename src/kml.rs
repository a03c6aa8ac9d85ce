//! Very simple functions for producing KML and KMZ files of a clustered map.
//!
//! This is not a general solution at all, it only implements the parts needed to export the
//! markers and clusters of a map with a focus on a streaming type API. That means the user is
//! responsible for closing all tags.
//!
//! The [KmlMapView] is a [MapView] for desktop globe viewers. It records what the view
//! synchronizer draws so it can be written out afterwards.

use crate::{
    config::MapConfig,
    geo::BoundingBox,
    icon::ClusterIcon,
    registry::MarkerRegistry,
    synchronizer::{MapLayer, MapView},
    table::{column_titles, TableRow},
    viewport::Viewport,
    TrackerMapResult,
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// A plain `.kml` file.
pub struct KmlFile {
    out: BufWriter<File>,
    finished: bool,
}

impl KmlFile {
    pub fn new<P: AsRef<Path>>(pth: P) -> TrackerMapResult<Self> {
        let p = pth.as_ref();

        let f = std::fs::File::create(p)?;
        let mut new = KmlFile {
            out: BufWriter::new(f),
            finished: false,
        };
        new.start_document()?;
        Ok(new)
    }

    /// Close the document and flush it to disk.
    pub fn finish(mut self) -> TrackerMapResult<()> {
        self.close()
    }

    fn close(&mut self) -> TrackerMapResult<()> {
        if !self.finished {
            self.finished = true;
            self.finish_document()?;
            self.out.flush()?;
        }
        Ok(())
    }
}

impl KmlWriter for KmlFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }
}

impl Drop for KmlFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("error writing kml file: {}", err);
        }
    }
}

/// A zipped KML document, `doc.kml`, along with any extra files it refers to.
pub struct KmzFile {
    zip: Option<ZipWriter<File>>,
    doc: Vec<u8>,
    extra: Vec<(String, Vec<u8>)>,
}

impl KmzFile {
    pub fn new<P: AsRef<Path>>(pth: P) -> TrackerMapResult<Self> {
        let f = std::fs::File::create(pth.as_ref())?;

        let mut new = KmzFile {
            zip: Some(ZipWriter::new(f)),
            doc: Vec::with_capacity(64 * 1024),
            extra: vec![],
        };
        new.start_document()?;
        Ok(new)
    }

    /// Store another file in the archive, e.g. an icon referenced by a style.
    pub fn add_file(&mut self, name: &str, contents: &[u8]) {
        self.extra.push((name.to_owned(), contents.to_vec()));
    }

    /// Close the document and write the archive.
    pub fn finish(mut self) -> TrackerMapResult<()> {
        self.close()
    }

    fn close(&mut self) -> TrackerMapResult<()> {
        let mut zip = match self.zip.take() {
            Some(zip) => zip,
            None => return Ok(()),
        };

        self.finish_document()?;

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("doc.kml", options)?;
        zip.write_all(&self.doc)?;

        for (name, contents) in &self.extra {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(contents)?;
        }

        zip.finish()?;
        Ok(())
    }
}

impl KmlWriter for KmzFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.doc
    }
}

impl Drop for KmzFile {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("error writing kmz archive: {}", err);
        }
    }
}

pub trait KmlWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Put the header out.
    fn start_document(&mut self) -> TrackerMapResult<()> {
        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        self.output().write_all(HEADER.as_bytes())?;

        Ok(())
    }

    /// Close a document.
    fn finish_document(&mut self) -> TrackerMapResult<()> {
        const FOOTER: &str = concat!(r#"</Document>"#, "\n", r#"</kml>"#, "\n");
        self.output().write_all(FOOTER.as_bytes())?;
        Ok(())
    }

    /// Write a description element to the file.
    fn write_description(&mut self, description: &str) -> TrackerMapResult<()> {
        writeln!(
            self.output(),
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    /// Start a KML folder.
    fn start_folder(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        is_open: bool,
    ) -> TrackerMapResult<()> {
        self.output().write_all("<Folder>\n".as_bytes())?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", escape(name))?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if is_open {
            self.output().write_all("<open>1</open>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a folder element
    fn finish_folder(&mut self) -> TrackerMapResult<()> {
        writeln!(self.output(), "</Folder>")?;
        Ok(())
    }

    /// Start a placemark element.
    fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> TrackerMapResult<()> {
        writeln!(self.output(), "<Placemark>")?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", escape(name))?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.output(), "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    /// Close out a placemark element.
    fn finish_placemark(&mut self) -> TrackerMapResult<()> {
        writeln!(self.output(), "</Placemark>")?;
        Ok(())
    }

    /// Start a style definition.
    fn start_style(&mut self, style_id: Option<&str>) -> TrackerMapResult<()> {
        if let Some(style_id) = style_id {
            writeln!(self.output(), "<Style id=\"{}\">", style_id)?;
        } else {
            writeln!(self.output(), "<Style>")?;
        }
        Ok(())
    }

    /// Close out a style definition.
    fn finish_style(&mut self) -> TrackerMapResult<()> {
        writeln!(self.output(), "</Style>")?;
        Ok(())
    }

    /// Create an IconStyle element.
    ///
    /// The color is in KML `aabbggrr` order.
    fn create_icon_style(
        &mut self,
        icon_url: Option<&str>,
        color: Option<&str>,
        scale: f64,
    ) -> TrackerMapResult<()> {
        writeln!(self.output(), "<IconStyle>")?;

        if let Some(color) = color {
            writeln!(self.output(), "<color>{}</color>", color)?;
        }

        if scale > 0.0 {
            writeln!(self.output(), "<scale>{}</scale>", scale)?;
        } else {
            writeln!(self.output(), "<scale>1</scale>")?;
        }

        if let Some(icon_url) = icon_url {
            writeln!(self.output(), "<Icon><href>{}</href></Icon>", icon_url)?;
        }

        writeln!(self.output(), "</IconStyle>")?;
        Ok(())
    }

    /// Write out a KML Point element
    fn create_point(&mut self, lat: f64, lon: f64, z: f64) -> TrackerMapResult<()> {
        writeln!(
            self.output(),
            "<Point>\n<coordinates>{},{},{}</coordinates>\n</Point>",
            lon,
            lat,
            z
        )?;
        Ok(())
    }
}

/// Escape the characters XML cares about in element text.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert a CSS `#rrggbb` color to an opaque KML `ffbbggrr` color.
pub fn kml_color(css: &str) -> String {
    let hex = css.trim().trim_start_matches('#');

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return "ff808080".to_owned();
    }

    let hex = hex.to_lowercase();
    format!("ff{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2])
}

/*-------------------------------------------------------------------------------------------------
 *                                    Map view for KML export
 *-----------------------------------------------------------------------------------------------*/

/**
 * A [MapView] that keeps what it was asked to draw so it can be exported.
 *
 * Fitting the bounds keeps the zoom level, only the bounds of the viewport change.
 */
#[derive(Debug, Clone)]
pub struct KmlMapView {
    viewport: Viewport,
    layer: MapLayer,
    fits: Vec<BoundingBox>,
}

impl KmlMapView {
    pub fn new(viewport: Viewport) -> Self {
        KmlMapView {
            viewport,
            layer: MapLayer::default(),
            fits: vec![],
        }
    }

    /// The most recently drawn layer.
    pub fn layer(&self) -> &MapLayer {
        &self.layer
    }

    /// Every fit applied so far, oldest first.
    pub fn fits(&self) -> &[BoundingBox] {
        &self.fits
    }

    /// File name for the icon of a cluster with these stats.
    pub fn icon_name(stats: &[u32]) -> String {
        let sig: Vec<String> = stats.iter().map(|n| n.to_string()).collect();
        format!("cluster-{}.svg", sig.join("-"))
    }

    /// The distinct cluster icons of the current layer as `(file name, svg)`.
    pub fn icon_files(&self) -> Vec<(String, String)> {
        let mut files: Vec<(String, String)> = vec![];

        for cluster in &self.layer.clusters {
            let name = Self::icon_name(&cluster.stats);
            if !files.iter().any(|(n, _)| *n == name) {
                files.push((name, cluster.icon.to_svg()));
            }
        }

        files
    }

    /**
     * Write the current layer.
     *
     * # Arguments
     * out - where to write, the document must already be started.
     * config - supplies the category styles and table columns.
     * registry - the markers the layer was drawn from, used for the single marker details.
     * icon_prefix - if given, cluster icons are referenced as `<prefix>/<icon name>`.
     */
    pub fn export<W: KmlWriter + ?Sized>(
        &self,
        out: &mut W,
        config: &MapConfig,
        registry: &MarkerRegistry,
        icon_prefix: Option<&str>,
    ) -> TrackerMapResult<()> {
        for (_id, cat) in config.categories.iter() {
            out.start_style(Some(&style_id(&cat.key)))?;
            out.create_icon_style(None, Some(&kml_color(&cat.color)), 0.8)?;
            out.finish_style()?;
        }

        if let Some(prefix) = icon_prefix {
            for (name, _svg) in self.icon_files() {
                out.start_style(Some(name.trim_end_matches(".svg")))?;
                out.create_icon_style(Some(&format!("{}/{}", prefix, name)), None, 1.0)?;
                out.finish_style()?;
            }
        }

        out.start_folder(Some("Clusters"), None, false)?;
        for cluster in &self.layer.clusters {
            let description = breakdown(&cluster.stats, &cluster.icon, config);
            let style = icon_prefix.map(|_| {
                format!(
                    "#{}",
                    Self::icon_name(&cluster.stats).trim_end_matches(".svg")
                )
            });

            out.start_placemark(
                Some(&cluster.population.to_string()),
                Some(&description),
                style.as_deref(),
            )?;
            out.create_point(cluster.position.lat, cluster.position.lon, 0.0)?;
            out.finish_placemark()?;
        }
        out.finish_folder()?;

        out.start_folder(Some("Markers"), None, false)?;
        let titles = column_titles(config);
        for marker in &self.layer.markers {
            let description = registry
                .get(marker.id)
                .and_then(|m| TableRow::from_record(&m.record, config))
                .map(|row| details(&titles, &row))
                .unwrap_or_else(|| marker.style.popup_html.clone());

            let style = config
                .categories
                .get(marker.category)
                .map(|cat| format!("#{}", style_id(&cat.key)));

            out.start_placemark(
                Some(&marker.style.title),
                Some(&description),
                style.as_deref(),
            )?;
            out.create_point(marker.position.lat, marker.position.lon, 0.0)?;
            out.finish_placemark()?;
        }
        out.finish_folder()?;

        Ok(())
    }
}

impl MapView for KmlMapView {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn draw(&mut self, layer: &MapLayer) {
        self.layer = layer.clone();
    }

    fn fit_bounds(&mut self, bounds: BoundingBox) {
        self.viewport.bounds = bounds;
        self.fits.push(bounds);
    }
}

fn style_id(key: &str) -> String {
    format!("status-{}", key.replace(' ', "-"))
}

/// Per category counts of a cluster, in registry order.
fn breakdown(stats: &[u32], icon: &ClusterIcon, config: &MapConfig) -> String {
    let mut lines: Vec<String> = config
        .categories
        .iter()
        .filter_map(|(id, cat)| match stats.get(id.index()) {
            Some(&n) if n > 0 => Some(format!("{}: {}", cat.text, n)),
            _ => None,
        })
        .collect();

    lines.push(format!("Total: {}", icon.label));
    lines.join("<br>")
}

fn details(titles: &[&str], row: &TableRow) -> String {
    let mut html = String::from("<table>");
    for (title, cell) in titles.iter().zip(&row.cells) {
        if cell.text.is_empty() {
            continue;
        }

        match &cell.link {
            Some(link) => html.push_str(&format!(
                "<tr><td>{}</td><td><a href=\"{}\">{}</a></td></tr>",
                title, link, cell.text
            )),
            None => html.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>", title, cell.text)),
        }
    }
    html.push_str("</table>");
    html
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{record::Record, search::SearchResult, synchronizer::ViewSynchronizer};
    use crate::synchronizer::{LegendEntry, LegendView, TableView};

    struct Sink(Vec<u8>);

    impl KmlWriter for Sink {
        fn output(&mut self) -> &mut dyn Write {
            &mut self.0
        }
    }

    struct NoLegend;
    impl LegendView for NoLegend {
        fn show_categories(&mut self, _entries: &[LegendEntry]) {}
    }

    struct NoTable;
    impl TableView for NoTable {
        fn render_rows(&mut self, _records: &[&Record], _title: &str) {}
        fn set_results_label(&mut self, _label: &str) {}
    }

    #[test]
    fn test_kml_color() {
        assert_eq!(kml_color("#845440"), "ff405484");
        assert_eq!(kml_color("#F26C4F"), "ff4f6cf2");
        assert_eq!(kml_color("red"), "ff808080");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("Bosnia & Herzegovina <1>"), "Bosnia &amp; Herzegovina &lt;1&gt;");
    }

    #[test]
    fn test_dropped_file_is_closed() {
        let name = format!("trackermap-drop-{}.kml", std::process::id());
        let path = std::env::temp_dir().join(name);

        {
            let mut kfile = KmlFile::new(&path).unwrap();
            kfile.start_folder(Some("Markers"), None, false).unwrap();
            kfile.finish_folder().unwrap();
        }

        let kml = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(kml.starts_with("<?xml"));
        assert!(kml.contains("<Folder>"));
        assert!(kml.trim_end().ends_with("</kml>"));
    }

    #[test]
    fn test_export_layer() {
        let config = MapConfig::default();
        let op = config.categories.id_of("operating").unwrap();
        let ret = config.categories.id_of("retired").unwrap();

        let records = vec![
            Record::new(1, 10.0, 10.0, op).with_attribute("unit", "Unit 1"),
            Record::new(2, 10.0001, 10.0001, ret).with_attribute("unit", "Unit 2"),
            Record::new(3, -30.0, 100.0, op).with_attribute("unit", "Far & Away"),
        ];

        let view = KmlMapView::new(Viewport::world(2.0));
        let mut sync = ViewSynchronizer::new(&config, view, NoLegend, NoTable);
        sync.apply(SearchResult {
            records,
            label: "Test".to_owned(),
            bounds: None,
        });

        let mut sink = Sink(vec![]);
        sink.start_document().unwrap();
        sync.map()
            .export(&mut sink, &config, sync.registry(), Some("icons"))
            .unwrap();
        sink.finish_document().unwrap();

        let kml = String::from_utf8(sink.0).unwrap();
        assert!(kml.starts_with("<?xml"));
        assert!(kml.contains("<Style id=\"status-operating\">"));
        assert!(kml.contains("Retired: 1<br>Operating: 1<br>Total: 2"));
        assert!(kml.contains("<name>Far &amp; Away</name>"));
        assert!(kml.contains("<td>Unit</td><td>Far & Away</td>"));

        let icons = sync.map().icon_files();
        assert_eq!(icons.len(), 1);
        assert!(kml.contains(&format!("<href>icons/{}</href>", icons[0].0)));
    }
}
