/*!
 * The immutable configuration shared by every part of the map.
 *
 * A [MapConfig] is built once at startup (from the defaults, or a JSON file) and then passed by
 * reference to everything that needs it.
 */
use crate::{
    category::CategoryRegistry,
    error::TrackerMapError,
    geo::{BoundingBox, Coord},
    TrackerMapResult,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything that is fixed for the lifetime of a map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// The status categories, in pie slice order.
    pub categories: CategoryRegistry,
    pub cluster: ClusterOptions,
    pub icon: IconStyle,
    pub search: SearchOptions,
    pub table: TableOptions,
}

static_assertions::assert_impl_all!(MapConfig: Send, Sync);

impl MapConfig {
    /// Load a configuration from a JSON file, any missing section takes its default.
    pub fn load_json<P: AsRef<Path>>(path: P) -> TrackerMapResult<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        let config: MapConfig = serde_json::from_reader(std::io::BufReader::new(f))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that serde cannot check on its own.
    pub fn validate(&self) -> TrackerMapResult<()> {
        if !(self.cluster.min_distance >= 0.0) {
            return Err(TrackerMapError {
                msg: "cluster distance must be zero or positive",
            }
            .into());
        }

        if !(self.cluster.view_padding >= 0.0) {
            return Err(TrackerMapError {
                msg: "view padding must be zero or positive",
            }
            .into());
        }

        self.icon.validate()
    }
}

/// Parameters for the spatial cluster index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Markers closer together than this many screen pixels merge into one cluster.
    pub min_distance: f64,
    /// Fraction of the viewport size added on every side when picking what to draw.
    pub view_padding: f64,
    /// Batches of single marker visibility changes larger than this are handled with a full
    /// rebuild instead of incremental updates.
    pub incremental_limit: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        ClusterOptions {
            min_distance: 30.0,
            view_padding: 0.5,
            incremental_limit: 64,
        }
    }
}

/// Sizes and colors for the pie chart cluster icons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IconStyle {
    /// Edge length of the square icon in pixels.
    pub size: f64,
    /// Pie radius for the smallest clusters.
    pub min_radius: f64,
    /// Pie radius for the largest clusters.
    pub max_radius: f64,
    /// Population that gets `min_radius`.
    pub min_population: u32,
    /// Population that gets `max_radius`.
    pub max_population: u32,
    /// Radius of the white disc in the middle of the pie.
    pub center_radius: f64,
    /// Angular gap, in radians, left before each slice of a multi category pie.
    pub slice_gap: f64,
    /// Font sizes for the population label as `(population upper bound, px)`, checked in order.
    pub font_steps: Vec<(u32, f64)>,
    /// Font size when the population exceeds every step.
    pub min_font: f64,
    pub text_color: String,
    pub stroke_color: String,
    pub center_color: String,
}

impl Default for IconStyle {
    fn default() -> Self {
        IconStyle {
            size: 44.0,
            min_radius: 18.0,
            max_radius: 21.0,
            min_population: 2,
            max_population: 50,
            center_radius: 7.0,
            slice_gap: 0.05,
            font_steps: vec![(100, 9.0), (1000, 8.0)],
            min_font: 7.0,
            text_color: "#454545".to_owned(),
            stroke_color: "rgba(255,255,255,0.99)".to_owned(),
            center_color: "white".to_owned(),
        }
    }
}

impl IconStyle {
    fn validate(&self) -> TrackerMapResult<()> {
        if !(self.min_radius > 0.0 && self.min_radius <= self.max_radius) {
            return Err(TrackerMapError {
                msg: "icon radii must be positive with min_radius <= max_radius",
            }
            .into());
        }

        if self.min_population >= self.max_population {
            return Err(TrackerMapError {
                msg: "icon min_population must be less than max_population",
            }
            .into());
        }

        if !(self.center_radius >= 0.0 && self.center_radius < self.min_radius) {
            return Err(TrackerMapError {
                msg: "icon center_radius must be smaller than min_radius",
            }
            .into());
        }

        if self.size < 2.0 * self.max_radius {
            return Err(TrackerMapError {
                msg: "icon size too small for max_radius",
            }
            .into());
        }

        Ok(())
    }
}

/// Tables used when turning a search request into a result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Regions that also take in a fixed list of countries, whatever region the data codes them
    /// in.
    pub country_groups: Vec<CountryGroup>,
    /// Geocoder country names that don't match the names used in the data.
    pub country_aliases: Vec<(String, String)>,
    /// Fixed bounds for places the geocoder gets wrong, keyed by "Place, Country".
    pub place_bounds: Vec<(String, BoundingBox)>,
    /// Where the map starts out, and returns to on reset.
    pub home_bounds: BoundingBox,
}

/// A named list of countries searched like a region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryGroup {
    pub name: String,
    pub countries: Vec<String>,
}

fn bbox(south: f64, west: f64, north: f64, east: f64) -> BoundingBox {
    BoundingBox {
        ll: Coord {
            lat: south,
            lon: west,
        },
        ur: Coord {
            lat: north,
            lon: east,
        },
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        let group = |name: &str, countries: &[&str]| CountryGroup {
            name: name.to_owned(),
            countries: countries.iter().map(|c| c.to_string()).collect(),
        };

        let balkans = [
            "Moldova",
            "Kosovo",
            "Croatia",
            "Romania",
            "Serbia",
            "Albania",
            "Bulgaria",
            "Greece",
            "Montenegro",
            "Slovenia",
            "Bosnia & Herzegovina",
            "FYROM",
        ];

        let country_groups = vec![
            group("Balkans", &balkans),
            group("non-EU Europe", &balkans),
            group(
                "Africa",
                &[
                    "Botswana",
                    "Democratic Republic of Congo",
                    "Egypt",
                    "Ghana",
                    "Guinea",
                    "Kenya",
                    "Madagascar",
                    "Malawi",
                    "Mauritius",
                    "Morocco",
                    "Mozambique",
                    "Namibia",
                    "Nigeria",
                    "Reunion",
                    "Senegal",
                    "South Africa",
                    "Sudan",
                    "Swaziland",
                    "Tanzania",
                    "Zambia",
                    "Zimbabwe",
                ],
            ),
        ];

        let country_aliases = [
            ("FYRO Macedonia", "FYRO"),
            ("Côte d'Ivoire", "Ivory Coast"),
            ("Hong Kong SAR", "Hong Kong, China"),
            ("Niger", "The Niger"),
        ]
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        let place_bounds = vec![
            (
                "Inner Mongolia, China".to_owned(),
                bbox(36.3859, 92.2412, 53.4357, 142.9980),
            ),
            (
                "Guangxi, China".to_owned(),
                bbox(17.1050, 101.7993, 26.5393, 115.6201),
            ),
            (
                "Shanghai, China".to_owned(),
                bbox(30.6426382, 120.825134, 31.91253608, 122.2803344),
            ),
        ];

        SearchOptions {
            country_groups,
            country_aliases,
            place_bounds,
            home_bounds: bbox(-36.738, -110.566, 51.069, 110.566),
        }
    }
}

/// Columns shown in the results table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// `(column title, attribute name)` in display order. The first column is the linked name.
    pub columns: Vec<(String, String)>,
    /// Attribute holding the link target for the name column.
    pub link_attribute: String,
}

impl Default for TableOptions {
    fn default() -> Self {
        let columns = [
            ("Unit", "unit"),
            ("Plant", "plant"),
            ("Other names", "other_names"),
            ("Sponsor", "sponsor"),
            ("Capacity (MW)", "capacity_mw"),
            ("Status", "status"),
            ("Region", "region"),
            ("Country", "country"),
            ("Subnational unit", "subnational_unit"),
        ]
        .iter()
        .map(|(title, attr)| (title.to_string(), attr.to_string()))
        .collect();

        TableOptions {
            columns,
            link_attribute: "wiki_page".to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cluster.min_distance, 30.0);
        assert_eq!(config.categories.len(), 9);
    }

    #[test]
    fn test_partial_json_config() {
        let json = r##"{
            "categories": [
                {"key": "operating", "text": "Operating", "color": "#845440"},
                {"key": "proposed", "text": "Proposed", "color": "#ffa500", "visible": false}
            ],
            "cluster": {"min_distance": 45.0}
        }"##;

        let config: MapConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.cluster.min_distance, 45.0);
        assert_eq!(config.cluster.view_padding, 0.5);
        assert_eq!(config.icon.max_radius, 21.0);
    }

    #[test]
    fn test_invalid_icon_style_rejected() {
        let mut config = MapConfig::default();
        config.icon.min_radius = 30.0;
        assert!(config.validate().is_err());

        let mut config = MapConfig::default();
        config.cluster.min_distance = -1.0;
        assert!(config.validate().is_err());
    }
}
