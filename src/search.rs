/*!
 * Turning a search request into a result set.
 *
 * Searches by region, country, and subnational unit match record attributes exactly. Free text
 * searches look for the text in any attribute. Place name searches go through an external
 * [Geocoder] to find the country the place is in, and then search that country.
 */
use crate::{
    config::{MapConfig, SearchOptions},
    error::GeocodeError,
    geo::BoundingBox,
    record::{Record, RecordStore},
};
use strum::{AsRefStr, EnumString};

const REGION_ATTRIBUTE: &str = "region";
const COUNTRY_ATTRIBUTE: &str = "country";
const SUBNATIONAL_ATTRIBUTE: &str = "subnational_unit";

/// Separates the parts of a place name in the search menus, e.g. "India - Gujarat".
const PLACE_SEPARATOR: &str = " - ";

/// The kinds of search offered by the menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SearchKind {
    Everything,
    Region,
    Country,
    Subnational,
    Text,
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Everything,
    Region(String),
    Country(String),
    Subnational { name: String, country: String },
    Text(String),
}

impl SearchQuery {
    /**
     * Interpret a menu selection.
     *
     * Region entries look like "EU28 - All countries", only the part before the separator is the
     * region. Any other entry of the form "Country - Place" is a subnational unit, and everything
     * else is a country.
     *
     * # Arguments
     * kind - which menu the selection came from.
     * place - the text of the selection.
     */
    pub fn dispatch(kind: SearchKind, place: &str) -> SearchQuery {
        match kind {
            SearchKind::Everything => SearchQuery::Everything,
            SearchKind::Text => SearchQuery::Text(place.to_owned()),
            SearchKind::Region => {
                let region = place.split(PLACE_SEPARATOR).next().unwrap_or(place);
                SearchQuery::Region(region.to_owned())
            }
            SearchKind::Country | SearchKind::Subnational => {
                let mut parts = place.split(PLACE_SEPARATOR);
                match (parts.next(), parts.next()) {
                    (Some(country), Some(name)) => SearchQuery::Subnational {
                        name: name.to_owned(),
                        country: country.to_owned(),
                    },
                    _ => SearchQuery::Country(place.to_owned()),
                }
            }
        }
    }

    /// The text describing the results of this search.
    pub fn label(&self) -> String {
        match self {
            SearchQuery::Everything => "All Trackers".to_owned(),
            SearchQuery::Region(name) | SearchQuery::Country(name) => name.clone(),
            SearchQuery::Subnational { name, country } => format!("{}, {}", name, country),
            SearchQuery::Text(needle) => format!("\"{}\"", needle),
        }
    }

    /// Does the record belong in the results?
    pub fn matches(&self, record: &Record, options: &SearchOptions) -> bool {
        let attr_is = |key: &str, value: &str| {
            record
                .attribute_text(key)
                .map(|v| v == value)
                .unwrap_or(false)
        };

        match self {
            SearchQuery::Everything => true,
            SearchQuery::Region(name) => {
                if attr_is(REGION_ATTRIBUTE, name) {
                    return true;
                }

                let country = match record.attribute_text(COUNTRY_ATTRIBUTE) {
                    Some(country) => country,
                    None => return false,
                };

                options
                    .country_groups
                    .iter()
                    .filter(|g| &g.name == name)
                    .any(|g| g.countries.iter().any(|c| *c == country))
            }
            SearchQuery::Country(name) => attr_is(COUNTRY_ATTRIBUTE, name),
            SearchQuery::Subnational { name, country } => {
                attr_is(COUNTRY_ATTRIBUTE, country) && attr_is(SUBNATIONAL_ATTRIBUTE, name)
            }
            SearchQuery::Text(needle) => {
                let needle = needle.trim().to_lowercase();
                if needle.is_empty() {
                    return true;
                }

                record.attributes.keys().any(|key| {
                    record
                        .attribute_text(key)
                        .map(|v| v.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
        }
    }

    /// Run the search over every record in the store.
    pub fn run(&self, store: &RecordStore, config: &MapConfig) -> SearchResult {
        let options = &config.search;

        let records: Vec<Record> = store
            .records()
            .iter()
            .filter(|r| self.matches(r, options))
            .cloned()
            .collect();

        let bounds = self.fit_bounds(&records, options);
        let label = self.label();

        log::info!("search for {} found {} records", label, records.len());

        SearchResult {
            records,
            label,
            bounds,
        }
    }

    /// Where the map should go to show the results.
    fn fit_bounds(&self, records: &[Record], options: &SearchOptions) -> Option<BoundingBox> {
        match self {
            SearchQuery::Everything => Some(options.home_bounds),
            SearchQuery::Subnational { .. } => {
                let place = self.label();
                options
                    .place_bounds
                    .iter()
                    .find(|(name, _)| *name == place)
                    .map(|(_, bounds)| *bounds)
                    .or_else(|| BoundingBox::around(records.iter().map(|r| r.position)))
            }
            _ => BoundingBox::around(records.iter().map(|r| r.position)),
        }
    }
}

/// The records found by a search, ready for the view synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub records: Vec<Record>,
    pub label: String,
    /// Bounds to fit the map to, `None` if there is nothing to show.
    pub bounds: Option<BoundingBox>,
}

/// What the geocoder knows about a place.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    /// The country the place is in, as the geocoder names it.
    pub country: Option<String>,
    pub bounds: Option<BoundingBox>,
}

/// An external service resolving free form addresses and place names.
pub trait Geocoder {
    /// Look up a cleaned up address, `None` if nothing was found.
    fn lookup(&self, address: &str) -> Option<GeocodeHit>;
}

/// Trim and lower case an address before sending it to the geocoder, and spell out the first `&`.
pub fn clean_address(address: &str) -> String {
    address.trim().to_lowercase().replacen('&', "and", 1)
}

/// Translate a geocoder country name into the name used in the data.
pub fn country_alias<'a>(country: &'a str, options: &'a SearchOptions) -> &'a str {
    options
        .country_aliases
        .iter()
        .find(|(from, _)| from == country)
        .map(|(_, to)| to.as_str())
        .unwrap_or(country)
}

/// Find the country a place is in and make a country search out of it.
pub fn place_search(
    geocoder: &dyn Geocoder,
    place: &str,
    options: &SearchOptions,
) -> Result<SearchQuery, GeocodeError> {
    let address = clean_address(place);

    let country = geocoder
        .lookup(&address)
        .and_then(|hit| hit.country)
        .filter(|c| !c.trim().is_empty());

    match country {
        Some(country) => Ok(SearchQuery::Country(
            country_alias(&country, options).to_owned(),
        )),
        None => {
            log::warn!("geocoder could not place \"{}\"", address);
            Err(GeocodeError::NOT_FOUND)
        }
    }
}
