/*!
 * The status categories records are classified by.
 *
 * The order of the categories is significant. A category's index is used to order the slices of a
 * cluster's pie chart, so the registry is the only place that order comes from.
 */
use crate::{error::TrackerMapError, TrackerMapResult};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// The most categories a registry can hold.
pub const MAX_CATEGORIES: usize = u8::MAX as usize;

static_assertions::const_assert!(MAX_CATEGORIES <= u8::MAX as usize);

/// Position of a category in the [CategoryRegistry].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub u8);

impl CategoryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// The static description of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Matches the status value in the data.
    pub key: String,
    /// How the category is shown in the legend and in tables.
    pub text: String,
    /// Fill color for markers and pie slices, CSS hex notation.
    pub color: String,
    /// Is the category checked (and its records drawn) when a new result set is shown?
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Category {
    pub fn new(key: &str, text: &str, color: &str, visible: bool) -> Self {
        Category {
            key: key.to_owned(),
            text: text.to_owned(),
            color: color.to_owned(),
            visible,
        }
    }
}

/// The ordered, read only, list of categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Category>", into = "Vec<Category>")]
pub struct CategoryRegistry {
    categories: Vec<Category>,
    by_key: FxHashMap<String, CategoryId>,
}

impl CategoryRegistry {
    /// Build a registry, the order of `categories` becomes the category index order.
    pub fn new(categories: Vec<Category>) -> TrackerMapResult<Self> {
        if categories.is_empty() {
            return Err(TrackerMapError {
                msg: "category registry is empty",
            }
            .into());
        }

        if categories.len() > MAX_CATEGORIES {
            return Err(format!(
                "too many categories: {} (max {})",
                categories.len(),
                MAX_CATEGORIES
            )
            .into());
        }

        let mut by_key = FxHashMap::default();
        for (i, cat) in categories.iter().enumerate() {
            if cat.key.trim().is_empty() {
                return Err(format!("category {} has an empty key", i).into());
            }

            if by_key.insert(cat.key.clone(), CategoryId(i as u8)).is_some() {
                return Err(format!("duplicate category key: {}", cat.key).into());
            }
        }

        Ok(CategoryRegistry { categories, by_key })
    }

    /// The statuses used by the coal plant tracker.
    pub fn coal_plant_statuses() -> Self {
        let categories = vec![
            Category::new("announced", "Announced", "#f3ff00", true),
            Category::new("pre-permit", "Pre-permit", "#ffa500", true),
            Category::new("permitted", "Permitted", "#F26C4F", true),
            Category::new("construction", "Construction", "#ff0000", true),
            Category::new("shelved", "Shelved", "#5974a2", true),
            Category::new("retired", "Retired", "#58a1a1", true),
            Category::new("cancelled", "Cancelled", "#4CDB4C", true),
            Category::new("operating", "Operating", "#845440", true),
            Category::new("mothballed", "Mothballed", "#d6a490", true),
        ];

        let mut by_key = FxHashMap::default();
        for (i, cat) in categories.iter().enumerate() {
            by_key.insert(cat.key.clone(), CategoryId(i as u8));
        }

        CategoryRegistry { categories, by_key }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Look up a category by the status value used in the data.
    ///
    /// Keys are matched exactly first, then ignoring case and surrounding white space since the
    /// data is not always normalized.
    pub fn id_of(&self, key: &str) -> Option<CategoryId> {
        if let Some(id) = self.by_key.get(key) {
            return Some(*id);
        }

        let key = key.trim().to_lowercase();
        self.by_key.get(&key).copied()
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(id.index())
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        id.index() < self.categories.len()
    }

    /// Iterate over the categories in index order.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &Category)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(i, cat)| (CategoryId(i as u8), cat))
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::coal_plant_statuses()
    }
}

impl TryFrom<Vec<Category>> for CategoryRegistry {
    type Error = String;

    fn try_from(categories: Vec<Category>) -> Result<Self, Self::Error> {
        CategoryRegistry::new(categories).map_err(|err| err.to_string())
    }
}

impl From<CategoryRegistry> for Vec<Category> {
    fn from(registry: CategoryRegistry) -> Self {
        registry.categories
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_registry_order_follows_declaration() {
        let reg = CategoryRegistry::coal_plant_statuses();

        assert_eq!(reg.len(), 9);
        assert_eq!(reg.id_of("announced"), Some(CategoryId(0)));
        assert_eq!(reg.id_of("operating"), Some(CategoryId(7)));
        assert_eq!(reg.id_of("mothballed"), Some(CategoryId(8)));

        let keys: Vec<&str> = reg.iter().map(|(_, c)| c.key.as_str()).collect();
        assert_eq!(keys[3], "construction");
    }

    #[test]
    fn test_registry_lookup_is_forgiving() {
        let reg = CategoryRegistry::coal_plant_statuses();
        assert_eq!(reg.id_of(" Operating "), Some(CategoryId(7)));
        assert_eq!(reg.id_of("demolished"), None);
    }

    #[test]
    fn test_registry_rejects_bad_definitions() {
        assert!(CategoryRegistry::new(vec![]).is_err());

        let dup = vec![
            Category::new("a", "A", "#000", true),
            Category::new("a", "Also A", "#fff", true),
        ];
        assert!(CategoryRegistry::new(dup).is_err());

        let blank = vec![Category::new(" ", "Blank", "#000", true)];
        assert!(CategoryRegistry::new(blank).is_err());
    }

    #[test]
    fn test_registry_from_json() {
        let json = r##"[
            {"key": "operating", "text": "Operating", "color": "#845440"},
            {"key": "retired", "text": "Retired", "color": "#58a1a1", "visible": false}
        ]"##;

        let reg: CategoryRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(reg.len(), 2);
        assert!(reg.get(CategoryId(0)).unwrap().visible);
        assert!(!reg.get(CategoryId(1)).unwrap().visible);

        let bad = r##"[{"key": "x", "text": "X", "color": "#000"}, {"key": "x", "text": "Y", "color": "#111"}]"##;
        assert!(serde_json::from_str::<CategoryRegistry>(bad).is_err());
    }
}
