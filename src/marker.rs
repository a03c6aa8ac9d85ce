/*!
 * How a single, unclustered, record looks on the map.
 */
use crate::{config::MapConfig, record::Record};

/// Drawing instructions for one marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerStyle {
    /// Hover text.
    pub title: String,
    /// Short HTML shown in the popup before the user clicks through to the details.
    pub popup_html: String,
    /// Fill color of the marker, the color of the record's category.
    pub color: String,
    /// CSS class for the marker element, derived from the category key.
    pub class_name: String,
}

/// Turns a record into a [MarkerStyle]. Swap in a different implementation to change how single
/// markers look.
pub trait MarkerPreparer {
    fn prepare(&self, record: &Record, config: &MapConfig) -> MarkerStyle;
}

/// Category colored circles with the unit name as the title.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMarkerPreparer;

impl MarkerPreparer for DefaultMarkerPreparer {
    fn prepare(&self, record: &Record, config: &MapConfig) -> MarkerStyle {
        let title = record.title();
        let popup_html = format!(
            "{}<br><div class='popup-click-msg'>Click for details</div>",
            title
        );

        let (color, class_name) = match config.categories.get(record.category) {
            Some(cat) => (
                cat.color.clone(),
                format!("marker-{}", cat.key.replace(' ', "-")),
            ),
            None => ("#808080".to_owned(), "marker-unknown".to_owned()),
        };

        MarkerStyle {
            title,
            popup_html,
            color,
            class_name,
        }
    }
}
