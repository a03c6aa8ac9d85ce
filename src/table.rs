/*!
 * Rows for the results table.
 *
 * The table widget itself is external, this only decides what text goes in which cell.
 */
use crate::{
    config::MapConfig,
    record::{Record, RecordId},
};

/// Attribute that holds the status, shown with the category's display text.
const STATUS_ATTRIBUTE: &str = "status";
/// Attribute every displayable record must have.
const UNIT_ATTRIBUTE: &str = "unit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub text: String,
    /// Target when the cell is a link.
    pub link: Option<String>,
}

/// One line of the results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: RecordId,
    /// One cell per configured column, in column order.
    pub cells: Vec<TableCell>,
}

impl TableRow {
    /**
     * Build the row for a record.
     *
     * Records without a unit name are bad data and produce no row. The first column links to the
     * configured link attribute when the record has one.
     *
     * # Arguments
     * record - the record to display.
     * config - supplies the columns and the category display text.
     */
    pub fn from_record(record: &Record, config: &MapConfig) -> Option<TableRow> {
        record
            .attribute_text(UNIT_ATTRIBUTE)
            .filter(|unit| !unit.trim().is_empty())?;

        let link = record
            .attribute_text(&config.table.link_attribute)
            .filter(|l| !l.is_empty());

        let cells = config
            .table
            .columns
            .iter()
            .enumerate()
            .map(|(i, (_title, attr))| {
                let text = if attr == STATUS_ATTRIBUTE {
                    config
                        .categories
                        .get(record.category)
                        .map(|cat| cat.text.clone())
                        .unwrap_or_default()
                } else {
                    record.attribute_text(attr).unwrap_or_default()
                };

                let link = if i == 0 { link.clone() } else { None };

                TableCell { text, link }
            })
            .collect();

        Some(TableRow {
            id: record.id,
            cells,
        })
    }

    /// Rows for every displayable record, in the order given.
    pub fn from_records<'a, I>(records: I, config: &MapConfig) -> Vec<TableRow>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .filter_map(|r| TableRow::from_record(r, config))
            .collect()
    }
}

/// The caption above the table for a result set.
pub fn table_title(label: &str) -> String {
    format!("Records for {}", label)
}

/// The column titles, in display order.
pub fn column_titles(config: &MapConfig) -> Vec<&str> {
    config
        .table
        .columns
        .iter()
        .map(|(title, _)| title.as_str())
        .collect()
}
