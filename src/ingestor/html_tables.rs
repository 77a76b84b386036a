//! HTML table reader
//!
//! Turns arbitrary markup into plain text tables: every `<table>` in document
//! order, with the nearest preceding `<h1>`..`<h6>` heading, its caption, the
//! index of its header row (when marked up) and the text of each row. Nested
//! tables are read as tables of their own and their rows are never attributed
//! to the outer table.

use scraper::{ElementRef, Html, Selector};

use crate::utils::collapse_whitespace;

/// Upper bound for `colspan` expansion
const MAX_COLSPAN: usize = 32;

/// One table's text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Position of the table in the document (0-based)
    pub index: usize,
    /// Nearest heading preceding the table
    pub heading: Option<String>,
    pub caption: Option<String>,
    /// Row index of the marked-up header (`<thead>` row or all-`<th>` row)
    pub header_index: Option<usize>,
    /// Cell text per row, `colspan` expanded with empty cells
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Heading texts for context lookups, most specific first.
    pub fn context_texts(&self) -> Vec<&str> {
        self.caption
            .as_deref()
            .into_iter()
            .chain(self.heading.as_deref())
            .collect()
    }
}

struct TableSelectors {
    blocks: Selector,
    rows: Selector,
    caption: Selector,
}

impl TableSelectors {
    fn new() -> Self {
        Self {
            blocks: Selector::parse("h1, h2, h3, h4, h5, h6, table").expect("valid selector"),
            rows: Selector::parse("tr").expect("valid selector"),
            caption: Selector::parse("caption").expect("valid selector"),
        }
    }
}

/// Read every table of a document.
pub fn read_tables(markup: &str) -> Vec<RawTable> {
    let document = Html::parse_document(markup);
    let selectors = TableSelectors::new();

    let mut tables = Vec::new();
    let mut last_heading: Option<String> = None;

    for block in document.select(&selectors.blocks) {
        if block.value().name() != "table" {
            // Headings inside table cells are cell content, not section headings
            if enclosing_table(&block).is_none() {
                let text = element_text(&block);
                if !text.is_empty() {
                    last_heading = Some(text);
                }
            }
            continue;
        }

        tables.push(read_table(&block, &selectors, tables.len(), last_heading.clone()));
    }

    tables
}

fn read_table(
    table: &ElementRef<'_>,
    selectors: &TableSelectors,
    index: usize,
    heading: Option<String>,
) -> RawTable {
    let caption = table
        .select(&selectors.caption)
        .find(|c| enclosing_table(c).map(|t| t.id()) == Some(table.id()))
        .map(|c| element_text(&c))
        .filter(|text| !text.is_empty());

    let row_elements: Vec<ElementRef<'_>> = table
        .select(&selectors.rows)
        .filter(|row| enclosing_table(row).map(|t| t.id()) == Some(table.id()))
        .collect();

    let header_index = row_elements
        .iter()
        .rposition(|row| in_thead(row))
        .or_else(|| row_elements.iter().position(is_all_th));

    let rows = row_elements.iter().map(row_cells).collect();

    RawTable {
        index,
        heading,
        caption,
        header_index,
        rows,
    }
}

fn row_cells(row: &ElementRef<'_>) -> Vec<String> {
    let mut cells = Vec::new();
    for cell in row.children().filter_map(ElementRef::wrap) {
        if !matches!(cell.value().name(), "td" | "th") {
            continue;
        }
        cells.push(element_text(&cell));

        let span = cell
            .value()
            .attr("colspan")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_COLSPAN);
        cells.extend(std::iter::repeat(String::new()).take(span - 1));
    }
    cells
}

fn cell_elements<'a>(row: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
}

fn is_all_th(row: &ElementRef<'_>) -> bool {
    let mut cells = cell_elements(row).peekable();
    cells.peek().is_some() && cells.all(|c| c.value().name() == "th")
}

fn in_thead(row: &ElementRef<'_>) -> bool {
    row.parent()
        .and_then(ElementRef::wrap)
        .map_or(false, |p| p.value().name() == "thead")
}

fn enclosing_table<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_tables_with_headings_in_document_order() {
        let html = r#"
            <h2>Open – Women</h2>
            <table>
              <thead><tr><th>Event</th><th>Time</th></tr></thead>
              <tbody><tr><td>100m Rescue Medley</td><td>1:05.32</td></tr></tbody>
            </table>
            <h2>Open – Men</h2>
            <table><tr><td>50m Manikin Carry</td><td>28.10</td></tr></table>
        "#;

        let tables = read_tables(html);
        assert_eq!(tables.len(), 2);

        assert_eq!(tables[0].heading.as_deref(), Some("Open – Women"));
        assert_eq!(tables[0].header_index, Some(0));
        assert_eq!(tables[0].rows[1], vec!["100m Rescue Medley", "1:05.32"]);

        assert_eq!(tables[1].index, 1);
        assert_eq!(tables[1].heading.as_deref(), Some("Open – Men"));
        assert_eq!(tables[1].header_index, None);
    }

    #[test]
    fn test_all_th_row_is_header_and_colspan_expands() {
        let html = r#"
            <table>
              <caption>Short course</caption>
              <tr><th>Event</th><th>Athlete</th><th>Time</th></tr>
              <tr><td colspan="3">Women</td></tr>
              <tr><td>200m Obstacle Swim</td><td>Jane  <br>Doe</td><td>2:03.11</td></tr>
            </table>
        "#;

        let tables = read_tables(html);
        let table = &tables[0];
        assert_eq!(table.caption.as_deref(), Some("Short course"));
        assert_eq!(table.header_index, Some(0));
        assert_eq!(table.rows[1], vec!["Women", "", ""]);
        assert_eq!(table.rows[2][1], "Jane Doe");
        assert_eq!(table.context_texts(), vec!["Short course"]);
    }

    #[test]
    fn test_nested_table_rows_stay_with_their_table() {
        let html = r#"
            <table>
              <tr><td>outer</td><td><table><tr><td>inner a</td><td>inner b</td></tr></table></td></tr>
            </table>
        "#;

        let tables = read_tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[1].rows, vec![vec!["inner a", "inner b"]]);
    }

    #[test]
    fn test_markup_without_tables() {
        assert!(read_tables("<p>No records yet</p>").is_empty());
        assert!(read_tables("").is_empty());
    }
}
