//! Record extraction from HTML tables
//!
//! Each table is resolved and read independently. Rows are normalised into
//! [`RecordCandidate`]s; anything a row lacks is left empty for the validator,
//! so a bad row or table never stops the rest of the page from being read.

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::column_resolver::{
    ColumnField, ColumnMap, ColumnResolver, POSITIONAL_LAYOUT, POSITIONAL_MIN_COLUMNS,
};
use super::html_tables::{read_tables, RawTable};
use crate::models::{Gender, RecordCandidate, RecordScope, SkipCounts, SkipReason, Timing};
use crate::normalize::{
    detect_pool_length, detect_timing, extract_nation, normalize_gender, parse_discipline,
    strip_time_annotations, DisciplineParts,
};
use crate::utils::{parse_record_date, parse_time_to_millis};

/// Counters collected while reading one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub tables_found: usize,
    /// Tables whose columns could not be resolved
    pub tables_skipped: usize,
    /// Data rows with at least two populated cells
    pub parsed_rows: usize,
    pub skipped: SkipCounts,
}

/// Everything read from one document. Iterating it yields the candidates.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub candidates: Vec<RecordCandidate>,
    pub stats: ExtractStats,
}

impl IntoIterator for Extraction {
    type Item = RecordCandidate;
    type IntoIter = std::vec::IntoIter<RecordCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

pub struct RecordExtractor {
    resolver: &'static ColumnResolver,
    scope: RecordScope,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new(ColumnResolver::global())
    }
}

/// Per-table context that applies to every row of the table
struct TableContext<'t> {
    texts: Vec<&'t str>,
    discipline: Option<DisciplineParts>,
}

/// Single-cell rows seen so far in a table, kept per kind so a discipline
/// sub-heading does not drop the gender heading above it.
#[derive(Debug, Default, Clone, Copy)]
struct SectionScope<'t> {
    gender: Option<&'t str>,
    event: Option<&'t str>,
    other: Option<&'t str>,
}

impl<'t> SectionScope<'t> {
    fn enter(&mut self, text: &'t str) {
        let names_event = parse_discipline(text).is_some_and(|p| p.event.is_some());
        let names_gender = normalize_gender(text).is_known();

        if names_event {
            self.event = Some(text);
            if names_gender {
                self.gender = Some(text);
            }
        } else if names_gender {
            self.gender = Some(text);
            self.event = None;
        } else {
            self.other = Some(text);
            self.event = None;
        }
    }

    /// All section texts, most specific first
    fn texts(&self) -> impl Iterator<Item = &'t str> {
        [self.event, self.gender, self.other].into_iter().flatten()
    }

    /// Section texts that may carry a pool marker. Event names are left out
    /// since `50m Manikin Carry` is a distance.
    fn pool_texts(&self) -> impl Iterator<Item = &'t str> {
        [self.gender, self.other].into_iter().flatten()
    }
}

impl RecordExtractor {
    pub fn new(resolver: &'static ColumnResolver) -> Self {
        Self {
            resolver,
            scope: RecordScope::World,
        }
    }

    /// Read all tables of `markup`. Every call is a fresh, complete pass.
    pub fn extract(&self, markup: &str, source_url: &str) -> Extraction {
        let now = Utc::now();
        let tables = read_tables(markup);

        let mut extraction = Extraction::default();
        extraction.stats.tables_found = tables.len();

        for table in &tables {
            self.extract_table(table, source_url, now, &mut extraction);
        }

        debug!(
            "Extracted {} candidates from {} tables ({} rows) at {}",
            extraction.candidates.len(),
            extraction.stats.tables_found,
            extraction.stats.parsed_rows,
            source_url
        );
        extraction
    }

    fn extract_table(
        &self,
        table: &RawTable,
        source_url: &str,
        now: DateTime<Utc>,
        out: &mut Extraction,
    ) {
        let Some((columns, data_start)) = self.resolve_columns(table) else {
            debug!(
                "Table {} at {} has no recognisable columns, skipping",
                table.index, source_url
            );
            out.stats.tables_skipped += 1;
            return;
        };

        let context = TableContext {
            texts: table.context_texts(),
            discipline: table
                .context_texts()
                .iter()
                .filter_map(|t| parse_discipline(t))
                .find(|p| p.class.is_some()),
        };
        let header = table.header_index.and_then(|i| table.rows.get(i));
        let mut section = SectionScope::default();

        for (idx, cells) in table.rows.iter().enumerate().skip(data_start) {
            if Some(idx) == table.header_index || Some(cells) == header {
                continue;
            }

            let populated: Vec<&str> = cells
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();

            match populated.len() {
                0 => continue,
                1 => {
                    let text = populated[0];
                    let in_time_column = columns.cell(ColumnField::Time, cells).is_some();
                    if in_time_column || parse_time_to_millis(text).is_some() {
                        trace!("Short row in table {}: {:?}", table.index, cells);
                        out.stats.skipped.record(SkipReason::ShortRow);
                    } else {
                        section.enter(text);
                    }
                    continue;
                }
                _ => {}
            }

            out.stats.parsed_rows += 1;
            let candidate = build_candidate(
                self.scope,
                &columns,
                cells,
                &section,
                &context,
                source_url,
                now,
            );
            out.candidates.push(candidate);
        }
    }

    /// Column map plus the first data row. Tables whose header resolves
    /// neither discipline nor time fall back to the positional layout when
    /// wide enough.
    fn resolve_columns(&self, table: &RawTable) -> Option<(ColumnMap, usize)> {
        let header_idx = table.header_index.unwrap_or(0);
        let header = table.rows.get(header_idx)?;

        let columns = self.resolver.resolve(header);
        if columns.contains(ColumnField::Discipline) || columns.contains(ColumnField::Time) {
            return Some((columns, header_idx + 1));
        }

        let width = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        if width >= POSITIONAL_MIN_COLUMNS {
            let start = table.header_index.map_or(0, |i| i + 1);
            return Some((ColumnMap::positional(POSITIONAL_LAYOUT), start));
        }

        None
    }
}

fn build_candidate(
    scope: RecordScope,
    columns: &ColumnMap,
    cells: &[String],
    section: &SectionScope<'_>,
    context: &TableContext<'_>,
    source_url: &str,
    now: DateTime<Utc>,
) -> RecordCandidate {
    let discipline_text = columns.cell(ColumnField::Discipline, cells);

    // Discipline: the cell, else a section or table heading naming an event
    let mut discipline = discipline_text
        .and_then(parse_discipline)
        .filter(|p| p.event.is_some())
        .or_else(|| section.event.and_then(parse_discipline))
        .or_else(|| {
            context
                .texts
                .iter()
                .filter_map(|t| parse_discipline(t))
                .find(|p| p.event.is_some())
        });
    if let Some(parts) = discipline.as_mut() {
        let inherited = columns
            .cell(ColumnField::Category, cells)
            .and_then(parse_discipline)
            .into_iter()
            .chain(section.texts().filter_map(parse_discipline))
            .chain(context.discipline.clone());
        for ctx in inherited {
            parts.inherit(&ctx);
        }
    }

    // Gender: column, then section heading, then table heading, then event text
    let gender = columns
        .cell(ColumnField::Gender, cells)
        .map(normalize_gender)
        .into_iter()
        .chain(section.gender.map(normalize_gender))
        .chain(context.texts.iter().map(|t| normalize_gender(t)))
        .chain(discipline_text.map(normalize_gender))
        .find(Gender::is_known)
        .unwrap_or(Gender::Unknown);

    let mut pool_texts: Vec<&str> = Vec::with_capacity(4);
    pool_texts.extend(columns.cell(ColumnField::Pool, cells));
    pool_texts.extend(section.pool_texts());
    pool_texts.extend(context.texts.iter().copied());
    let pool_length = detect_pool_length(&pool_texts);

    let time_text = columns.cell(ColumnField::Time, cells);
    let timing = match columns.cell(ColumnField::Timing, cells) {
        Some(text) => detect_timing(text),
        None => time_text
            .into_iter()
            .chain(section.texts())
            .chain(context.texts.iter().copied())
            .map(detect_timing)
            .find(|t| *t == Timing::Hand)
            .unwrap_or_default(),
    };
    let time_millis = time_text.and_then(|t| parse_time_to_millis(&strip_time_annotations(t)));

    let (athlete_name, embedded_nation) = match columns.cell(ColumnField::Athlete, cells) {
        Some(text) => {
            let (name, nation) = extract_nation(text);
            (Some(name).filter(|n| !n.is_empty()), nation)
        }
        None => (None, None),
    };
    let nation = columns
        .cell(ColumnField::Nation, cells)
        .map(str::to_string)
        .or(embedded_nation);

    RecordCandidate {
        record_scope: scope,
        discipline_code: discipline.and_then(|p| p.code()),
        gender,
        pool_length,
        timing,
        time_millis,
        athlete_name,
        nation,
        club: columns.cell(ColumnField::Club, cells).map(str::to_string),
        meet_name: columns.cell(ColumnField::Meet, cells).map(str::to_string),
        city: columns.cell(ColumnField::City, cells).map(str::to_string),
        record_date: columns
            .cell(ColumnField::Date, cells)
            .and_then(parse_record_date),
        source_url: source_url.to_string(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PoolLength;
    use chrono::NaiveDate;

    const URL: &str = "https://records.example/world";

    #[test]
    fn test_extracts_row_with_heading_gender() {
        let html = r#"
            <h2>Open – Women</h2>
            <table>
              <tr><th>Event</th><th>Athlete</th><th>Date</th><th>Time</th></tr>
              <tr><td>Open - 100m Rescue Medley - Women</td><td>Jane Doe (GER)</td><td>01-01-2020</td><td>1:05.32</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        assert_eq!(extraction.stats.tables_found, 1);
        assert_eq!(extraction.stats.parsed_rows, 1);

        let c = &extraction.candidates[0];
        assert_eq!(c.discipline_code.as_deref(), Some("100_MEDLEY"));
        assert_eq!(c.gender, Gender::Female);
        assert_eq!(c.pool_length, PoolLength::Long);
        assert_eq!(c.timing, Timing::Electronic);
        assert_eq!(c.time_millis, Some(65320));
        assert_eq!(c.athlete_name.as_deref(), Some("Jane Doe"));
        assert_eq!(c.nation.as_deref(), Some("GER"));
        assert_eq!(c.record_date, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(c.source_url, URL);
    }

    #[test]
    fn test_section_rows_scope_following_rows() {
        let html = r#"
            <h3>Short Course</h3>
            <table>
              <thead><tr><th>Event</th><th>Name</th><th>Time</th></tr></thead>
              <tbody>
                <tr><td colspan="3">Men</td></tr>
                <tr><td>50m Manikin Carry</td><td>John Roe</td><td>28.10</td></tr>
                <tr><td colspan="3">Women</td></tr>
                <tr><td>50m Manikin Carry</td><td>Jane Doe</td><td>31,45 HT</td></tr>
              </tbody>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        assert_eq!(extraction.stats.parsed_rows, 2);

        let men = &extraction.candidates[0];
        assert_eq!(men.gender, Gender::Male);
        assert_eq!(men.pool_length, PoolLength::Short);
        assert_eq!(men.time_millis, Some(28100));
        assert_eq!(men.timing, Timing::Electronic);

        let women = &extraction.candidates[1];
        assert_eq!(women.gender, Gender::Female);
        assert_eq!(women.time_millis, Some(31450));
        assert_eq!(women.timing, Timing::Hand);
    }

    #[test]
    fn test_discipline_section_row_does_not_set_pool() {
        let html = r#"
            <h2>Short Course - Women</h2>
            <table>
              <tr><th>Athlete</th><th>Time</th><th>Date</th></tr>
              <tr><td colspan="3">50m Manikin Carry</td></tr>
              <tr><td>Jane Doe</td><td>31.20</td><td>2021-05-01</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        let c = &extraction.candidates[0];
        assert_eq!(c.discipline_code.as_deref(), Some("50_MAN"));
        assert_eq!(c.gender, Gender::Female);
        assert_eq!(c.pool_length, PoolLength::Short);
    }

    #[test]
    fn test_discipline_section_keeps_gender_section() {
        let html = r#"
            <table>
              <tr><th>Athlete</th><th>Time</th><th>Nation</th></tr>
              <tr><td colspan="3">Mens</td></tr>
              <tr><td colspan="3">100m Rescue Medley</td></tr>
              <tr><td>John Roe</td><td>55.10</td><td>ITA</td></tr>
              <tr><td colspan="3">200m Obstacle Swim</td></tr>
              <tr><td>Max Muster</td><td>1:52.00</td><td>GER</td></tr>
              <tr><td colspan="3">Womens</td></tr>
              <tr><td colspan="3">100m Rescue Medley</td></tr>
              <tr><td>Jane Doe</td><td>1:02.50</td><td>AUS</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        let rows: Vec<_> = extraction
            .candidates
            .iter()
            .map(|c| (c.discipline_code.as_deref(), c.gender))
            .collect();
        assert_eq!(
            rows,
            vec![
                (Some("100_MEDLEY"), Gender::Male),
                (Some("200_OBS"), Gender::Male),
                (Some("100_MEDLEY"), Gender::Female),
            ]
        );
    }

    #[test]
    fn test_gender_column_wins_over_heading() {
        let html = r#"
            <h2>Women</h2>
            <table>
              <tr><th>Discipline</th><th>Gender</th><th>Result</th><th>Pool</th></tr>
              <tr><td>200m Obstacle Swim</td><td>M</td><td>1:59.01</td><td>25</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        let c = &extraction.candidates[0];
        assert_eq!(c.gender, Gender::Male);
        assert_eq!(c.pool_length, PoolLength::Short);
        assert_eq!(c.discipline_code.as_deref(), Some("200_OBS"));
    }

    #[test]
    fn test_masters_class_comes_from_heading() {
        let html = r#"
            <h2>Masters M40 Women</h2>
            <table>
              <tr><th>Event</th><th>Time</th><th>Athlete</th></tr>
              <tr><td>100m Rescue Medley</td><td>1:15.00</td><td>A. Swimmer</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        assert_eq!(
            extraction.candidates[0].discipline_code.as_deref(),
            Some("MASTERS_100_MEDLEY_M40")
        );
    }

    #[test]
    fn test_missing_time_column_yields_candidates_without_time() {
        let html = r#"
            <table>
              <tr><th>Event</th><th>Athlete</th><th>Gender</th></tr>
              <tr><td>200m Super Lifesaver</td><td>Jane Doe</td><td>F</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        assert_eq!(extraction.stats.parsed_rows, 1);
        assert_eq!(extraction.candidates[0].time_millis, None);
        assert_eq!(
            extraction.candidates[0].discipline_code.as_deref(),
            Some("200_SUPER")
        );
    }

    #[test]
    fn test_short_rows_and_unresolvable_tables_are_counted() {
        let html = r#"
            <table>
              <tr><th>Event</th><th>Time</th></tr>
              <tr><td></td><td>1:02.00</td></tr>
            </table>
            <table>
              <tr><td>Navigation</td><td>Links</td></tr>
            </table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        assert_eq!(extraction.stats.tables_found, 2);
        assert_eq!(extraction.stats.tables_skipped, 1);
        assert_eq!(extraction.stats.skipped.short_row, 1);
        assert_eq!(extraction.stats.parsed_rows, 0);
        assert!(extraction.candidates.is_empty());
    }

    #[test]
    fn test_positional_layout_for_unlabelled_wide_tables() {
        let html = r#"
            <table><tbody>
              <tr><td>200m Obstacle Swim</td><td>Women</td><td>Open</td><td>Jane Doe</td><td>GER</td><td>2:03.11</td><td>2019-07-01</td><td>Berlin Open</td></tr>
            </tbody></table>
        "#;

        let extraction = RecordExtractor::default().extract(html, URL);
        assert_eq!(extraction.stats.parsed_rows, 1);

        let c = &extraction.candidates[0];
        assert_eq!(c.discipline_code.as_deref(), Some("200_OBS"));
        assert_eq!(c.gender, Gender::Female);
        assert_eq!(c.nation.as_deref(), Some("GER"));
        assert_eq!(c.time_millis, Some(123110));
        assert_eq!(c.meet_name.as_deref(), Some("Berlin Open"));
    }

    #[test]
    fn test_extract_is_repeatable() {
        let html = r#"<table><tr><th>Event</th><th>Time</th></tr><tr><td>Line Throw</td><td>9.50</td></tr></table>"#;
        let extractor = RecordExtractor::default();

        let first: Vec<_> = extractor.extract(html, URL).into_iter().collect();
        let second: Vec<_> = extractor.extract(html, URL).into_iter().collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].discipline_code, second[0].discipline_code);
        assert_eq!(first[0].time_millis, second[0].time_millis);
    }
}
