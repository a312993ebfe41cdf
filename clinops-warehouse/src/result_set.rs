use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{WarehouseError, WarehouseResult};

/// Textual formats accepted for timestamps in addition to epoch seconds.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Metadata of a single result column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// The column name as reported by the warehouse.
    pub name: String,
    /// The warehouse type name, e.g. `fixed` or `timestamp_ntz`.
    pub kind: String,
}

/// A single row as returned by the warehouse: one optional string per column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    /// Creates a row from raw column values.
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw value at `idx`, `None` for SQL `NULL`.
    pub fn raw(&self, idx: usize) -> WarehouseResult<Option<&str>> {
        self.values
            .get(idx)
            .map(Option::as_deref)
            .ok_or_else(|| WarehouseError::decode(idx, "column out of range"))
    }

    /// Returns the non-null string value at `idx`.
    pub fn text(&self, idx: usize) -> WarehouseResult<&str> {
        self.raw(idx)?
            .ok_or_else(|| WarehouseError::decode(idx, "unexpected NULL"))
    }

    /// Parses the non-null value at `idx`.
    pub fn get<T>(&self, idx: usize) -> WarehouseResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.text(idx)?;
        text.trim()
            .parse()
            .map_err(|err| WarehouseError::decode(idx, format!("{text:?}: {err}")))
    }

    /// Parses the value at `idx`, mapping `NULL` to `None`.
    pub fn get_opt<T>(&self, idx: usize) -> WarehouseResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.raw(idx)? {
            None => Ok(None),
            Some(_) => self.get(idx).map(Some),
        }
    }

    /// Decodes a boolean, accepting the spellings the warehouse uses for flags.
    pub fn flag(&self, idx: usize) -> WarehouseResult<bool> {
        let text = self.text(idx)?;
        match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "y" | "yes" | "1" => Ok(true),
            "false" | "f" | "n" | "no" | "0" => Ok(false),
            _ => Err(WarehouseError::decode(idx, format!("{text:?} is not a boolean"))),
        }
    }

    /// Decodes a timestamp.
    ///
    /// The SQL API encodes timestamps as fractional seconds since the epoch, optionally followed
    /// by a time zone offset. Textual timestamps are accepted as well.
    pub fn timestamp(&self, idx: usize) -> WarehouseResult<NaiveDateTime> {
        let text = self.text(idx)?;
        parse_timestamp(text).ok_or_else(|| {
            WarehouseError::decode(idx, format!("{text:?} is not a timestamp"))
        })
    }

    /// Decodes a nullable timestamp.
    pub fn timestamp_opt(&self, idx: usize) -> WarehouseResult<Option<NaiveDateTime>> {
        match self.raw(idx)? {
            None => Ok(None),
            Some(_) => self.timestamp(idx).map(Some),
        }
    }

    /// Decodes a date, encoded either as days since the epoch or as `YYYY-MM-DD`.
    pub fn date(&self, idx: usize) -> WarehouseResult<NaiveDate> {
        let text = self.text(idx)?.trim();
        let parsed = match text.parse::<i64>() {
            Ok(days) => NaiveDate::default().checked_add_signed(chrono::Duration::days(days)),
            Err(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok(),
        };
        parsed.ok_or_else(|| WarehouseError::decode(idx, format!("{text:?} is not a date")))
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let epoch = text.split_whitespace().next().unwrap_or(text);
    if let Ok(seconds) = epoch.parse::<f64>() {
        let secs = seconds.floor();
        let nanos = ((seconds - secs) * 1e9).round() as u32;
        return DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
            .map(|dt| dt.naive_utc());
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Decodes a typed record from a [`Row`].
///
/// Implementations should address columns by position, in the order of the statement's select
/// list.
pub trait FromRow: Sized {
    /// Decodes one row.
    fn from_row(row: &Row) -> WarehouseResult<Self>;
}

/// The complete, ordered result of one statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Row>,
    statement_handle: Option<String>,
}

impl ResultSet {
    /// Creates a result set from column names and raw rows.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            statement_handle: None,
        }
    }

    /// Builds a result set from string literals, mostly useful for tests and stubs.
    ///
    /// Every column is reported as `text`.
    pub fn from_strings<'a, R>(columns: &[&str], rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = Option<&'a str>>,
    {
        let columns = columns
            .iter()
            .map(|name| Column {
                name: (*name).to_owned(),
                kind: "text".to_owned(),
            })
            .collect();
        let rows = rows
            .into_iter()
            .map(|row| Row::new(row.into_iter().map(|v| v.map(str::to_owned)).collect()))
            .collect();
        Self::new(columns, rows)
    }

    /// Attaches the warehouse statement handle.
    pub fn with_statement_handle(mut self, handle: impl Into<String>) -> Self {
        self.statement_handle = Some(handle.into());
        self
    }

    /// The warehouse statement handle (query id), if known.
    pub fn statement_handle(&self) -> Option<&str> {
        self.statement_handle.as_deref()
    }

    /// Column metadata, in select-list order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// All rows, in the order the warehouse returned them.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the statement produced no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decodes every row into `T`, failing on the first row that does not decode.
    pub fn decode<T: FromRow>(&self) -> WarehouseResult<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }

    pub(crate) fn extend_rows(&mut self, rows: impl IntoIterator<Item = Row>) {
        self.rows.extend(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Visit {
        id: String,
        count: u32,
        at: Option<NaiveDateTime>,
    }

    impl FromRow for Visit {
        fn from_row(row: &Row) -> WarehouseResult<Self> {
            Ok(Self {
                id: row.text(0)?.to_owned(),
                count: row.get(1)?,
                at: row.timestamp_opt(2)?,
            })
        }
    }

    #[test]
    fn decodes_typed_rows() {
        let rs = ResultSet::from_strings(
            &["ID", "COUNT", "AT"],
            [
                [Some("a"), Some("3"), Some("1700000000.500000000")],
                [Some("b"), Some("0"), None],
            ],
        );

        let visits: Vec<Visit> = rs.decode().unwrap();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].count, 3);
        assert_eq!(
            visits[0].at.unwrap().and_utc().timestamp_millis(),
            1_700_000_000_500
        );
        assert_eq!(visits[1].at, None);
    }

    #[test]
    fn decode_reports_bad_column() {
        let rs = ResultSet::from_strings(&["ID", "COUNT", "AT"], [[Some("a"), Some("x"), None]]);

        let err = rs.decode::<Visit>().unwrap_err();
        assert!(matches!(err, WarehouseError::Decode { column: 1, .. }));
    }

    #[test]
    fn parses_dates_and_flags() {
        let row = Row::new(vec![
            Some("19723".into()),
            Some("2024-01-01".into()),
            Some("TRUE".into()),
            Some("2024-01-01 10:00:00".into()),
        ]);

        let expected = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(row.date(0).unwrap(), expected);
        assert_eq!(row.date(1).unwrap(), expected);
        assert!(row.flag(2).unwrap());
        assert_eq!(
            row.timestamp(3).unwrap(),
            expected.and_hms_opt(10, 0, 0).unwrap()
        );
        assert!(row.text(9).is_err());
    }
}
