use std::fmt::{self, Debug};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::WarehouseResult;
use crate::result_set::ResultSet;

/// A type-erased, shareable [`Warehouse`] session.
pub type SharedWarehouse = Arc<dyn Warehouse>;

/// An open session against the warehouse.
///
/// Sessions are opened by the implementation's `connect` constructor and must be closed
/// explicitly with [`Warehouse::close`]. A session may be shared between concurrent tasks.
#[async_trait::async_trait]
pub trait Warehouse: Debug + Send + Sync + 'static {
    /// The implementation name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Executes a statement with positional `?` bind parameters and returns all of its rows.
    async fn execute(&self, sql: &str, params: &[Param]) -> WarehouseResult<ResultSet>;

    /// Closes the session. Further calls to [`execute`](Self::execute) fail.
    async fn close(&self) -> WarehouseResult<()>;
}

/// A positional bind parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    /// A string value.
    Text(String),
    /// An integer value.
    Fixed(i64),
    /// A floating point value.
    Real(f64),
    /// A boolean value.
    Boolean(bool),
    /// A timestamp without time zone.
    Timestamp(NaiveDateTime),
    /// SQL `NULL`.
    Null,
}

impl Param {
    /// The SQL API binding type of this parameter.
    pub fn binding_type(&self) -> &'static str {
        match self {
            Param::Text(_) | Param::Timestamp(_) | Param::Null => "TEXT",
            Param::Fixed(_) => "FIXED",
            Param::Real(_) => "REAL",
            Param::Boolean(_) => "BOOLEAN",
        }
    }

    /// The textual value sent to the warehouse, `None` for `NULL`.
    pub fn binding_value(&self) -> Option<String> {
        match self {
            Param::Text(s) => Some(s.clone()),
            Param::Fixed(v) => Some(v.to_string()),
            Param::Real(v) => Some(v.to_string()),
            Param::Boolean(v) => Some(v.to_string()),
            Param::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
            Param::Null => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binding_value() {
            Some(value) => f.write_str(&value),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_owned())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Fixed(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Real(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Boolean(value)
    }
}

impl From<NaiveDateTime> for Param {
    fn from(value: NaiveDateTime) -> Self {
        Param::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn bindings_for_each_type() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();

        assert_eq!(Param::from("PAT-1").binding_type(), "TEXT");
        assert_eq!(Param::from(7_i64).binding_value().as_deref(), Some("7"));
        assert_eq!(Param::from(true).binding_type(), "BOOLEAN");
        assert_eq!(
            Param::from(ts).binding_value().as_deref(),
            Some("2024-03-01 08:30:00.000")
        );
        assert_eq!(Param::from(None::<String>), Param::Null);
        assert_eq!(Param::Null.binding_value(), None);
    }
}
