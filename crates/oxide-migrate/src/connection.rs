//! The connection seam between the pipeline and a live database.

use oxide_schema::platform::Platform;
use oxide_schema::types::Value;

use crate::error::Result;

/// A result row: column names with their decoded values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Appends a column, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.push((name.into(), value.into()));
    }

    /// Looks up a column by name. Catalog aliases come back in whatever
    /// case the server chose, so the lookup ignores case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// The column as text; `None` when absent or NULL.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The column as an integer; text is parsed, booleans map to 0/1.
    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The column as a flag: non-zero integers are `true`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.integer(name).is_some_and(|i| i != 0)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A blocking connection to one database.
///
/// Implementations only provide raw statement execution; transaction and
/// savepoint control default to the platform's SQL.
pub trait Connection {
    /// The SQL dialect spoken by this connection.
    fn platform(&self) -> &dyn Platform;

    /// Executes a statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MigrateError::QueryFailed`] if the database rejects it.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Runs a query and returns all rows.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MigrateError::QueryFailed`] if the database rejects it.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::execute`] failures.
    fn begin(&mut self) -> Result<()> {
        let sql = self.platform().begin_sql();
        self.execute(sql).map(drop)
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::execute`] failures.
    fn commit(&mut self) -> Result<()> {
        let sql = self.platform().commit_sql();
        self.execute(sql).map(drop)
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::execute`] failures.
    fn rollback(&mut self) -> Result<()> {
        let sql = self.platform().rollback_sql();
        self.execute(sql).map(drop)
    }

    /// Creates a savepoint.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::execute`] failures.
    fn savepoint(&mut self, name: &str) -> Result<()> {
        let sql = self.platform().savepoint_sql(name);
        self.execute(&sql).map(drop)
    }

    /// Releases a savepoint, keeping its changes.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::execute`] failures.
    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        let sql = self.platform().release_savepoint_sql(name);
        self.execute(&sql).map(drop)
    }

    /// Undoes everything since a savepoint.
    ///
    /// # Errors
    ///
    /// Propagates [`Connection::execute`] failures.
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let sql = self.platform().rollback_to_savepoint_sql(name);
        self.execute(&sql).map(drop)
    }
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn platform(&self) -> &dyn Platform {
        (**self).platform()
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        (**self).execute(sql)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        (**self).query(sql)
    }
}
