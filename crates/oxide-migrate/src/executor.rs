//! Migration executor.
//!
//! Applies an ordered operation list to a live database inside one
//! transaction, with an optional savepoint per operation.

use tracing::{debug, info, warn};

use oxide_schema::migration::Migration;
use oxide_schema::operation::Operation;
use oxide_schema::platform::Platform;
use oxide_schema::render::render_sql;
use oxide_schema::types::TypeRegistry;

use crate::connection::Connection;
use crate::error::{MigrateError, Result};

/// How a failing operation affects the ones before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionMode {
    /// Savepoint per operation: a failure rolls back only the failing
    /// operation and commits the ones already applied.
    #[default]
    Savepoints,
    /// A failure rolls back the whole run.
    Atomic,
}

/// Executor settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Failure handling.
    pub mode: TransactionMode,
    /// Render SQL without touching the database.
    pub dry_run: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Statements executed, or that would be executed in dry-run mode.
    pub statements: Vec<String>,
    /// Operations applied.
    pub operations_applied: usize,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Executes operations against a database.
#[derive(Debug, Clone, Copy)]
pub struct MigrationExecutor<'r> {
    registry: &'r TypeRegistry,
    options: ApplyOptions,
}

impl<'r> MigrationExecutor<'r> {
    /// Creates an executor in savepoint mode.
    #[must_use]
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            options: ApplyOptions::default(),
        }
    }

    /// Replaces all options.
    #[must_use]
    pub const fn with_options(mut self, options: ApplyOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the transaction mode.
    #[must_use]
    pub const fn mode(mut self, mode: TransactionMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Enables dry-run mode (SQL is returned but not executed).
    #[must_use]
    pub const fn dry_run(mut self, enabled: bool) -> Self {
        self.options.dry_run = enabled;
        self
    }

    /// Renders the statements `ops` would run on `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Schema`] if an operation cannot be rendered.
    pub fn sql_for(&self, platform: &dyn Platform, ops: &[Operation]) -> Result<Vec<String>> {
        Ok(render_sql(ops, platform, self.registry)?)
    }

    /// Applies `ops` in order.
    ///
    /// Every operation is rendered before anything runs, so a rendering
    /// error leaves the database untouched. Constraint enforcement is
    /// switched off around the run; on SQLite this must happen outside the
    /// transaction to take effect.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Schema`] for rendering failures,
    /// [`MigrateError::TransactionFailed`] when an operation or the
    /// transaction control around it is rejected and
    /// [`MigrateError::QueryFailed`] when constraints cannot be switched off.
    pub fn apply<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        ops: &[Operation],
    ) -> Result<ApplyReport> {
        let rendered = ops
            .iter()
            .map(|op| render_sql(std::slice::from_ref(op), conn.platform(), self.registry))
            .collect::<oxide_schema::Result<Vec<_>>>()?;

        if self.options.dry_run {
            info!(operations = ops.len(), "Dry run, nothing executed");
            return Ok(ApplyReport {
                statements: rendered.into_iter().flatten().collect(),
                operations_applied: 0,
                dry_run: true,
            });
        }

        if ops.is_empty() {
            info!("Schema is up to date");
            return Ok(ApplyReport::default());
        }

        info!(
            operations = ops.len(),
            platform = conn.platform().name(),
            mode = ?self.options.mode,
            "Applying operations"
        );

        let disable = conn.platform().disable_constraints_sql();
        let enable = conn.platform().enable_constraints_sql();
        if let Some(sql) = disable {
            conn.execute(sql)?;
        }
        let result = if conn.platform().supports_transactional_ddl() {
            self.run_in_transaction(conn, ops, &rendered)
        } else {
            warn!("Platform commits DDL implicitly; a failure leaves earlier operations applied");
            Self::run_sequentially(conn, ops, &rendered)
        };
        if let Some(sql) = enable {
            // Keep the run's error if both fail.
            if let Err(e) = conn.execute(sql) {
                warn!(error = %e, "Failed to re-enable constraints");
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        let report = result?;
        info!(
            operations = report.operations_applied,
            statements = report.statements.len(),
            "Applied operations"
        );
        Ok(report)
    }

    /// Applies a migration's `up` operations.
    ///
    /// # Errors
    ///
    /// See [`MigrationExecutor::apply`].
    pub fn apply_migration<M: Migration, C: Connection + ?Sized>(
        &self,
        conn: &mut C,
    ) -> Result<ApplyReport> {
        info!(migration = M::ID, "Applying migration");
        self.apply(conn, &M::up())
    }

    /// Reverts a migration by applying its `down` operations.
    ///
    /// # Errors
    ///
    /// See [`MigrationExecutor::apply`].
    pub fn revert_migration<M: Migration, C: Connection + ?Sized>(
        &self,
        conn: &mut C,
    ) -> Result<ApplyReport> {
        info!(migration = M::ID, "Reverting migration");
        self.apply(conn, &M::down())
    }

    fn run_in_transaction<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        ops: &[Operation],
        rendered: &[Vec<String>],
    ) -> Result<ApplyReport> {
        let savepoints =
            self.options.mode == TransactionMode::Savepoints && conn.platform().supports_savepoints();
        let mut report = ApplyReport::default();

        conn.begin().map_err(|e| failed(ops, 0, e, 0))?;
        for (index, (op, statements)) in ops.iter().zip(rendered).enumerate() {
            let savepoint = conn.platform().savepoint_name(index);
            if savepoints {
                if let Err(e) = conn.savepoint(&savepoint) {
                    abort(conn, index);
                    return Err(failed(ops, index, e, 0));
                }
            }
            debug!(index, operation = %op, "Applying operation");

            if let Err(e) = run_statements(conn, statements) {
                let applied = if savepoints && keep_earlier(conn, &savepoint) {
                    warn!(index, operation = %op, kept = index, "Rolled back failing operation");
                    index
                } else {
                    abort(conn, index);
                    0
                };
                return Err(failed(ops, index, e, applied));
            }

            if savepoints {
                if let Err(e) = conn.release_savepoint(&savepoint) {
                    abort(conn, index);
                    return Err(failed(ops, index, e, 0));
                }
            }
            report.statements.extend(statements.iter().cloned());
            report.operations_applied += 1;
        }
        if let Err(e) = conn.commit() {
            let last = ops.len().saturating_sub(1);
            abort(conn, last);
            return Err(failed(ops, last, e, 0));
        }
        Ok(report)
    }

    fn run_sequentially<C: Connection + ?Sized>(
        conn: &mut C,
        ops: &[Operation],
        rendered: &[Vec<String>],
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for (index, (op, statements)) in ops.iter().zip(rendered).enumerate() {
            debug!(index, operation = %op, "Applying operation");
            if let Err(e) = run_statements(conn, statements) {
                return Err(failed(ops, index, e, index));
            }
            report.statements.extend(statements.iter().cloned());
            report.operations_applied += 1;
        }
        Ok(report)
    }
}

/// Runs statements until one fails.
fn run_statements<C: Connection + ?Sized>(conn: &mut C, statements: &[String]) -> Result<()> {
    for sql in statements {
        conn.execute(sql)?;
    }
    Ok(())
}

/// Undoes the failing operation and commits the ones before it.
///
/// Returns false when the savepoint cannot be restored or the commit is
/// refused; the caller then rolls back the whole transaction.
fn keep_earlier<C: Connection + ?Sized>(conn: &mut C, savepoint: &str) -> bool {
    let kept = conn
        .rollback_to_savepoint(savepoint)
        .and_then(|()| conn.release_savepoint(savepoint))
        .and_then(|()| conn.commit());
    if let Err(e) = &kept {
        warn!(savepoint, error = %e, "Could not restore savepoint");
    }
    kept.is_ok()
}

/// Rolls back the whole transaction, logging a refused rollback.
fn abort<C: Connection + ?Sized>(conn: &mut C, index: usize) {
    match conn.rollback() {
        Ok(()) => warn!(index, "Rolled back all operations"),
        Err(e) => warn!(index, error = %e, "Rollback failed"),
    }
}

/// Attaches the operation at `index` to a statement failure.
fn failed(ops: &[Operation], index: usize, error: MigrateError, applied: usize) -> MigrateError {
    let (sql, message) = match error {
        MigrateError::QueryFailed { sql, message } => (sql, message),
        other => (String::new(), other.to_string()),
    };
    MigrateError::TransactionFailed {
        operation: ops.get(index).map(Operation::describe).unwrap_or_default(),
        index,
        sql,
        message,
        applied,
    }
}
