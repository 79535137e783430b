// SQL statement composition for lifecycle transitions
//
// Statements use positional `?` placeholders. Composing one statement into
// another appends its arguments in order, so the final argument list always
// lines up with the placeholders as they appear in the SQL text.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::worker_lifecycle::error::LifecycleError;
use crate::worker_lifecycle::types::WorkerState;

/// A bound statement argument
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for SqlArg {
    fn from(value: bool) -> Self {
        SqlArg::Bool(value)
    }
}

impl From<i64> for SqlArg {
    fn from(value: i64) -> Self {
        SqlArg::Int(value)
    }
}

impl From<WorkerState> for SqlArg {
    fn from(value: WorkerState) -> Self {
        SqlArg::Text(value.as_str().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    sql: String,
    args: Vec<SqlArg>,
}

impl Statement {
    pub fn new(sql: &str) -> Self {
        Self {
            sql: sql.trim().to_string(),
            args: Vec::new(),
        }
    }

    /// Append a SQL fragment, separated by a single space
    pub fn push(mut self, fragment: &str) -> Self {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return self;
        }
        if !self.sql.is_empty() && !self.sql.ends_with('(') && !fragment.starts_with(')') {
            self.sql.push(' ');
        }
        self.sql.push_str(fragment);
        self
    }

    pub fn bind(mut self, arg: impl Into<SqlArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Inline another statement's SQL and carry its arguments along
    pub fn append(mut self, other: Statement) -> Self {
        self = self.push(&other.sql);
        self.args.extend(other.args);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[SqlArg] {
        &self.args
    }

    /// Check the statement is well formed before it reaches the store
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.sql.is_empty() {
            return Err(LifecycleError::QueryBuild {
                reason: "statement is empty".to_string(),
            });
        }

        let placeholders = count_placeholders(&self.sql)?;
        if placeholders != self.args.len() {
            return Err(LifecycleError::QueryBuild {
                reason: format!(
                    "statement has {} placeholders but {} arguments",
                    placeholders,
                    self.args.len()
                ),
            });
        }

        Ok(())
    }

    /// Execute the statement and return every row it produces
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<SqliteRow>, LifecycleError> {
        self.validate()?;

        let mut query = sqlx::query(&self.sql);
        for arg in &self.args {
            query = match arg {
                SqlArg::Bool(value) => query.bind(*value),
                SqlArg::Int(value) => query.bind(*value),
                SqlArg::Text(value) => query.bind(value.clone()),
            };
        }

        Ok(query.fetch_all(pool).await?)
    }

    /// Execute the statement and decode the `name` column of every returned row
    pub async fn fetch_names(&self, pool: &SqlitePool) -> Result<Vec<String>, LifecycleError> {
        let rows = self.fetch_all(pool).await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(LifecycleError::row_scan))
            .collect()
    }
}

fn count_placeholders(sql: &str) -> Result<usize, LifecycleError> {
    let mut count = 0;
    let mut in_literal = false;

    for ch in sql.chars() {
        match ch {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }

    if in_literal {
        return Err(LifecycleError::QueryBuild {
            reason: "unterminated string literal".to_string(),
        });
    }

    Ok(count)
}

/// Names of workers backing a container for an incomplete build that must not
/// be interrupted. Builds without a job count as non-interruptible.
pub fn in_use_worker_names() -> Statement {
    Statement::new("SELECT DISTINCT w.name FROM builds b")
        .push("JOIN containers c ON b.id = c.build_id")
        .push("JOIN workers w ON w.name = c.worker_name")
        .push("LEFT JOIN jobs j ON j.id = b.job_id")
        .push("WHERE b.completed = ?")
        .bind(false)
        .push("AND (j.interruptible = ? OR b.job_id IS NULL)")
        .bind(false)
}

pub fn delete_unresponsive_ephemeral_workers(now_ms: i64) -> Statement {
    Statement::new("DELETE FROM workers")
        .push("WHERE ephemeral = ?")
        .bind(true)
        .push("AND expires < ?")
        .bind(now_ms)
        .push("RETURNING name")
}

pub fn stall_unresponsive_workers(now_ms: i64) -> Statement {
    Statement::new("UPDATE workers SET state = ?, expires = NULL")
        .bind(WorkerState::Stalled)
        .push("WHERE state = ?")
        .bind(WorkerState::Running)
        .push("AND expires < ?")
        .bind(now_ms)
        .push("RETURNING name")
}

pub fn delete_finished_retiring_workers() -> Statement {
    Statement::new("DELETE FROM workers")
        .push("WHERE state = ?")
        .bind(WorkerState::Retiring)
        .push("AND name NOT IN (")
        .append(in_use_worker_names())
        .push(")")
        .push("RETURNING name")
}

pub fn land_finished_landing_workers() -> Statement {
    Statement::new("UPDATE workers SET state = ?, addr = NULL, baggageclaim_url = NULL")
        .bind(WorkerState::Landed)
        .push("WHERE state = ?")
        .bind(WorkerState::Landing)
        .push("AND name NOT IN (")
        .append(in_use_worker_names())
        .push(")")
        .push("RETURNING name")
}

pub fn worker_states() -> Statement {
    Statement::new("SELECT name, state FROM workers")
}
