//! Transactional script execution.
//!
//! Every script (schema, seed, or a generated query) runs inside its own
//! transaction after a liveness probe. The transaction is held by a
//! [`TxGuard`] whose release step runs on every exit path: after a commit it
//! is a no-op, otherwise it rolls back. A rollback error is logged and never
//! replaces the result already decided.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::deadline::Deadline;
use crate::error::ScriptError;
use crate::output::ResultRow;
use crate::pg_value::render_row;

/// Upper bound on the rollback issued from the cleanup path. It may run after
/// the overall deadline has already passed.
const ROLLBACK_GRACE: Duration = Duration::from_secs(5);

/// A database handle that can be probed and can open transactions.
#[async_trait]
pub trait Session: Send + Sync {
    type Tx: ScriptTx;

    async fn probe(&self) -> Result<(), sqlx::Error>;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error>;
}

/// An open transaction.
#[async_trait]
pub trait ScriptTx: Send + Sized {
    /// Runs one or more statements, returning rows affected.
    async fn execute(&mut self, script: &str) -> Result<u64, sqlx::Error>;

    /// Runs a single query and returns its first row, if any.
    async fn fetch_row(&mut self, query: &str) -> Result<Option<ResultRow>, sqlx::Error>;

    async fn commit(self) -> Result<(), sqlx::Error>;

    async fn rollback(self) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl Session for PgPool {
    type Tx = Transaction<'static, Postgres>;

    async fn probe(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.acquire().await?;
        conn.ping().await
    }

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }
}

#[async_trait]
impl ScriptTx for Transaction<'static, Postgres> {
    async fn execute(&mut self, script: &str) -> Result<u64, sqlx::Error> {
        let conn: &mut PgConnection = &mut *self;
        let done = sqlx::Executor::execute(conn, sqlx::raw_sql(script)).await?;
        Ok(done.rows_affected())
    }

    async fn fetch_row(&mut self, query: &str) -> Result<Option<ResultRow>, sqlx::Error> {
        let conn: &mut PgConnection = &mut *self;
        let row = sqlx::Executor::fetch_optional(conn, sqlx::query(query)).await?;
        Ok(row.as_ref().map(render_row))
    }

    async fn commit(self) -> Result<(), sqlx::Error> {
        Transaction::commit(self).await
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        Transaction::rollback(self).await
    }
}

/// What the guard's release step did.
#[derive(Debug)]
pub enum Cleanup {
    /// The transaction had already been committed; nothing to do.
    AlreadyClosed,
    RolledBack,
    /// The rollback did not finish within its grace period. The transaction
    /// is dropped and sqlx rolls it back on the connection.
    TimedOut,
    Failed(sqlx::Error),
}

/// Scoped ownership of an open transaction.
///
/// Dropping the guard without calling [`TxGuard::release`] (for instance when
/// the surrounding future is cancelled) still drops the transaction, which
/// sqlx rolls back on the connection.
pub struct TxGuard<T: ScriptTx> {
    tx: Option<T>,
}

impl<T: ScriptTx> TxGuard<T> {
    pub fn new(tx: T) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    pub fn active(&mut self) -> Option<&mut T> {
        self.tx.as_mut()
    }

    pub async fn commit(&mut self) -> Result<(), ScriptError> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(ScriptError::CommitFailed),
            None => Err(ScriptError::Closed),
        }
    }

    pub async fn release(mut self) -> Cleanup {
        let Some(tx) = self.tx.take() else {
            return Cleanup::AlreadyClosed;
        };
        match tokio::time::timeout(ROLLBACK_GRACE, tx.rollback()).await {
            Ok(Ok(())) => Cleanup::RolledBack,
            Ok(Err(err)) => Cleanup::Failed(err),
            Err(_) => Cleanup::TimedOut,
        }
    }
}

enum Work<'a> {
    Script(&'a str),
    Query(&'a str),
}

enum Done {
    Applied(u64),
    Fetched(Option<ResultRow>),
}

/// Applies `script` atomically. Returns the number of rows affected.
pub async fn apply_script<S: Session>(
    session: &S,
    deadline: &Deadline,
    script: &str,
) -> Result<u64, ScriptError> {
    match transact(session, deadline, Work::Script(script)).await? {
        Done::Applied(rows) => Ok(rows),
        Done::Fetched(_) => Ok(0),
    }
}

/// Runs `query` inside a transaction and returns its first row. A query that
/// yields no rows returns an empty [`ResultRow`].
pub async fn query_row<S: Session>(
    session: &S,
    deadline: &Deadline,
    query: &str,
) -> Result<ResultRow, ScriptError> {
    match transact(session, deadline, Work::Query(query)).await? {
        Done::Fetched(row) => Ok(row.unwrap_or_default()),
        Done::Applied(_) => Ok(ResultRow::new()),
    }
}

async fn transact<S: Session>(
    session: &S,
    deadline: &Deadline,
    work: Work<'_>,
) -> Result<Done, ScriptError> {
    deadline
        .bound(session.probe())
        .await
        .map_err(|_| ScriptError::TimedOut { stage: "probe" })?
        .map_err(ScriptError::ConnectionUnavailable)?;

    let tx = deadline
        .bound(session.begin())
        .await
        .map_err(|_| ScriptError::TimedOut { stage: "begin" })?
        .map_err(ScriptError::ConnectionUnavailable)?;

    let mut guard = TxGuard::new(tx);
    let outcome = run_and_commit(&mut guard, deadline, work).await;

    match guard.release().await {
        Cleanup::AlreadyClosed => {}
        Cleanup::RolledBack => debug!("transaction rolled back"),
        Cleanup::TimedOut => warn!(grace = ?ROLLBACK_GRACE, "rollback timed out"),
        Cleanup::Failed(err) => warn!(error = %err, "rollback failed"),
    }

    outcome
}

async fn run_and_commit<T: ScriptTx>(
    guard: &mut TxGuard<T>,
    deadline: &Deadline,
    work: Work<'_>,
) -> Result<Done, ScriptError> {
    let tx = guard.active().ok_or(ScriptError::Closed)?;

    let done = match work {
        Work::Script(script) => deadline
            .bound(tx.execute(script))
            .await
            .map_err(|_| ScriptError::TimedOut { stage: "execute" })?
            .map(Done::Applied),
        Work::Query(query) => deadline
            .bound(tx.fetch_row(query))
            .await
            .map_err(|_| ScriptError::TimedOut { stage: "execute" })?
            .map(Done::Fetched),
    }
    .map_err(ScriptError::ExecutionFailed)?;

    deadline
        .bound(guard.commit())
        .await
        .map_err(|_| ScriptError::TimedOut { stage: "commit" })??;

    debug!("transaction committed");
    Ok(done)
}
