//! PostgreSQL client with one lazily opened session
//!
//! The session is created on first use and re-created when the previous one
//! has closed. A mutex guards it for the whole of each operation, so
//! concurrent tool calls queue up instead of interleaving statements on the
//! shared session.
//!
//! Every operation runs in its own transaction. Successful statements are
//! committed; statements the server rejects are rolled back and reported as
//! error envelopes. Connection failures and unclassified driver errors are
//! returned as [`DbError`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Transaction};

use crate::config::PgConfig;
use crate::convert::{as_sql_refs, bind_params, quote_ident, row_to_json};
use crate::envelope::{
    Envelope, QueryEnvelope, QueryResult, RowCount, RowCountEnvelope, TableList,
    TableListEnvelope, TableRef,
};
use crate::error::{DbError, DbResult};

const TABLE_SCHEMA_SQL: &str = r#"
    SELECT
        column_name,
        data_type,
        character_maximum_length,
        is_nullable,
        column_default
    FROM information_schema.columns
    WHERE table_name::text = $1 AND table_schema = 'public'
    ORDER BY ordinal_position
"#;

// exact match first, then the lower-cased name an unquoted identifier folds to
const RESOLVE_TABLE_SQL: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = 'public' AND table_name::text IN ($1, lower($1))
    ORDER BY table_name::text = $1 DESC
    LIMIT 1
"#;

const LIST_TABLES_SQL: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = 'public'
    ORDER BY table_name
"#;

/// A live session and the task driving its socket
struct Session {
    client: Client,
    driver: JoinHandle<()>,
}

/// Database client shared by all tool calls
pub struct PgClient {
    config: PgConfig,
    session: Mutex<Option<Session>>,
    sessions_opened: AtomicU64,
}

impl PgClient {
    pub fn new(config: PgConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            sessions_opened: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Number of sessions established over the client's lifetime
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Whether a session is open right now
    pub async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.client.is_closed())
    }

    /// Open a session unless one is already open
    pub async fn connect(&self) -> DbResult<()> {
        let mut slot = self.session.lock().await;
        self.ensure_session(&mut slot).await?;
        Ok(())
    }

    /// Close the session if one is open
    pub async fn close(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            // dropping the client lets the connection task finish on its own
            drop(session.client);
            let _ = session.driver.await;
            tracing::info!("PostgreSQL connection closed");
        }
    }

    /// Run one statement with positional parameters (`$1`, `$2`, ...)
    ///
    /// Statements that return columns yield their rows as `data`; all
    /// others yield the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<QueryEnvelope> {
        if sql.trim().is_empty() {
            return Ok(Envelope::sql_error("can't execute an empty query"));
        }

        let mut slot = self.session.lock().await;
        let client = self.ensure_session(&mut slot).await?;
        let outcome = run_statement(client, sql, params).await;
        self.settle(&mut slot, outcome)
    }

    /// Column definitions of a table in the `public` schema
    pub async fn get_table_schema(&self, table_name: &str) -> DbResult<QueryEnvelope> {
        self.execute(TABLE_SCHEMA_SQL, &[Value::from(table_name)])
            .await
    }

    /// Number of rows in a table of the `public` schema
    ///
    /// The name is resolved against the catalog before it is quoted into the
    /// count statement. An exact match wins; otherwise the lower-cased name
    /// is tried, so `Users` finds a table created as `users`.
    pub async fn get_row_count(&self, table_name: &str) -> DbResult<RowCountEnvelope> {
        let resolved = match self
            .execute(RESOLVE_TABLE_SQL, &[Value::from(table_name)])
            .await?
        {
            Envelope::Success(result) => result
                .data
                .and_then(|rows| rows.into_iter().next())
                .and_then(|mut row| row.remove("table_name"))
                .and_then(|name| name.as_str().map(str::to_string)),
            Envelope::Error { message } => return Ok(Envelope::Error { message }),
        };
        let Some(resolved) = resolved else {
            return Ok(Envelope::sql_error(format!(
                "relation \"{}\" does not exist",
                table_name
            )));
        };

        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM public.{}",
            quote_ident(&resolved)
        );
        let counted = self.execute(&sql, &[]).await?;

        Ok(counted.and_then(|result| {
            let count = result
                .data
                .as_ref()
                .and_then(|rows| rows.first())
                .and_then(|row| row.get("row_count"))
                .and_then(Value::as_i64);
            match count {
                Some(row_count) => Envelope::Success(RowCount {
                    table_name: table_name.to_string(),
                    row_count,
                }),
                None => Envelope::error("unexpected result from row count query"),
            }
        }))
    }

    /// All tables and views in the `public` schema, ordered by name
    pub async fn list_tables(&self) -> DbResult<TableListEnvelope> {
        let mut slot = self.session.lock().await;
        let client = self.ensure_session(&mut slot).await?;
        let outcome = fetch_tables(client).await;
        self.settle(&mut slot, outcome)
    }

    async fn ensure_session<'a>(&self, slot: &'a mut Option<Session>) -> DbResult<&'a mut Client> {
        let session = match slot.take() {
            Some(session) if !session.client.is_closed() => session,
            stale => {
                if let Some(stale) = stale {
                    stale.driver.abort();
                    tracing::warn!("PostgreSQL session was closed, reconnecting");
                }
                self.open_session().await?
            }
        };
        Ok(&mut slot.insert(session).client)
    }

    async fn open_session(&self) -> DbResult<Session> {
        let (client, connection) = self
            .config
            .pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| {
                tracing::error!(
                    host = %self.config.pg_host,
                    port = self.config.pg_port,
                    "PostgreSQL connection failed: {}",
                    e
                );
                DbError::Connection(e)
            })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        let opened = self.sessions_opened.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            host = %self.config.pg_host,
            port = self.config.pg_port,
            database = %self.config.pg_db,
            session = opened,
            "PostgreSQL connection established"
        );

        Ok(Session { client, driver })
    }

    /// Turn driver errors into [`DbError`], forgetting a dead session
    fn settle<T>(
        &self,
        slot: &mut Option<Session>,
        outcome: Result<Envelope<T>, tokio_postgres::Error>,
    ) -> DbResult<Envelope<T>> {
        outcome.map_err(|e| {
            if e.is_closed() {
                if let Some(session) = slot.take() {
                    session.driver.abort();
                }
                tracing::error!("PostgreSQL connection lost: {}", e);
                DbError::Connection(e)
            } else {
                tracing::error!("Unexpected database error: {}", e);
                DbError::Driver(e)
            }
        })
    }
}

async fn run_statement(
    client: &mut Client,
    sql: &str,
    params: &[Value],
) -> Result<QueryEnvelope, tokio_postgres::Error> {
    tracing::debug!(sql, params = params.len(), "Executing statement");

    let tx = client.transaction().await?;

    let statement = match tx.prepare(sql).await {
        Ok(statement) => statement,
        Err(e) => return recover(tx, e, "SQL error").await,
    };

    let bound = match bind_params(statement.params(), params) {
        Ok(bound) => bound,
        Err(e) => {
            tracing::warn!("Rejected statement parameters, rolling back: {}", e);
            tx.rollback().await?;
            return Ok(Envelope::sql_error(e));
        }
    };
    let refs = as_sql_refs(&bound);

    let result = if statement.columns().is_empty() {
        match tx.execute(&statement, &refs).await {
            Ok(affected) => QueryResult::affected(affected),
            Err(e) => return recover(tx, e, "SQL error").await,
        }
    } else {
        let rows = match tx.query(&statement, &refs).await {
            Ok(rows) => rows,
            Err(e) => return recover(tx, e, "SQL error").await,
        };
        let data = rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?;
        QueryResult::rows(data)
    };

    match tx.commit().await {
        Ok(()) => Ok(Envelope::Success(result)),
        Err(e) => rejected(e, "SQL error"),
    }
}

async fn fetch_tables(client: &mut Client) -> Result<TableListEnvelope, tokio_postgres::Error> {
    let tx = client.transaction().await?;

    let rows = match tx.query(LIST_TABLES_SQL, &[]).await {
        Ok(rows) => rows,
        Err(e) => return recover(tx, e, "failed to list tables").await,
    };
    let tables = rows
        .iter()
        .map(|row| {
            row.try_get::<_, String>("table_name")
                .map(|table_name| TableRef { table_name })
        })
        .collect::<Result<Vec<_>, _>>()?;

    match tx.commit().await {
        Ok(()) => Ok(Envelope::Success(TableList::new(tables))),
        Err(e) => rejected(e, "failed to list tables"),
    }
}

/// Roll back after a failed statement and report server-side rejections
async fn recover<T>(
    tx: Transaction<'_>,
    err: tokio_postgres::Error,
    prefix: &str,
) -> Result<Envelope<T>, tokio_postgres::Error> {
    if err.as_db_error().is_none() {
        return Err(err);
    }
    tx.rollback().await?;
    rejected(err, prefix)
}

/// Error envelope for an error the server raised; anything else passes
fn rejected<T>(err: tokio_postgres::Error, prefix: &str) -> Result<Envelope<T>, tokio_postgres::Error> {
    match err.as_db_error() {
        Some(db) => {
            tracing::warn!(code = db.code().code(), "Statement rolled back: {}", db.message());
            Ok(Envelope::error(format!("{}: {}", prefix, db)))
        }
        None => Err(err),
    }
}
