//! # PostgreSQL Connection
//!
//! Wraps a single `tokio-postgres` client together with the task driving its
//! connection. Statements are split in two families: read queries return their
//! rows, everything else runs inside a transaction that is committed before
//! returning.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, Row, SimpleQueryMessage};
use tracing::{debug, error, warn};

use super::errors::ConnectorError;
use crate::configs::config_env::PostgresSettings;

/// Positional statement parameters (`$1`, `$2`, ...).
pub type SqlParams<'a> = &'a [&'a (dyn ToSql + Sync)];

/// How long `close` waits for the connection task to wind down.
const CLOSE_GRACE: Duration = Duration::from_secs(3);

/// What a statement produced.
#[derive(Debug)]
pub enum StatementOutcome {
    /// Rows of a read query, in server order.
    Rows(Vec<Row>),
    /// A committed write; `affected` is the server's row count.
    Committed { affected: u64 },
}

impl StatementOutcome {
    /// The rows of a read query, `None` for writes.
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            StatementOutcome::Rows(rows) => Some(rows),
            StatementOutcome::Committed { .. } => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, StatementOutcome::Committed { .. })
    }
}

/// An open PostgreSQL connection.
pub struct PostgresHandle {
    /// The client used to issue statements.
    client: Client,
    /// The spawned task polling the underlying connection.
    driver: JoinHandle<()>,
}

impl PostgresHandle {
    /// Opens a connection using the given settings.
    ///
    /// The connection future is spawned on the current runtime, which keeps
    /// polling it until the client is dropped.
    ///
    /// # Arguments
    /// * `settings` - Host, credentials and connect timeout.
    pub async fn connect(settings: &PostgresSettings) -> Result<Self, ConnectorError> {
        let mut config = Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .dbname(&settings.database)
            .user(&settings.user)
            .password(&settings.password)
            .connect_timeout(settings.connect_timeout);

        let (client, connection) = config.connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self { client, driver })
    }

    /// Runs one statement.
    ///
    /// Read queries (see [`is_read_query`]) return their rows and never commit;
    /// they must be a single statement. Any other statement is executed inside
    /// a transaction and committed. Without parameters a write may hold several
    /// `;`-separated statements, which commit together and report the summed
    /// row count. On failure the transaction is dropped uncommitted, which
    /// rolls it back.
    pub async fn execute(
        &mut self,
        statement: &str,
        params: SqlParams<'_>,
    ) -> Result<StatementOutcome, ConnectorError> {
        if is_read_query(statement) {
            let rows = self.client.query(statement, params).await?;
            debug!("Query returned {} rows", rows.len());
            return Ok(StatementOutcome::Rows(rows));
        }

        let transaction = self.client.transaction().await?;
        let affected = if params.is_empty() {
            affected_rows(&transaction.simple_query(statement).await?)
        } else {
            transaction.execute(statement, params).await?
        };
        transaction.commit().await?;
        debug!("Statement committed, {} rows affected", affected);
        Ok(StatementOutcome::Committed { affected })
    }

    /// Closes the connection and waits briefly for the driver task to finish.
    pub async fn close(self) {
        let Self { client, driver } = self;
        drop(client);
        if tokio::time::timeout(CLOSE_GRACE, driver).await.is_err() {
            warn!("PostgreSQL connection task did not finish within {:?}", CLOSE_GRACE);
        }
    }
}

/// Returns `true` when the statement starts with `SELECT`, ignoring leading
/// whitespace and case.
pub fn is_read_query(statement: &str) -> bool {
    statement
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("SELECT"))
}

/// Sums the row counts of every completed command in a simple-query reply.
fn affected_rows(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|message| match message {
            SimpleQueryMessage::CommandComplete(count) => *count,
            _ => 0,
        })
        .sum()
}

/// Renders every column of a row as text, for logging.
pub fn render_row(row: &Row) -> Vec<String> {
    (0..row.len()).map(|idx| render_value(row, idx)).collect()
}

fn render_value(row: &Row, idx: usize) -> String {
    let ty = row.columns()[idx].type_();
    let rendered = if *ty == Type::BOOL {
        cell::<bool>(row, idx)
    } else if *ty == Type::INT2 {
        cell::<i16>(row, idx)
    } else if *ty == Type::INT4 {
        cell::<i32>(row, idx)
    } else if *ty == Type::INT8 {
        cell::<i64>(row, idx)
    } else if *ty == Type::FLOAT4 {
        cell::<f32>(row, idx)
    } else if *ty == Type::FLOAT8 {
        cell::<f64>(row, idx)
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
        cell::<String>(row, idx)
    } else if *ty == Type::TIMESTAMP {
        cell::<chrono::NaiveDateTime>(row, idx)
    } else if *ty == Type::TIMESTAMPTZ {
        cell::<chrono::DateTime<chrono::Utc>>(row, idx)
    } else if *ty == Type::DATE {
        cell::<chrono::NaiveDate>(row, idx)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        cell::<serde_json::Value>(row, idx)
    } else {
        Ok(Some(format!("<{}>", ty.name())))
    };

    match rendered {
        Ok(Some(text)) => text,
        Ok(None) => "NULL".to_string(),
        Err(e) => format!("<error: {}>", e),
    }
}

fn cell<'a, T>(row: &'a Row, idx: usize) -> Result<Option<String>, tokio_postgres::Error>
where
    T: tokio_postgres::types::FromSql<'a> + ToString,
{
    row.try_get::<_, Option<T>>(idx)
        .map(|value| value.map(|v| v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_read_query() {
        assert!(is_read_query("SELECT * FROM examples"));
        assert!(is_read_query("select 1"));
        assert!(is_read_query("\n\t   SeLeCt now()"));
    }

    #[test]
    fn test_other_statements_are_writes() {
        assert!(!is_read_query("INSERT INTO examples (name) VALUES ($1)"));
        assert!(!is_read_query("CREATE TABLE IF NOT EXISTS t (id INT)"));
        assert!(!is_read_query("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!is_read_query("SELEC"));
        assert!(!is_read_query(""));
    }

    #[test]
    fn test_affected_rows_sums_every_command() {
        let messages = vec![
            SimpleQueryMessage::CommandComplete(0),
            SimpleQueryMessage::CommandComplete(2),
            SimpleQueryMessage::CommandComplete(3),
        ];
        assert_eq!(affected_rows(&messages), 5);
        assert_eq!(affected_rows(&[]), 0);
    }

    #[test]
    fn test_multibyte_prefix_does_not_panic() {
        assert!(!is_read_query("ÄÖÜ SELECT"));
        assert!(!is_read_query("séléct"));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_with_network_error() {
        let settings = PostgresSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            connect_timeout: Duration::from_secs(1),
        };
        let err = PostgresHandle::connect(&settings).await.err().unwrap();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
