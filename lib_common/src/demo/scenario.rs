use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::configs::config_env::ConnectorConfig;
use crate::connections::{render_row, DataConnector, FailSoft, StatementOutcome};

pub const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS examples (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )";
pub const INSERT_SQL: &str = "INSERT INTO examples (name) VALUES ($1)";
pub const SELECT_SQL: &str = "SELECT * FROM examples";
pub const EXAMPLE_ITEM: &str = "test_item";

pub const CACHE_KEY: &str = "example_key";
pub const CACHE_VALUE: &str = "example_value";
pub const CACHE_EXPIRY: Duration = Duration::from_secs(3600);

pub const UPLOAD_FILE: &str = "test_file.txt";
pub const DOWNLOAD_FILE: &str = "downloaded_test_file.txt";
pub const UPLOAD_CONTENTS: &str = "This is a test file for S3 upload";

const SEPARATOR: &str =
    "---------------------------------------------------------------------------------------";

/// What one iteration managed to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub postgres_connected: bool,
    pub cache_connected: bool,
    pub object_store_connected: bool,
    /// Rows returned by the example `SELECT`, when it ran.
    pub rows_seen: Option<usize>,
    /// Value read back from the cache, when the get succeeded.
    pub cached_value: Option<String>,
    pub uploaded: bool,
    pub downloaded: bool,
}

/// Runs the example operations once.
///
/// Every failure is logged and recorded in the report; nothing here returns
/// an error. Files are written under `workdir`.
pub async fn run_iteration(config: &ConnectorConfig, workdir: &Path) -> IterationReport {
    let mut connector = DataConnector::new();
    let mut report = IterationReport {
        postgres_connected: connector
            .connect_postgres(&config.postgres)
            .await
            .fail_soft("connect to PostgreSQL")
            .is_some(),
        cache_connected: connector
            .connect_cache(&config.cache)
            .await
            .fail_soft("connect to Redis")
            .is_some(),
        object_store_connected: connector
            .connect_object_store(&config.object_store)
            .await
            .fail_soft("connect to S3")
            .is_some(),
        ..IterationReport::default()
    };

    if report.postgres_connected {
        report.rows_seen = postgres_examples(&mut connector).await;
    }
    if report.cache_connected {
        report.cached_value = cache_examples(&mut connector).await;
    }
    if report.object_store_connected {
        let (uploaded, downloaded) =
            object_store_examples(&connector, &config.object_store.bucket_name, workdir).await;
        report.uploaded = uploaded;
        report.downloaded = downloaded;
    }

    connector.close_all().await;
    info!("{}", SEPARATOR);
    report
}

async fn postgres_examples(connector: &mut DataConnector) -> Option<usize> {
    connector
        .execute(CREATE_TABLE_SQL, &[])
        .await
        .fail_soft("create the examples table");

    let item = EXAMPLE_ITEM.to_string();
    connector
        .execute(INSERT_SQL, &[&item])
        .await
        .fail_soft("insert into examples");

    match connector.execute(SELECT_SQL, &[]).await.fail_soft("query examples")? {
        StatementOutcome::Rows(rows) => {
            let rendered: Vec<Vec<String>> = rows.iter().map(render_row).collect();
            info!("PostgreSQL query results: {:?}", rendered);
            Some(rows.len())
        }
        StatementOutcome::Committed { .. } => {
            warn!("Example query was committed instead of returning rows");
            None
        }
    }
}

async fn cache_examples(connector: &mut DataConnector) -> Option<String> {
    connector
        .cache_set(CACHE_KEY, CACHE_VALUE, Some(CACHE_EXPIRY))
        .await
        .fail_soft("set the example cache value");

    let value = connector
        .cache_get(CACHE_KEY)
        .await
        .fail_soft("get the example cache value")
        .flatten();
    info!("Redis cached value: {:?}", value);
    value
}

async fn object_store_examples(connector: &DataConnector, bucket: &str, workdir: &Path) -> (bool, bool) {
    let source = workdir.join(UPLOAD_FILE);
    if let Err(e) = tokio::fs::write(&source, UPLOAD_CONTENTS).await {
        warn!("Failed to write {}: {}", source.display(), e);
        return (false, false);
    }

    let uploaded = connector
        .upload_file(&source, bucket, None)
        .await
        .fail_soft("upload to S3")
        .is_some();

    let destination = workdir.join(DOWNLOAD_FILE);
    let downloaded = connector
        .download_file(bucket, UPLOAD_FILE, &destination)
        .await
        .fail_soft("download from S3")
        .is_some();

    (uploaded, downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::unreachable_config;

    #[tokio::test]
    async fn test_unreachable_services_skip_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_iteration(&unreachable_config(), dir.path()).await;

        assert_eq!(report, IterationReport::default());
        assert!(!dir.path().join(UPLOAD_FILE).exists());
        assert!(!dir.path().join(DOWNLOAD_FILE).exists());
    }

    #[test]
    fn test_example_select_is_a_read_query() {
        assert!(crate::connections::is_read_query(SELECT_SQL));
        assert!(!crate::connections::is_read_query(CREATE_TABLE_SQL));
        assert!(!crate::connections::is_read_query(INSERT_SQL));
    }
}
