//! ClickHouse health checks and migrations.

use crate::client::ClickHouseClient;
use engine_core::{DbErrorCode, Result};
use telemetry::health;
use tracing::{debug, error};

/// Check ClickHouse connection health and update the health registry.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            health().clickhouse.set_healthy();
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            health().clickhouse.set_unhealthy(e.to_string());
            false
        }
    }
}

/// Creates the database and tables if they don't exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    use crate::schema::all_tables;

    // The target database may not exist yet.
    let server = client.inner().clone().with_database("default");

    for ddl in all_tables(&client.config().database) {
        server.query(&ddl).execute().await.map_err(|e| {
            engine_core::Error::database(
                DbErrorCode::SchemaFailed,
                format!("Failed to execute DDL: {}", e),
            )
        })?;
    }

    debug!(database = %client.config().database, "ClickHouse schema initialized");
    Ok(())
}
