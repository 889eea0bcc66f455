//! Testcontainer setup for ClickHouse and Redis.
//!
//! Set `SESSION_ENGINE_TEST_CLICKHOUSE_URL` or `SESSION_ENGINE_TEST_REDIS_URL`
//! to run against an existing server instead of starting a container.

use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

/// Running ClickHouse server.
pub struct ClickHouseContainer {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub url: String,
    pub database: String,
}

impl ClickHouseContainer {
    pub async fn start() -> Self {
        if let Some(url) = env_url("SESSION_ENGINE_TEST_CLICKHOUSE_URL") {
            return Self {
                container: None,
                url,
                database: "session_engine_test".to_string(),
            };
        }

        // CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT=1 allows creating users without password
        let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
            .with_wait_for(WaitFor::seconds(5))
            .with_exposed_port(8123.tcp())
            .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
            .with_env_var("CLICKHOUSE_USER", "default")
            .with_env_var("CLICKHOUSE_PASSWORD", "");

        let container = image.start().await.expect("Failed to start ClickHouse");
        let port = container.get_host_port_ipv4(8123).await.unwrap();
        let url = format!("http://127.0.0.1:{}", port);

        wait_for_http(&url, Duration::from_secs(30)).await;

        Self {
            container: Some(container),
            url,
            database: "session_engine_test".to_string(),
        }
    }
}

/// Running Redis server.
pub struct RedisContainer {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub url: String,
}

impl RedisContainer {
    pub async fn start() -> Self {
        if let Some(url) = env_url("SESSION_ENGINE_TEST_REDIS_URL") {
            return Self {
                container: None,
                url,
            };
        }

        let image = GenericImage::new("redis", "7-alpine")
            .with_exposed_port(6379.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

        let container = image.start().await.expect("Failed to start Redis");
        let port = container.get_host_port_ipv4(6379).await.unwrap();

        Self {
            container: Some(container),
            url: format!("redis://127.0.0.1:{}", port),
        }
    }
}

fn env_url(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Wait for HTTP endpoint to respond.
async fn wait_for_http(url: &str, timeout: Duration) {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("HTTP endpoint {} not ready after {:?}", url, timeout);
}
