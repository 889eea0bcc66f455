//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use crate::insert::{insert_rows, tables, EventRow, PageViewRow, RequestRow, SessionRow};
use async_trait::async_trait;
use clickhouse::Client;
use engine_core::{Event, PageView, Request, Result, Session, Store};
use tracing::info;

/// ClickHouse client wrapper. Cheap to clone.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(engine_core::Error::config("ClickHouse url must not be empty"));
        }

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }
}

#[async_trait]
impl Store for ClickHouseClient {
    async fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        let rows = sessions.iter().map(SessionRow::from).collect();
        insert_rows::<SessionRow>(self, tables::SESSION, rows).await?;
        Ok(())
    }

    async fn save_page_views(&self, page_views: &[PageView]) -> Result<()> {
        let rows = page_views.iter().map(PageViewRow::from).collect();
        insert_rows::<PageViewRow>(self, tables::PAGE_VIEW, rows).await?;
        Ok(())
    }

    async fn save_events(&self, events: &[Event]) -> Result<()> {
        let rows = events.iter().map(EventRow::from).collect();
        insert_rows::<EventRow>(self, tables::EVENT, rows).await?;
        Ok(())
    }

    async fn save_requests(&self, requests: &[Request]) -> Result<()> {
        let rows = requests.iter().map(RequestRow::from).collect();
        insert_rows::<RequestRow>(self, tables::REQUEST, rows).await?;
        Ok(())
    }
}
