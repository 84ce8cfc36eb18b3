use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ColumnMetadata, Record, SchemaError, SchemaService};
use crate::settings::Settings;

/// `SchemaService` backed by the schema service's REST endpoints.
pub struct HttpSchemaService {
    client: Client,
    base_url: Url,
    dynamic_url: Url,
}

#[derive(Debug, Deserialize)]
struct PrimaryKeyRow {
    #[serde(rename = "PrimaryKeyName", alias = "primaryKeyName")]
    primary_key_name: String,
}

impl HttpSchemaService {
    pub fn new(base_url: &str, dynamic_url: &str, timeout: Duration) -> Result<Self, SchemaError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchemaError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: parse_base(base_url)?,
            dynamic_url: parse_base(dynamic_url)?,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SchemaError> {
        Self::new(
            &settings.schema_url,
            &settings.dynamic_url,
            Duration::from_secs(settings.http_timeout_secs),
        )
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SchemaError> {
        join_segments(&self.base_url, segments)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Record>,
    ) -> Result<T, SchemaError> {
        let response = self.send_raw(method, url, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SchemaError::Decode(e.to_string()))
    }

    async fn send_raw(
        &self,
        method: Method,
        url: Url,
        body: Option<&Record>,
    ) -> Result<reqwest::Response, SchemaError> {
        tracing::debug!(method = %method, url = %url, "schema service request");
        let mut request = self.client.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SchemaError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SchemaError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(SchemaError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

fn parse_base(raw: &str) -> Result<Url, SchemaError> {
    let url = Url::parse(raw).map_err(|e| SchemaError::Transport(format!("invalid URL {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(SchemaError::Transport(format!("URL {raw} cannot be a base")));
    }
    Ok(url)
}

/// Append percent-encoded path segments to `base` (trailing slash tolerated).
fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, SchemaError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| SchemaError::Transport(format!("URL {base} cannot be a base")))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

#[async_trait::async_trait]
impl SchemaService for HttpSchemaService {
    async fn list_entities(&self) -> Result<Vec<String>, SchemaError> {
        let url = self.url(&["getAllEntities"])?;
        self.send(Method::GET, url, None).await
    }

    async fn get_column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>, SchemaError> {
        let url = self.url(&["GetEntityMetadata", table])?;
        self.send(Method::GET, url, None).await
    }

    async fn get_primary_key_name(&self, table: &str) -> Result<Option<String>, SchemaError> {
        let url = self.url(&["GetEntityDynamicPrimaryKey", table])?;
        let rows: Vec<PrimaryKeyRow> = self.send(Method::GET, url, None).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|r| r.primary_key_name)
            .filter(|name| !name.is_empty()))
    }

    async fn get_rows(&self, table: &str) -> Result<Vec<Record>, SchemaError> {
        let url = self.url(&[table])?;
        self.send(Method::GET, url, None).await
    }

    async fn get_row_by_id(&self, table: &str, id: &str) -> Result<Record, SchemaError> {
        let url = self.url(&["GetEntityById", table, id])?;
        let row: Option<Record> = self.send(Method::GET, url, None).await?;
        row.ok_or_else(|| SchemaError::NotFound(format!("{table}/{id}")))
    }

    async fn create_row(&self, table: &str, values: &Record) -> Result<Record, SchemaError> {
        let url = self.url(&[table])?;
        self.send(Method::POST, url, Some(values)).await
    }

    async fn update_row(&self, table: &str, id: &str, values: &Record) -> Result<(), SchemaError> {
        let url = self.url(&[table, id])?;
        self.send_raw(Method::PUT, url, Some(values)).await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, id: &str) -> Result<(), SchemaError> {
        let url = self.url(&[table, id])?;
        self.send_raw(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn get_related_rows(&self, foreign_table: &str) -> Result<Vec<Record>, SchemaError> {
        let url = join_segments(&self.dynamic_url, &[foreign_table])?;
        self.send(Method::GET, url, None).await
    }
}
