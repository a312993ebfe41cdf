//! A [`Warehouse`] implementation on top of the warehouse SQL REST API.
//!
//! Statements are submitted with `POST /api/v2/statements`. Short statements complete
//! synchronously with `200 OK`; longer ones are accepted with `202 Accepted` and polled through
//! their status URL until they finish. Result sets larger than one partition are fetched
//! partition by partition.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{Method, StatusCode, header};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::{Compute, WarehouseConfig};
use crate::error::{WarehouseError, WarehouseResult};
use crate::result_set::{Column, ResultSet, Row};
use crate::warehouse::{Param, Warehouse};

/// User agent string used for outgoing requests.
const USER_AGENT: &str = concat!("clinops/", env!("CARGO_PKG_VERSION"));

/// Interval between status polls of an accepted statement.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A session against the warehouse SQL REST API.
#[derive(Debug)]
pub struct SqlApiWarehouse {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    token_type: &'static str,
    warehouse: String,
    database: String,
    schema: String,
    role: String,
    timeout: Duration,
    closed: AtomicBool,
}

impl SqlApiWarehouse {
    /// Opens a session on the selected compute warehouse and verifies it with a trivial query.
    pub async fn connect(config: &WarehouseConfig, compute: Compute) -> WarehouseResult<Self> {
        Self::connect_with_schema(config, compute, &config.schema).await
    }

    /// Like [`connect`](Self::connect), but overrides the default schema.
    pub async fn connect_with_schema(
        config: &WarehouseConfig,
        compute: Compute,
        schema: &str,
    ) -> WarehouseResult<Self> {
        let token = config
            .token
            .as_ref()
            .ok_or_else(|| WarehouseError::Config("no access token configured".into()))?
            .expose_secret()
            .as_str()
            .to_owned();

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.query_timeout)
            .build()
            .map_err(|cause| WarehouseError::Reqwest {
                context: "failed to build http client".into(),
                cause,
            })?;

        let session = Self {
            client,
            endpoint: config.endpoint(),
            token,
            token_type: config.token_type.header_value(),
            warehouse: config.warehouse(compute).to_owned(),
            database: config.database.clone(),
            schema: schema.to_owned(),
            role: config.role.clone(),
            timeout: config.query_timeout,
            closed: AtomicBool::new(false),
        };

        tracing::info!(
            endpoint = %session.endpoint,
            warehouse = %session.warehouse,
            "connecting to warehouse"
        );
        session.execute("SELECT 1", &[]).await?;
        tracing::debug!("connected");

        Ok(session)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", self.token_type)
            .header(header::ACCEPT, "application/json")
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> WarehouseResult<(StatusCode, Vec<u8>)> {
        let response = request.send().await.map_err(|cause| {
            if cause.is_timeout() {
                return WarehouseError::Timeout(self.timeout);
            }
            WarehouseError::Reqwest {
                context: "failed to send statement request".into(),
                cause,
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|cause| WarehouseError::Reqwest {
                context: "failed to read response body".into(),
                cause,
            })?;

        Ok((status, body.to_vec()))
    }

    fn parse<T: for<'de> Deserialize<'de>>(body: &[u8], context: &str) -> WarehouseResult<T> {
        serde_json::from_slice(body).map_err(|cause| WarehouseError::Serde {
            context: context.to_owned(),
            cause,
        })
    }

    /// Turns a finished statement response into a [`ResultSet`], fetching extra partitions.
    async fn collect(&self, response: StatementResponse) -> WarehouseResult<ResultSet> {
        let handle = response.statement_handle.clone();
        let meta = response.result_set_meta_data.unwrap_or_default();
        let columns = meta
            .row_type
            .into_iter()
            .map(|c| Column {
                name: c.name,
                kind: c.kind,
            })
            .collect();
        let rows = response.data.unwrap_or_default().into_iter().map(Row::new);
        let mut result = ResultSet::new(columns, rows.collect());

        for partition in 1..meta.partition_info.len() {
            let url = format!(
                "{}/api/v2/statements/{handle}?partition={partition}",
                self.endpoint
            );
            let (status, body) = self.send(self.request(Method::GET, &url)).await?;
            if !status.is_success() {
                return Err(Self::statement_error(status, &body));
            }
            let page: PartitionResponse = Self::parse(&body, "failed to parse result partition")?;
            result.extend_rows(page.data.into_iter().map(Row::new));
        }

        Ok(result.with_statement_handle(handle))
    }

    fn statement_error(status: StatusCode, body: &[u8]) -> WarehouseError {
        match serde_json::from_slice::<StatementResponse>(body) {
            Ok(response) => WarehouseError::Statement {
                code: response.code.unwrap_or_else(|| status.as_u16().to_string()),
                message: response.message.unwrap_or_else(|| status.to_string()),
                sql_state: response.sql_state,
            },
            Err(_) => WarehouseError::Statement {
                code: status.as_u16().to_string(),
                message: String::from_utf8_lossy(body).into_owned(),
                sql_state: None,
            },
        }
    }
}

#[async_trait::async_trait]
impl Warehouse for SqlApiWarehouse {
    fn name(&self) -> &'static str {
        "sql-api"
    }

    async fn execute(&self, sql: &str, params: &[Param]) -> WarehouseResult<ResultSet> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WarehouseError::Closed);
        }

        let body = StatementRequest {
            statement: sql,
            timeout: self.timeout.as_secs().max(1),
            database: &self.database,
            schema: &self.schema,
            warehouse: &self.warehouse,
            role: &self.role,
            bindings: bindings(params),
        };

        let url = format!("{}/api/v2/statements", self.endpoint);
        let request = self.request(Method::POST, &url).json(&body);
        let (mut status, mut payload) = self.send(request).await?;

        while status == StatusCode::ACCEPTED {
            let accepted: StatementResponse =
                Self::parse(&payload, "failed to parse accepted statement")?;
            tracing::trace!(handle = %accepted.statement_handle, "statement still running");
            tokio::time::sleep(POLL_INTERVAL).await;

            let url = format!(
                "{}/api/v2/statements/{}",
                self.endpoint, accepted.statement_handle
            );
            (status, payload) = self.send(self.request(Method::GET, &url)).await?;
        }

        if status != StatusCode::OK {
            return Err(Self::statement_error(status, &payload));
        }

        let response: StatementResponse = Self::parse(&payload, "failed to parse statement result")?;
        self.collect(response).await
    }

    async fn close(&self) -> WarehouseResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(warehouse = %self.warehouse, "disconnected from warehouse");
        }
        Ok(())
    }
}

/// Positional bindings keyed by their one-based index.
fn bindings(params: &[Param]) -> BTreeMap<String, Binding> {
    params
        .iter()
        .enumerate()
        .map(|(idx, param)| {
            let binding = Binding {
                kind: param.binding_type(),
                value: param.binding_value(),
            };
            ((idx + 1).to_string(), binding)
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    database: &'a str,
    schema: &'a str,
    warehouse: &'a str,
    role: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding>,
}

#[derive(Debug, Serialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    statement_handle: String,
    code: Option<String>,
    message: Option<String>,
    sql_state: Option<String>,
    result_set_meta_data: Option<ResultSetMetaData>,
    data: Option<Vec<Vec<Option<String>>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct PartitionResponse {
    data: Vec<Vec<Option<String>>>,
}
