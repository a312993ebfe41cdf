//! Scripted in-memory warehouse for tests.
//!
//! This provides a [`Warehouse`] that answers statements from a list of routes instead of a real
//! warehouse. A route matches when its needle is contained in the statement text, and the first
//! matching route wins. Statements without a route return an empty [`ResultSet`].
//!
//! The warehouse is [`Clone`] so tests can hold a handle for inspection while the code under test
//! owns a shared copy.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{WarehouseError, WarehouseResult};
use crate::result_set::ResultSet;
use crate::warehouse::{Param, Warehouse};

/// A statement received by [`InMemoryWarehouse`].
#[derive(Clone, Debug, PartialEq)]
pub struct Executed {
    /// Statement text.
    pub sql: String,
    /// Bind parameters.
    pub params: Vec<Param>,
}

#[derive(Debug)]
enum Reply {
    Rows(ResultSet),
    Fail(String),
}

#[derive(Debug)]
struct Route {
    needle: String,
    reply: Reply,
    latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    routes: Mutex<Vec<Route>>,
    executed: Mutex<Vec<Executed>>,
    latency: Mutex<Duration>,
    handles: AtomicU64,
    closed: AtomicBool,
}

/// A [`Warehouse`] answering from scripted routes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryWarehouse {
    inner: Arc<Inner>,
}

impl InMemoryWarehouse {
    /// Creates a warehouse without routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, needle: &str, reply: Reply, latency: Option<Duration>) {
        self.inner.routes.lock().unwrap().push(Route {
            needle: needle.to_owned(),
            reply,
            latency,
        });
    }

    /// Answers statements containing `needle` with `rows`.
    pub fn respond(self, needle: &str, rows: ResultSet) -> Self {
        self.push(needle, Reply::Rows(rows), None);
        self
    }

    /// Fails statements containing `needle` with a statement error carrying `message`.
    pub fn fail(self, needle: &str, message: &str) -> Self {
        self.push(needle, Reply::Fail(message.to_owned()), None);
        self
    }

    /// Answers statements containing `needle` with `rows` after waiting for `latency`.
    pub fn respond_after(self, needle: &str, rows: ResultSet, latency: Duration) -> Self {
        self.push(needle, Reply::Rows(rows), Some(latency));
        self
    }

    /// Simulated latency applied to every statement without a route-specific latency.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock().unwrap() = latency;
        self
    }

    /// All statements executed so far, in order of arrival.
    pub fn executed(&self) -> Vec<Executed> {
        self.inner.executed.lock().unwrap().clone()
    }

    /// Returns `true` once [`Warehouse::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn resolve(&self, sql: &str) -> (WarehouseResult<ResultSet>, Duration) {
        let default_latency = *self.inner.latency.lock().unwrap();
        let routes = self.inner.routes.lock().unwrap();
        let Some(route) = routes.iter().find(|r| sql.contains(&r.needle)) else {
            return (Ok(ResultSet::default()), default_latency);
        };

        let reply = match &route.reply {
            Reply::Rows(rows) => Ok(rows.clone()),
            Reply::Fail(message) => Err(WarehouseError::Statement {
                code: "000000".into(),
                message: message.clone(),
                sql_state: None,
            }),
        };
        (reply, route.latency.unwrap_or(default_latency))
    }
}

#[async_trait::async_trait]
impl Warehouse for InMemoryWarehouse {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn execute(&self, sql: &str, params: &[Param]) -> WarehouseResult<ResultSet> {
        if self.is_closed() {
            return Err(WarehouseError::Closed);
        }

        self.inner.executed.lock().unwrap().push(Executed {
            sql: sql.to_owned(),
            params: params.to_vec(),
        });

        let (reply, latency) = self.resolve(sql);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let handle = self.inner.handles.fetch_add(1, Ordering::Relaxed);
        reply.map(|rows| rows.with_statement_handle(format!("stmt-{handle:08}")))
    }

    async fn close(&self) -> WarehouseResult<()> {
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_by_needle() {
        let warehouse = InMemoryWarehouse::new()
            .respond(
                "FROM PATIENTS",
                ResultSet::from_strings(&["PATIENT_ID"], [[Some("PAT-1")], [Some("PAT-2")]]),
            )
            .fail("FROM BROKEN", "Object does not exist");

        let rows = warehouse
            .execute("SELECT PATIENT_ID FROM PATIENTS", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.statement_handle().unwrap().starts_with("stmt-"));

        let err = warehouse.execute("SELECT * FROM BROKEN", &[]).await;
        assert!(matches!(err, Err(WarehouseError::Statement { .. })));

        let empty = warehouse
            .execute("SELECT 1", &["x".into()])
            .await
            .unwrap();
        assert!(empty.is_empty());

        assert_eq!(warehouse.executed().len(), 3);
        assert_eq!(warehouse.executed()[2].params, vec![Param::from("x")]);
    }

    #[tokio::test]
    async fn rejects_after_close() {
        let warehouse = InMemoryWarehouse::new();
        warehouse.close().await.unwrap();

        assert!(warehouse.is_closed());
        let err = warehouse.execute("SELECT 1", &[]).await;
        assert!(matches!(err, Err(WarehouseError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn applies_latency() {
        let warehouse = InMemoryWarehouse::new().with_latency(Duration::from_millis(40));

        let start = tokio::time::Instant::now();
        warehouse.execute("SELECT 1", &[]).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
