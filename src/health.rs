use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub gateway_circuit: String,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn is_unhealthy(&self) -> bool {
        self.status == "unhealthy"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub struct RedisChecker {
    url: String,
}

impl RedisChecker {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    async fn ping(&self) -> redis::RedisResult<String> {
        let client = redis::Client::open(self.url.as_str())?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.ping().await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

struct Dependency {
    name: String,
    critical: bool,
    checker: Arc<dyn DependencyChecker>,
}

/// Aggregates dependency checks. A failing critical dependency makes the
/// service `unhealthy`; any other failure only `degraded`.
#[derive(Clone)]
pub struct HealthService {
    dependencies: Arc<Vec<Dependency>>,
    start_time: Instant,
}

impl HealthService {
    pub fn builder() -> HealthServiceBuilder {
        HealthServiceBuilder::default()
    }

    pub async fn check(&self, gateway_circuit: &str) -> HealthResponse {
        let checks = self.dependencies.iter().map(|dep| async move {
            let status = timeout(CHECK_TIMEOUT, dep.checker.check())
                .await
                .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            (dep, status)
        });
        let results = futures::future::join_all(checks).await;

        let mut has_critical_failure = false;
        let mut has_non_critical_failure = false;
        let mut dependencies = HashMap::new();

        for (dep, status) in results {
            if matches!(status, DependencyStatus::Unhealthy { .. }) {
                if dep.critical {
                    has_critical_failure = true;
                } else {
                    has_non_critical_failure = true;
                }
            }
            dependencies.insert(dep.name.clone(), status);
        }

        let status = if has_critical_failure {
            "unhealthy"
        } else if has_non_critical_failure {
            "degraded"
        } else {
            "healthy"
        };

        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            gateway_circuit: gateway_circuit.to_string(),
            dependencies,
        }
    }
}

#[derive(Default)]
pub struct HealthServiceBuilder {
    dependencies: Vec<Dependency>,
}

impl HealthServiceBuilder {
    pub fn critical(mut self, name: &str, checker: Arc<dyn DependencyChecker>) -> Self {
        self.dependencies.push(Dependency {
            name: name.to_string(),
            critical: true,
            checker,
        });
        self
    }

    pub fn optional(mut self, name: &str, checker: Arc<dyn DependencyChecker>) -> Self {
        self.dependencies.push(Dependency {
            name: name.to_string(),
            critical: false,
            checker,
        });
        self
    }

    pub fn build(self) -> HealthService {
        HealthService {
            dependencies: Arc::new(self.dependencies),
            start_time: Instant::now(),
        }
    }
}
