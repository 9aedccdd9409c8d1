// src/infra/config.rs — Environment-sourced configuration

use std::time::Duration;

use crate::core::types::RetryExhaustedPolicy;
use crate::infra::errors::ModelForgeError;

/// Immutable service configuration, built once at process start and passed
/// by reference. Core logic never reads the environment directly.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub queue: QueueConfig,
    pub store: StoreConfig,
    pub worker: WorkerConfig,
    pub build: BuildConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            debug: false,
            cors_origins: vec!["*".into()],
        }
    }
}

/// Location of the queue broker. The broker itself is an external system;
/// these settings tell a broker-backed adapter where to connect.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub redis_db: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_host: "localhost".into(),
            redis_port: 6379,
            redis_password: None,
            redis_db: 0,
        }
    }
}

/// Location of the document store holding job records.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub mongodb_uri: String,
    pub mongodb_db: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_db: "modelforge".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of workers in the pool.
    pub concurrency: u32,
    /// In-flight job cap per worker; the admission-control knob.
    pub prefetch_count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            prefetch_count: 1,
        }
    }
}

/// Default per-job bounds, overridable per request at submission.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub max_iterations: u32,
    /// Wall-clock budget for one job, all iterations combined.
    pub timeout: Duration,
    /// Retry ceiling per propose step.
    pub max_retries: u32,
    pub retry_exhausted: RetryExhaustedPolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            timeout: Duration::from_secs(3600),
            max_retries: 3,
            retry_exhausted: RetryExhaustedPolicy::ConsumeIteration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Propose backend as "provider/model".
    pub llm_provider: String,
    pub openai_api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            llm_provider: "openai/gpt-4o-mini".into(),
            openai_api_key: None,
        }
    }
}

impl Config {
    /// Build the configuration from the environment, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ModelForgeError> {
        let defaults = Self::default();

        Ok(Self {
            api: ApiConfig {
                host: env_string("API_HOST").unwrap_or(defaults.api.host),
                port: env_parse("API_PORT")?.unwrap_or(defaults.api.port),
                debug: env_flag("API_DEBUG")?.unwrap_or(defaults.api.debug),
                cors_origins: env_list("CORS_ORIGINS").unwrap_or(defaults.api.cors_origins),
            },
            queue: QueueConfig {
                redis_host: env_string("REDIS_HOST").unwrap_or(defaults.queue.redis_host),
                redis_port: env_parse("REDIS_PORT")?.unwrap_or(defaults.queue.redis_port),
                redis_password: env_string("REDIS_PASSWORD"),
                redis_db: env_parse("REDIS_DB")?.unwrap_or(defaults.queue.redis_db),
            },
            store: StoreConfig {
                mongodb_uri: env_string("MONGODB_URI").unwrap_or(defaults.store.mongodb_uri),
                mongodb_db: env_string("MONGODB_DB").unwrap_or(defaults.store.mongodb_db),
            },
            worker: WorkerConfig {
                concurrency: env_parse("WORKER_CONCURRENCY")?
                    .unwrap_or(defaults.worker.concurrency),
                prefetch_count: env_parse("WORKER_PREFETCH_COUNT")?
                    .unwrap_or(defaults.worker.prefetch_count),
            },
            build: BuildConfig {
                max_iterations: env_parse("MODEL_MAX_ITERATIONS")?
                    .unwrap_or(defaults.build.max_iterations),
                timeout: env_parse("MODEL_TIMEOUT")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.build.timeout),
                max_retries: env_parse("MAX_RETRIES")?.unwrap_or(defaults.build.max_retries),
                retry_exhausted: defaults.build.retry_exhausted,
            },
            provider: ProviderConfig {
                llm_provider: env_string("LLM_PROVIDER").unwrap_or(defaults.provider.llm_provider),
                openai_api_key: env_string("OPENAI_API_KEY"),
            },
        })
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ModelForgeError> {
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ModelForgeError::Config(format!("invalid value for {name}: {raw:?}"))),
        None => Ok(None),
    }
}

fn env_flag(name: &str) -> Result<Option<bool>, ModelForgeError> {
    match env_string(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ModelForgeError::Config(format!(
                "invalid value for {name}: {raw:?}"
            ))),
        },
        None => Ok(None),
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    env_string(name).map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
