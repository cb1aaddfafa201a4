//! Core infrastructure: configuration, logging and the retry policy used
//! around upstream MAAS calls.

mod config;
pub mod logging;
mod retry;

pub use config::{
    split_api_key, BackendKind, Config, ConfigError, HandshakeMode, LogFormat, LoggingConfig,
    MaasConfig, ProtocolConfig, RetrySettings, ServerConfig, TransportKind, LOCAL_CONFIG_FILE,
};
pub use retry::{
    retry, retry_async, InvalidRetryPolicy, RetryError, RetryPolicy, RetryResult, Retryable,
};
