//! Per-invocation state: settings, output sink and pipeline context.

use std::path::PathBuf;
use std::time::Duration;

use explorium_client::{ApiClient, EntityApi};
use explorium_config::{RetrySettings, Settings};
use explorium_engine::{CancelToken, EntityKind, RetryPolicy, RunContext};
use serde_json::Value;
use tracing::warn;

use crate::exit_codes::EXIT_CANCELLED;
use crate::output::Output;
use crate::{CliError, GlobalArgs};

pub struct App {
    pub settings: Settings,
    pub output: Output,
    pub ctx: RunContext,
}

impl App {
    /// Load settings (defaults < file < env < flags) and build the run context.
    pub fn load(global: &GlobalArgs) -> Result<Self, CliError> {
        let settings = Settings::load(global.config.as_deref())?;

        let workers = global.concurrency.unwrap_or(settings.concurrency);
        if workers == 0 {
            return Err(CliError::args("--concurrency must be at least 1"));
        }

        let cancel = CancelToken::new();
        install_signal_handlers(&cancel);

        let ctx = RunContext::default()
            .with_workers(workers)
            .with_retry(retry_policy(&settings.retry))
            .with_cancel(cancel);

        let output = Output {
            format: global.output.unwrap_or(settings.default_output),
            file: global.output_file.clone(),
        };

        Ok(Self { settings, output, ctx })
    }

    pub fn client(&self) -> Result<ApiClient, CliError> {
        Ok(ApiClient::new(
            &self.settings.api_key,
            &self.settings.base_url,
            Duration::from_secs(self.settings.timeout_secs),
        )?)
    }

    pub fn entity(&self, kind: EntityKind) -> Result<EntityApi, CliError> {
        Ok(EntityApi::new(self.client()?, kind))
    }

    /// `--min-confidence`, else the configured threshold.
    pub fn threshold(&self, flag: Option<f64>) -> f64 {
        flag.unwrap_or(self.settings.min_confidence)
    }

    /// `--page-size`, else the configured default.
    pub fn page_size(&self, flag: Option<u32>) -> Result<u32, CliError> {
        match flag.unwrap_or(self.settings.default_page_size) {
            0 => Err(CliError::args("--page-size must be at least 1")),
            n => Ok(n),
        }
    }

    pub fn emit(&self, value: &Value) -> Result<(), CliError> {
        if self.ctx.cancel.is_cancelled() {
            warn!("Interrupted: results are partial, undispatched items are marked cancelled");
        }
        self.output.emit(value)
    }
}

pub fn config_path(global: &GlobalArgs) -> PathBuf {
    global.config.clone().unwrap_or_else(Settings::config_path)
}

fn retry_policy(retry: &RetrySettings) -> RetryPolicy {
    RetryPolicy {
        max_attempts: retry.max_attempts,
        base_delay: Duration::from_millis(retry.base_delay_ms),
        multiplier: retry.multiplier,
        jitter: Duration::from_millis(retry.jitter_ms),
        max_delay: Duration::from_millis(retry.max_delay_ms),
        ..RetryPolicy::default()
    }
}

/// First SIGINT/SIGTERM sets the cancel flag: no new chunks, batches or
/// pages are dispatched. A second one while the flag is set exits at once.
fn install_signal_handlers(cancel: &CancelToken) {
    for &signal in signal_hook::consts::TERM_SIGNALS {
        let registered = signal_hook::flag::register_conditional_shutdown(
            signal,
            i32::from(EXIT_CANCELLED),
            cancel.flag(),
        )
        .and_then(|_| signal_hook::flag::register(signal, cancel.flag()));
        if let Err(e) = registered {
            warn!("cannot install handler for signal {signal}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_from_settings() {
        let policy = retry_policy(&RetrySettings {
            max_attempts: 4,
            base_delay_ms: 250,
            multiplier: 3.0,
            jitter_ms: 10,
            max_delay_ms: 2_000,
        });
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(750));
        assert_eq!(policy.jitter, Duration::from_millis(10));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert!(policy.retryable_statuses.contains(&429));
    }
}
