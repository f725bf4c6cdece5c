// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy for RFCOMM connection setup.
//
// Classifies errors into Configuration (report at once), Transport (retry
// after a fixed backoff) and Content (never retry, the same bytes fail the
// same way). Only transport errors consume further attempts.

use std::time::Duration;

use thermlink_core::AppConfig;
use thermlink_core::error::{Result, ThermlinkError};
use thermlink_core::types::ErrorClass;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connection retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Attempts after the first one; `retry_count + 1` attempts in total.
    pub retry_count: u32,
    /// Upper bound for a single channel connect.
    pub timeout: Duration,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            retry_count: 3,
            timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(1),
        }
    }
}

impl ConnectOptions {
    pub fn new(retry_count: u32, timeout: Duration) -> Self {
        Self {
            retry_count,
            timeout,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn total_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

impl From<&AppConfig> for ConnectOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            timeout: config.connect_timeout(),
            backoff: config.retry_backoff(),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry; the error is not a transport failure.
    GiveUp(ErrorClass),
    /// Every permitted attempt has been used.
    Exhausted,
}

/// Classify a `ThermlinkError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &ThermlinkError) -> ErrorClass {
    match err {
        // Caller misuse or missing hardware; another attempt changes nothing
        ThermlinkError::NoDevice
        | ThermlinkError::NoSession
        | ThermlinkError::Config(_)
        | ThermlinkError::PlatformUnavailable => ErrorClass::Configuration,

        // Reproducible content failures
        ThermlinkError::Parser(_) | ThermlinkError::Encoding(_) | ThermlinkError::Barcode(_) => {
            ErrorClass::Content
        }

        // Radio, socket and wait failures
        ThermlinkError::Connection(_)
        | ThermlinkError::Write(_)
        | ThermlinkError::NotConnected
        | ThermlinkError::Timeout(_)
        | ThermlinkError::Interrupted
        | ThermlinkError::Io(_)
        | ThermlinkError::Bridge(_)
        | ThermlinkError::Serialization(_) => ErrorClass::Transport,
    }
}

/// Decide whether to retry after the attempt with 0-based index `attempt`
/// failed.
pub fn should_retry(err: &ThermlinkError, attempt: u32, options: &ConnectOptions) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Configuration => {
            info!("configuration error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Configuration)
        }
        ErrorClass::Content => {
            info!("content error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Content)
        }
        ErrorClass::Transport => {
            if attempt >= options.retry_count {
                warn!(attempt, max = options.retry_count, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                debug!(attempt, delay_ms = options.backoff.as_millis(), "scheduling retry");
                RetryDecision::RetryAfter(options.backoff)
            }
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Cancellation is reported as `Interrupted` so callers treat it as a
/// failure rather than a silent early return.
pub async fn wait_interruptible(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(ThermlinkError::Interrupted)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ThermlinkError::Interrupted),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failure_is_transport() {
        let err = ThermlinkError::Connection("read failed, socket might closed".into());
        assert_eq!(classify_error(&err), ErrorClass::Transport);
    }

    #[test]
    fn missing_device_is_configuration() {
        assert_eq!(classify_error(&ThermlinkError::NoDevice), ErrorClass::Configuration);
        assert_eq!(
            classify_error(&ThermlinkError::PlatformUnavailable),
            ErrorClass::Configuration
        );
    }

    #[test]
    fn content_errors_never_retry() {
        let options = ConnectOptions::default();
        let err = ThermlinkError::Barcode("EAN13 needs 12 digits".into());
        assert_eq!(
            should_retry(&err, 0, &options),
            RetryDecision::GiveUp(ErrorClass::Content)
        );
    }

    #[test]
    fn retry_respects_max() {
        let options = ConnectOptions::new(2, Duration::from_secs(1));
        let err = ThermlinkError::Timeout(1_000);
        assert_eq!(
            should_retry(&err, 0, &options),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            should_retry(&err, 1, &options),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(should_retry(&err, 2, &options), RetryDecision::Exhausted);
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let options = ConnectOptions::new(0, Duration::from_secs(1));
        assert_eq!(options.total_attempts(), 1);
        let err = ThermlinkError::Connection("refused".into());
        assert_eq!(should_retry(&err, 0, &options), RetryDecision::Exhausted);
    }

    #[test]
    fn options_follow_config() {
        let config = AppConfig {
            retry_count: 7,
            connect_timeout_ms: 2_500,
            retry_backoff_ms: 250,
            ..Default::default()
        };
        let options = ConnectOptions::from(&config);
        assert_eq!(options.retry_count, 7);
        assert_eq!(options.timeout, Duration::from_millis(2_500));
        assert_eq!(options.backoff, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert!(wait_interruptible(Duration::from_secs(1), &cancel).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_is_interrupted() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let result = wait_interruptible(Duration::from_secs(60), &cancel).await;
        assert!(matches!(result, Err(ThermlinkError::Interrupted)));
    }
}
