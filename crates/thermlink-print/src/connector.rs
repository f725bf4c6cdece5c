// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Robust RFCOMM connector.
//
// Some printer firmware rejects the secure, SDP-resolved socket but accepts
// a socket bound straight to RFCOMM channel 1. The connector starts with the
// secure strategy and, the first time it fails before ever having worked,
// switches to the raw-channel strategy for good. Each attempt is bounded by
// a timeout; attempts are separated by a fixed, interruptible backoff.

use std::sync::Arc;
use std::time::Duration;

use thermlink_bridge::{BluetoothRadio, RemoteDevice, RfcommChannel};
use thermlink_core::error::{Result, ThermlinkError};
use thermlink_core::types::{CharsetEncoding, ConnectStrategy, ErrorClass, FALLBACK_RFCOMM_CHANNEL, SPP_UUID};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::retry::{self, ConnectOptions, RetryDecision};
use crate::session::{SessionLink, TransportSession, blocking, close_quietly};

/// Connector shared between the classifier, the caller and print jobs.
///
/// Jobs hold the lock while connecting and while writing. [`close`] does not
/// take it, so a caller can always cancel hard.
///
/// [`close`]: SharedConnector::close
#[derive(Clone)]
pub struct SharedConnector {
    inner: Arc<tokio::sync::Mutex<RobustConnector>>,
    link: SessionLink,
}

impl SharedConnector {
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, RobustConnector> {
        self.inner.lock().await
    }

    /// Close the session. A connect in progress stops without further
    /// attempts and a write in progress fails. The sticky strategy flag
    /// survives.
    pub async fn close(&self) {
        self.link.close().await;
    }

    /// Whether a channel is bound, without waiting for the lock.
    pub fn is_connected(&self) -> bool {
        self.link.is_bound()
    }

    pub(crate) fn link(&self) -> &SessionLink {
        &self.link
    }
}

/// One strategy tried during one attempt of the last `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 0-based attempt index.
    pub index: u32,
    pub strategy: ConnectStrategy,
    /// `None` on success, otherwise the failure cause.
    pub error: Option<String>,
}

/// Retrying, strategy-switching connection to one remote device.
pub struct RobustConnector {
    radio: Arc<dyn BluetoothRadio>,
    device: Option<Arc<dyn RemoteDevice>>,
    session: TransportSession,
    options: ConnectOptions,
    /// Sticky: once set, the secure strategy is never tried again.
    use_fallback: bool,
    /// The secure strategy has connected at least once.
    secure_proven: bool,
    attempts: Vec<AttemptRecord>,
}

impl RobustConnector {
    pub fn new(
        radio: Arc<dyn BluetoothRadio>,
        device: Option<Arc<dyn RemoteDevice>>,
        charset: CharsetEncoding,
    ) -> Self {
        Self {
            radio,
            device,
            session: TransportSession::new(charset),
            options: ConnectOptions::default(),
            use_fallback: false,
            secure_proven: false,
            attempts: Vec::new(),
        }
    }

    /// Replace the options used by [`connect`](Self::connect).
    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn into_shared(self) -> SharedConnector {
        SharedConnector {
            link: self.session.link(),
            inner: Arc::new(tokio::sync::Mutex::new(self)),
        }
    }

    pub fn device(&self) -> Option<&Arc<dyn RemoteDevice>> {
        self.device.as_ref()
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TransportSession {
        &mut self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Whether the raw-channel strategy has taken over on this connector.
    pub fn uses_fallback(&self) -> bool {
        self.use_fallback
    }

    /// Strategy log of the most recent `connect` call.
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Number of attempts the most recent `connect` call consumed.
    pub fn attempts_made(&self) -> u32 {
        self.attempts.last().map_or(0, |r| r.index + 1)
    }

    /// Connect with the connector's own options.
    pub async fn connect(&mut self) -> Result<&mut TransportSession> {
        let options = self.options.clone();
        self.connect_until(&options, &CancellationToken::new()).await
    }

    /// Connect with an explicit retry bound and per-attempt timeout.
    pub async fn connect_with(
        &mut self,
        retry_count: u32,
        timeout: Duration,
    ) -> Result<&mut TransportSession> {
        let options = ConnectOptions::new(retry_count, timeout).with_backoff(self.options.backoff);
        self.connect_until(&options, &CancellationToken::new()).await
    }

    /// Connect, giving up early if `cancel` fires during a backoff wait.
    ///
    /// Returns the existing session without any attempt if the link is
    /// still up; a dropped link is released first. After `retry_count + 1`
    /// failed attempts the last cause is returned as
    /// [`ThermlinkError::Connection`]. Closing the session through
    /// [`SharedConnector::close`] ends the call with `Interrupted`.
    #[instrument(skip_all, fields(retry_count = options.retry_count, timeout_ms = options.timeout.as_millis()))]
    pub async fn connect_until(
        &mut self,
        options: &ConnectOptions,
        cancel: &CancellationToken,
    ) -> Result<&mut TransportSession> {
        if self.session.verify_link().await {
            debug!("already connected");
            return Ok(&mut self.session);
        }
        self.attempts.clear();

        let Some(device) = self.device.clone() else {
            return Err(ThermlinkError::NoDevice);
        };
        let closed = self.session.link().close_signal();

        let mut attempt = 0;
        loop {
            match self.attempt(&device, attempt, options, &closed).await {
                Ok(channel) => {
                    if !self.session.attach(Arc::clone(&channel), &closed) {
                        close_quietly(channel).await;
                        info!(address = device.address(), "session closed while connecting");
                        return Err(ThermlinkError::Interrupted);
                    }
                    info!(
                        address = device.address(),
                        attempt,
                        fallback = self.use_fallback,
                        "connected"
                    );
                    return Ok(&mut self.session);
                }
                Err(e) => {
                    self.session.disconnect().await;
                    if closed.is_cancelled() {
                        info!(address = device.address(), attempt, "session closed while connecting");
                        return Err(ThermlinkError::Interrupted);
                    }
                    match retry::should_retry(&e, attempt, options) {
                        RetryDecision::RetryAfter(delay) => {
                            debug!(attempt, error = %e, "attempt failed");
                            tokio::select! {
                                biased;
                                _ = closed.cancelled() => return Err(ThermlinkError::Interrupted),
                                waited = retry::wait_interruptible(delay, cancel) => waited?,
                            }
                            attempt += 1;
                        }
                        RetryDecision::GiveUp(_) => return Err(e),
                        RetryDecision::Exhausted => {
                            warn!(
                                address = device.address(),
                                attempts = attempt + 1,
                                error = %e,
                                "giving up"
                            );
                            return Err(ThermlinkError::Connection(cause(e)));
                        }
                    }
                }
            }
        }
    }

    /// Close the session. The sticky strategy flag survives.
    pub async fn disconnect(&mut self) {
        self.session.disconnect().await;
    }

    async fn attempt(
        &mut self,
        device: &Arc<dyn RemoteDevice>,
        index: u32,
        options: &ConnectOptions,
        closed: &CancellationToken,
    ) -> Result<Arc<dyn RfcommChannel>> {
        let link = self.session.link();
        let radio = Arc::clone(&self.radio);
        if let Err(e) = blocking(move || radio.cancel_discovery()).await {
            warn!(error = %e, "could not cancel discovery");
        }

        if !self.use_fallback {
            let service = resolve_service(device).await;
            let result = open_channel(device, ConnectStrategy::Secure, service, options.timeout, &link, closed).await;
            self.record(index, ConnectStrategy::Secure, &result);
            match result {
                Ok(channel) => {
                    self.secure_proven = true;
                    return Ok(channel);
                }
                Err(e) => {
                    if self.secure_proven
                        || closed.is_cancelled()
                        || retry::classify_error(&e) != ErrorClass::Transport
                    {
                        return Err(e);
                    }
                    warn!(
                        address = device.address(),
                        error = %e,
                        "secure channel failed, switching to raw channel {}",
                        FALLBACK_RFCOMM_CHANNEL
                    );
                    self.use_fallback = true;
                }
            }
        }

        let result =
            open_channel(device, ConnectStrategy::RawChannel, SPP_UUID, options.timeout, &link, closed).await;
        self.record(index, ConnectStrategy::RawChannel, &result);
        result
    }

    fn record(&mut self, index: u32, strategy: ConnectStrategy, result: &Result<Arc<dyn RfcommChannel>>) {
        self.attempts.push(AttemptRecord {
            index,
            strategy,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
    }
}

impl std::fmt::Debug for RobustConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobustConnector")
            .field("platform", &self.radio.platform_name())
            .field("device", &self.device.as_ref().map(|d| d.address().to_owned()))
            .field("session", &self.session)
            .field("use_fallback", &self.use_fallback)
            .finish()
    }
}

/// Service UUID for the secure strategy. A device that cannot be described
/// is still tried against SPP.
async fn resolve_service(device: &Arc<dyn RemoteDevice>) -> Uuid {
    let device = Arc::clone(device);
    match blocking(move || device.describe()).await {
        Ok(descriptor) => descriptor.resolve_service_id(),
        Err(e) => {
            debug!(error = %e, "describe failed, assuming SPP");
            SPP_UUID
        }
    }
}

/// Create a channel with `strategy` and connect it within `timeout`. The
/// channel sits in the link's in-flight slot while connecting so a close
/// can reach it. A channel that fails to connect is closed before
/// returning.
async fn open_channel(
    device: &Arc<dyn RemoteDevice>,
    strategy: ConnectStrategy,
    service: Uuid,
    timeout: Duration,
    link: &SessionLink,
    closed: &CancellationToken,
) -> Result<Arc<dyn RfcommChannel>> {
    let opener = Arc::clone(device);
    let channel = blocking(move || match strategy {
        ConnectStrategy::Secure => opener.open_secure(service),
        ConnectStrategy::RawChannel => opener.open_raw(FALLBACK_RFCOMM_CHANNEL),
    })
    .await?;
    link.set_connecting(Some(Arc::clone(&channel)));

    debug!(%strategy, "connecting channel");
    let connecting = Arc::clone(&channel);
    let outcome = tokio::select! {
        biased;
        _ = closed.cancelled() => Err(ThermlinkError::Interrupted),
        result = tokio::time::timeout(timeout, blocking(move || connecting.connect())) => {
            result.unwrap_or_else(|_| {
                Err(ThermlinkError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)))
            })
        }
    };

    match outcome {
        Ok(()) => Ok(channel),
        Err(e) => {
            link.set_connecting(None);
            // Closing the socket unblocks a pending connect.
            close_quietly(channel).await;
            Err(e)
        }
    }
}

fn cause(err: ThermlinkError) -> String {
    match err {
        ThermlinkError::Connection(msg) => msg,
        other => other.to_string(),
    }
}
