// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport session: the send-only byte stream of one RFCOMM link.
//
// Writes are buffered and pushed to the channel by `send`.  The channel is
// present exactly while the session is connected; a failed send drops it.
// The channel slot is shared through `SessionLink`, which can close the
// session from outside while a connect or write is in flight.

use std::sync::{Arc, Mutex, PoisonError};

use thermlink_bridge::RfcommChannel;
use thermlink_core::error::{Result, ThermlinkError};
use thermlink_core::types::CharsetEncoding;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Run a blocking radio call on tokio's blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ThermlinkError::Bridge(format!("blocking task failed: {e}")))?
}

/// Close a channel, logging instead of propagating the error.
pub(crate) async fn close_quietly(channel: Arc<dyn RfcommChannel>) {
    if let Err(e) = blocking(move || channel.close()).await {
        warn!(error = %e, "error closing RFCOMM channel");
    }
}

/// The channel slots of one session, shared with [`SharedConnector`] so the
/// session can be closed without the connector's lock.
///
/// [`SharedConnector`]: crate::connector::SharedConnector
#[derive(Clone, Default)]
pub struct SessionLink {
    state: Arc<Mutex<LinkState>>,
}

#[derive(Default)]
struct LinkState {
    /// Connected channel. `Some` exactly while the session is connected.
    bound: Option<Arc<dyn RfcommChannel>>,
    /// Channel of the connect attempt in progress.
    connecting: Option<Arc<dyn RfcommChannel>>,
    /// Fired by `close`, then replaced so later connects start clean.
    closed: CancellationToken,
}

impl SessionLink {
    fn with<R>(&self, f: impl FnOnce(&mut LinkState) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_bound(&self) -> bool {
        self.with(|s| s.bound.is_some())
    }

    /// Signal that fires when the session is closed from outside. Take it
    /// before starting work that `close` must abort.
    pub fn close_signal(&self) -> CancellationToken {
        self.with(|s| s.closed.clone())
    }

    fn bound(&self) -> Option<Arc<dyn RfcommChannel>> {
        self.with(|s| s.bound.clone())
    }

    fn take_bound(&self) -> Option<Arc<dyn RfcommChannel>> {
        self.with(|s| s.bound.take())
    }

    pub(crate) fn set_connecting(&self, channel: Option<Arc<dyn RfcommChannel>>) {
        self.with(|s| s.connecting = channel);
    }

    /// Bind `channel` unless `closed` already fired. Checked under the slot
    /// lock so a concurrent `close` either sees the channel or wins.
    fn bind_unless_closed(&self, channel: Arc<dyn RfcommChannel>, closed: &CancellationToken) -> bool {
        self.with(|s| {
            if closed.is_cancelled() {
                return false;
            }
            s.connecting = None;
            s.bound = Some(channel);
            true
        })
    }

    /// Close the bound and the in-flight channel and fire the close signal.
    /// A blocked connect or write on those channels fails.
    pub async fn close(&self) {
        let (bound, connecting) = self.with(|s| {
            std::mem::take(&mut s.closed).cancel();
            (s.bound.take(), s.connecting.take())
        });
        if bound.is_none() && connecting.is_none() {
            debug!("close requested on idle session");
            return;
        }
        info!(connected = bound.is_some(), connecting = connecting.is_some(), "closing session");
        for channel in bound.into_iter().chain(connecting) {
            close_quietly(channel).await;
        }
    }
}

/// A single physical link to a printer.
pub struct TransportSession {
    link: SessionLink,
    pending: Vec<u8>,
    charset: CharsetEncoding,
}

impl TransportSession {
    /// Create an unconnected session that formats payloads with `charset`.
    pub fn new(charset: CharsetEncoding) -> Self {
        Self {
            link: SessionLink::default(),
            pending: Vec::new(),
            charset,
        }
    }

    /// Encoding profile the formatter must use for this printer.
    pub fn charset(&self) -> &CharsetEncoding {
        &self.charset
    }

    /// Whether a channel is bound. Does not query the radio; see
    /// [`verify_link`](Self::verify_link).
    pub fn is_connected(&self) -> bool {
        self.link.is_bound()
    }

    pub fn link(&self) -> SessionLink {
        self.link.clone()
    }

    /// Ask the bound channel whether the link is still up. A dropped link
    /// is closed and released, leaving the session disconnected.
    pub async fn verify_link(&mut self) -> bool {
        let Some(channel) = self.link.bound() else {
            return false;
        };
        let up = blocking(move || Ok(channel.is_connected())).await.unwrap_or(false);
        if !up {
            warn!("link dropped, releasing channel");
            self.disconnect().await;
        }
        up
    }

    /// Bytes buffered by `write` and not yet sent.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Attach a freshly connected channel and reset buffered state. Fails
    /// if the session was closed while the channel was connecting.
    pub(crate) fn attach(&mut self, channel: Arc<dyn RfcommChannel>, closed: &CancellationToken) -> bool {
        self.pending.clear();
        self.link.bind_unless_closed(channel, closed)
    }

    /// Buffer bytes for the next `send`.
    pub fn write(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Push the buffered bytes to the printer.
    ///
    /// On failure the session disconnects and the buffer is discarded.
    #[instrument(skip(self), fields(bytes = self.pending.len()))]
    pub async fn send(&mut self) -> Result<()> {
        let Some(channel) = self.link.bound() else {
            return Err(ThermlinkError::NotConnected);
        };
        if self.pending.is_empty() {
            return Ok(());
        }

        let data = std::mem::take(&mut self.pending);
        let result = blocking(move || {
            channel.write_all(&data)?;
            channel.flush()
        })
        .await;

        match result {
            Ok(()) => {
                debug!("payload sent");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "write failed, dropping connection");
                self.disconnect().await;
                Err(match e {
                    ThermlinkError::Write(_) => e,
                    other => ThermlinkError::Write(other.to_string()),
                })
            }
        }
    }

    /// Close the link and discard buffered bytes. Safe to call when already
    /// disconnected.
    pub async fn disconnect(&mut self) {
        self.pending.clear();
        if let Some(channel) = self.link.take_bound() {
            close_quietly(channel).await;
            debug!("session disconnected");
        }
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("connected", &self.is_connected())
            .field("pending", &self.pending.len())
            .field("charset", &self.charset)
            .finish()
    }
}
