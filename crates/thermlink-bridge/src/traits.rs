// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the Bluetooth transport.
//
// All methods are blocking: they map one-to-one onto radio calls that can
// take seconds (socket connect in particular). Callers run them off the UI
// thread.

use std::sync::Arc;

use thermlink_core::error::Result;
use thermlink_core::types::DeviceDescriptor;
use uuid::Uuid;

/// The local Bluetooth adapter.
pub trait BluetoothRadio: Send + Sync {
    /// Human-readable platform name (e.g. "Android").
    fn platform_name(&self) -> &str;

    /// Stop any in-progress inquiry scan. Discovery eats the bandwidth a
    /// connection setup needs.
    fn cancel_discovery(&self) -> Result<()>;

    /// Devices paired with this adapter. An empty list means no devices.
    fn bonded_devices(&self) -> Result<Vec<Arc<dyn RemoteDevice>>>;
}

/// A paired remote device that RFCOMM channels can be opened to.
pub trait RemoteDevice: Send + Sync {
    /// Hardware address. Never fails; the radio reports it at enumeration.
    fn address(&self) -> &str;

    /// Read name, class and advertised services. Each field is a separate
    /// radio query, so this can fail for a single misbehaving device.
    fn describe(&self) -> Result<DeviceDescriptor>;

    /// Create a secure channel addressed by service UUID (SDP lookup).
    fn open_secure(&self, service: Uuid) -> Result<Arc<dyn RfcommChannel>>;

    /// Create a channel bound directly to an RFCOMM channel number, without
    /// a service-record lookup.
    fn open_raw(&self, channel: u8) -> Result<Arc<dyn RfcommChannel>>;
}

/// One RFCOMM socket. Created unconnected.
pub trait RfcommChannel: Send + Sync {
    /// Establish the link. Blocks until connected or failed.
    fn connect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Write all bytes to the output stream.
    fn write_all(&self, data: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()>;

    /// Close the socket. Also aborts a `connect` blocked on another thread.
    fn close(&self) -> Result<()>;
}
