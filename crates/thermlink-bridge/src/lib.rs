// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thermlink: native Bluetooth bridge abstractions.
//
// Defines the radio / remote device / RFCOMM channel traits the connector is
// written against, and picks the implementation for the target OS.

use std::sync::Arc;

pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

pub use traits::{BluetoothRadio, RemoteDevice, RfcommChannel};

/// Returns the Bluetooth radio for the target operating system.
pub fn platform_bridge() -> Arc<dyn BluetoothRadio> {
    #[cfg(target_os = "android")]
    {
        // Android: BluetoothAdapter / BluetoothSocket through `jni-rs`.
        Arc::new(android::AndroidBridge::new())
    }
    #[cfg(not(target_os = "android"))]
    {
        // Desktop/CI: no RFCOMM sockets, every call reports unavailability.
        Arc::new(stub::StubBridge)
    }
}
