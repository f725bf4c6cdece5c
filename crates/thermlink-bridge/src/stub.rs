// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where no RFCOMM socket API is wired up.
//
// Enumeration returns `PlatformUnavailable`; the real implementation lives
// in the `android` module.

use std::sync::Arc;

use thermlink_core::error::{Result, ThermlinkError};

use crate::traits::*;

/// No-op radio returned on non-mobile platforms.
pub struct StubBridge;

impl BluetoothRadio for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn cancel_discovery(&self) -> Result<()> {
        // Nothing can be scanning.
        Ok(())
    }

    fn bonded_devices(&self) -> Result<Vec<Arc<dyn RemoteDevice>>> {
        tracing::warn!("BluetoothRadio::bonded_devices called on stub bridge");
        Err(ThermlinkError::PlatformUnavailable)
    }
}
