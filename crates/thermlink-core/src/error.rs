// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Thermlink.

use thiserror::Error;

/// Top-level error type for all Thermlink operations.
#[derive(Debug, Error)]
pub enum ThermlinkError {
    // -- Configuration errors (caller misuse, never retried) --
    #[error("no Bluetooth device supplied")]
    NoDevice,

    #[error("no printer session attached to the job")]
    NoSession,

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Transport errors --
    #[error("unable to connect to bluetooth device: {0}")]
    Connection(String),

    #[error("write to printer failed: {0}")]
    Write(String),

    #[error("printer is not connected")]
    NotConnected,

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("interrupted while waiting")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // -- Content errors (reproducible, never retried) --
    #[error("invalid formatted text: {0}")]
    Parser(String),

    #[error("unsupported character encoding: {0}")]
    Encoding(String),

    #[error("invalid barcode: {0}")]
    Barcode(String),

    // -- Platform / persistence --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("Bluetooth is not available on this platform")]
    PlatformUnavailable,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ThermlinkError>;
