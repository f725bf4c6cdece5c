// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Thermlink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ThermlinkError;

/// Well-known Serial Port Profile service class UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// RFCOMM channel used by the raw-channel connection strategy.
pub const FALLBACK_RFCOMM_CHANNEL: u8 = 1;

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bluetooth class-of-device codes, as reported by the radio.
///
/// `major` is the major device class (bits 8..12 of the CoD, kept in place)
/// and `device` is the full major+minor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceClass {
    pub major: u16,
    pub device: u16,
}

impl DeviceClass {
    pub const MAJOR_MISC: u16 = 0x0000;
    pub const MAJOR_COMPUTER: u16 = 0x0100;
    pub const MAJOR_PHONE: u16 = 0x0200;
    pub const MAJOR_AUDIO_VIDEO: u16 = 0x0400;
    pub const MAJOR_IMAGING: u16 = 0x0600;
    pub const MAJOR_UNCATEGORIZED: u16 = 0x1F00;

    /// Imaging major class with the printer minor bit set.
    pub const IMAGING_PRINTER: u16 = 0x0680;

    pub const fn new(major: u16, device: u16) -> Self {
        Self { major, device }
    }

    /// Class reported by a dedicated printer (imaging / printer).
    pub const fn printer() -> Self {
        Self::new(Self::MAJOR_IMAGING, Self::IMAGING_PRINTER)
    }

    /// Class with no meaningful major or minor bits.
    pub const fn uncategorized() -> Self {
        Self::new(Self::MAJOR_UNCATEGORIZED, Self::MAJOR_UNCATEGORIZED)
    }
}

/// Metadata describing a paired (bonded) remote device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Hardware address, e.g. `00:11:22:AA:BB:CC`.
    pub address: String,
    pub name: Option<String>,
    pub class: DeviceClass,
    /// Service class UUIDs advertised by the device (SDP cache), if known.
    pub service_ids: Option<Vec<Uuid>>,
}

impl DeviceDescriptor {
    /// Display label for logs: the name if present, otherwise the address.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    /// Pick the service to open a secure channel against.
    ///
    /// SPP wins if advertised, then the first advertised service, then SPP
    /// unconditionally.
    pub fn resolve_service_id(&self) -> Uuid {
        match self.service_ids.as_deref() {
            Some(ids) if ids.contains(&SPP_UUID) => SPP_UUID,
            Some([first, ..]) => *first,
            _ => SPP_UUID,
        }
    }
}

/// Character-encoding profile handed to the payload formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharsetEncoding {
    /// Encoding label understood by the formatter (WHATWG label).
    pub name: String,
    /// ESC/POS character code table number (`ESC t n`).
    pub code_page: u8,
}

impl CharsetEncoding {
    pub fn new(name: impl Into<String>, code_page: u8) -> Self {
        Self {
            name: name.into(),
            code_page,
        }
    }
}

impl Default for CharsetEncoding {
    /// Code table 16 (WPC1252), the table most receipt printers ship with.
    fn default() -> Self {
        Self::new("windows-1252", 16)
    }
}

/// How an RFCOMM channel is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectStrategy {
    /// Secure channel resolved through the device's SDP service record.
    Secure,
    /// Channel bound directly to a fixed RFCOMM channel number, skipping the
    /// service-record lookup. Some printer firmware only accepts this.
    RawChannel,
}

impl std::fmt::Display for ConnectStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secure => f.write_str("secure"),
            Self::RawChannel => f.write_str("raw-channel"),
        }
    }
}

/// Observable milestones of a print job, in the only order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    Connecting,
    Connected,
    Printing,
    Printed,
}

/// Terminal result of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobOutcome {
    Success,
    NoPrinter,
    PrinterDisconnected,
    ParserError,
    EncodingError,
    BarcodeError,
}

impl JobOutcome {
    /// Map an error raised inside a job to the outcome reported for it.
    pub fn from_error(err: &ThermlinkError) -> Self {
        match err {
            ThermlinkError::NoSession => Self::NoPrinter,
            ThermlinkError::Parser(_) => Self::ParserError,
            ThermlinkError::Encoding(_) => Self::EncodingError,
            ThermlinkError::Barcode(_) => Self::BarcodeError,
            _ => Self::PrinterDisconnected,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Caller misuse (no device, no session). Reported immediately.
    Configuration,
    /// Channel open/write failures and interrupted waits. Retried while
    /// connecting.
    Transport,
    /// Bad markup, charset or barcode. Retrying reproduces the failure.
    Content,
}

/// Summary of a finished print job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub id: JobId,
    pub outcome: JobOutcome,
    /// Payloads fully written before the job ended.
    pub payloads_sent: usize,
    /// Index of the payload that failed, if the failure happened while
    /// printing.
    pub failed_payload: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
