// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for shop staff at the till.
//
// Every technical error and job outcome is mapped to plain English with a
// clear suggestion. The severity drives how the host UI presents it.

use crate::error::ThermlinkError;
use crate::types::JobOutcome;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Radio blip or timeout. Trying again usually works.
    Transient,
    /// User must do something (pair the printer, switch it on).
    ActionRequired,
    /// The receipt content itself is wrong; retrying reproduces it.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying again without changes can help.
    pub retriable: bool,
    pub severity: Severity,
}

/// Short message delivered to `on_error` for a failed job.
pub fn outcome_message(outcome: JobOutcome) -> &'static str {
    match outcome {
        JobOutcome::Success => "Receipt printed.",
        JobOutcome::NoPrinter => "No printer found.",
        JobOutcome::PrinterDisconnected => "The printer is disconnected.",
        JobOutcome::ParserError => "The receipt text is not formatted correctly.",
        JobOutcome::EncodingError => "The printer does not support this character set.",
        JobOutcome::BarcodeError => "The barcode on this receipt is invalid.",
    }
}

/// Convert a `ThermlinkError` into a `HumanError` a cashier can act on.
pub fn humanize_error(err: &ThermlinkError) -> HumanError {
    match err {
        ThermlinkError::NoDevice | ThermlinkError::NoSession => HumanError {
            message: "No printer selected.".into(),
            suggestion: "Pair the receipt printer in the Bluetooth settings, then choose it and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ThermlinkError::Config(detail) => HumanError {
            message: "The printer settings are invalid.".into(),
            suggestion: format!("Check the settings file and correct it. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ThermlinkError::Connection(detail) => humanize_connection_error(detail),

        ThermlinkError::Write(_) | ThermlinkError::NotConnected => HumanError {
            message: "The connection to the printer was lost.".into(),
            suggestion: "Keep the device close to the printer and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ThermlinkError::Timeout(_) => HumanError {
            message: "The printer didn't respond in time.".into(),
            suggestion: "The printer might be busy or asleep. Press its feed button to wake it, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ThermlinkError::Interrupted => HumanError {
            message: "Printing was stopped.".into(),
            suggestion: "Start the print again when you're ready.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ThermlinkError::Io(_) => HumanError {
            message: "There was a problem talking to the printer.".into(),
            suggestion: "Try again. If this keeps happening, turn the printer off and on again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ThermlinkError::Parser(_) => HumanError {
            message: outcome_message(JobOutcome::ParserError).into(),
            suggestion: "Check the receipt template for unbalanced or unknown tags.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ThermlinkError::Encoding(_) => HumanError {
            message: outcome_message(JobOutcome::EncodingError).into(),
            suggestion: "Choose a character set the printer supports in the settings.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ThermlinkError::Barcode(_) => HumanError {
            message: outcome_message(JobOutcome::BarcodeError).into(),
            suggestion: "Check the barcode digits and length for the selected barcode type.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ThermlinkError::Bridge(_) => HumanError {
            message: "A Bluetooth feature didn't work.".into(),
            suggestion: "Make sure Bluetooth is switched on and the app has permission to use it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ThermlinkError::PlatformUnavailable => HumanError {
            message: "Bluetooth printing isn't available on this device.".into(),
            suggestion: "Use a phone or tablet with Bluetooth to print receipts.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ThermlinkError::Serialization(_) => HumanError {
            message: "The app had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

/// Parse connection failure details into human-readable messages.
fn humanize_connection_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") {
        HumanError {
            message: "The printer didn't answer.".into(),
            suggestion: "Check the printer is switched on and within a few metres, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("read failed") || lower.contains("socket might closed") {
        HumanError {
            message: "The printer closed the connection.".into(),
            suggestion: "It may be connected to another device. Disconnect it there and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("permission") {
        HumanError {
            message: "The app isn't allowed to use Bluetooth.".into(),
            suggestion: "Grant the Bluetooth permission in the system settings, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        }
    } else {
        HumanError {
            message: "We couldn't connect to the printer.".into(),
            suggestion: format!("Turn the printer off and on again, then retry. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
