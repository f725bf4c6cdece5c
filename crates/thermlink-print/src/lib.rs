// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thermlink Print: robust RFCOMM connection setup, printer classification
// and asynchronous print-job orchestration.  This crate sits between the
// domain types in `thermlink-core` and the platform radio in
// `thermlink-bridge`.

pub mod classifier;
pub mod connector;
pub mod formatter;
pub mod orchestrator;
pub mod origin;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{DiscoveredPrinter, PrinterClassifier};
pub use connector::{RobustConnector, SharedConnector};
pub use formatter::{FormatError, MarkupFormatter, PlainTextFormatter};
pub use orchestrator::{JobHandle, JobOptions, PrintListener, PrintOrchestrator};
pub use origin::{OriginContext, OriginLoop, OriginQueue};
pub use retry::ConnectOptions;
pub use session::{SessionLink, TransportSession};
