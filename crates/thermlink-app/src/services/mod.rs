// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: wires the radio, classifier and orchestrator together for
// the command line.

pub mod app_services;
pub mod console;
pub mod data_dir;
