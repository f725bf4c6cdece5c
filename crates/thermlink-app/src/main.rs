// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thermlink: print receipts to a paired Bluetooth thermal printer.
//
// Entry point. Initialises logging and backend services, then either lists
// the paired printers (`--list`) or prints the given text files as one job.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use thermlink_core::human_errors::humanize_error;

use services::app_services::AppServices;

const USAGE: &str = "usage: thermlink --list | thermlink <receipt.txt>...";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    }

    tracing::info!("Thermlink starting");

    let svc = match AppServices::init() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "could not start services");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(path = %svc.data_dir().display(), config = ?svc.config(), "services ready");

    if args.iter().any(|a| a == "--list") {
        let printers = svc.list_printers();
        if printers.is_empty() {
            eprintln!("No paired printers.");
        }
        for printer in printers {
            println!("{}\t{}", printer.descriptor.address, printer.descriptor.label());
        }
        return ExitCode::SUCCESS;
    }

    let files: Vec<PathBuf> = args.into_iter().map(PathBuf::from).collect();
    match svc.print_files(&files) {
        Ok(report) if report.outcome.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            tracing::warn!(
                outcome = ?report.outcome,
                sent = report.payloads_sent,
                failed_payload = ?report.failed_payload,
                "print job failed"
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, "print job not started");
            eprintln!("{} {}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}
