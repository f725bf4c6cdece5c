// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Progress printer for the command line.

use std::sync::atomic::{AtomicBool, Ordering};

use thermlink_print::PrintListener;

/// Prints job progress to stdout.
#[derive(Default)]
pub struct ConsoleListener {
    done: AtomicBool,
}

impl ConsoleListener {
    /// Whether the terminal callback has run.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl PrintListener for ConsoleListener {
    fn on_connecting(&self) {
        println!("Connecting to printer...");
    }

    fn on_connected(&self) {
        println!("Connected.");
    }

    fn on_printing(&self) {
        println!("Printing...");
    }

    fn on_printed(&self) {
        println!("Printed.");
    }

    fn on_success(&self) {
        println!("Done.");
        self.done.store(true, Ordering::SeqCst);
    }

    fn on_error(&self, message: &str) {
        eprintln!("{message}");
        self.done.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_callbacks_mark_done() {
        let ok = ConsoleListener::default();
        ok.on_connecting();
        assert!(!ok.is_done());
        ok.on_success();
        assert!(ok.is_done());

        let failed = ConsoleListener::default();
        failed.on_error("No printer found.");
        assert!(failed.is_done());
    }
}
