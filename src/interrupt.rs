// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Cooperative cancellation.
//!
//! Long-running fetches check an [`Interrupt`] between records. Tripping it
//! never aborts a request in flight; the current record is finished and
//! everything collected so far is kept.

use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shareable flag that asks a running fetch to stop early.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    tripped: Arc<AtomicBool>,
}

impl Interrupt {
    /// Creates a new, untripped interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an interrupt that trips when the user presses Ctrl-C.
    ///
    /// Must be called from within a Tokio runtime. Once installed, Ctrl-C
    /// no longer kills the process outright.
    pub fn on_ctrl_c() -> Self {
        let interrupt = Self::new();
        let handle = interrupt.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    debug!("received Ctrl-C");
                    handle.trip();
                }
                Err(err) => warn!("could not listen for Ctrl-C: {err}"),
            }
        });
        interrupt
    }

    /// Asks the fetch to stop after the record currently in flight.
    pub fn trip(&self) {
        self.tripped.store(true, Ordering::SeqCst);
    }

    /// True once the interrupt has been tripped.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}
