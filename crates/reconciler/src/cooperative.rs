//! Cooperative yield points for long traversals
//!
//! Hydration and diff walk trees that can hold thousands of nodes. Every
//! `interval` processed nodes they hand control to a host hook, which can
//! service its own run loop or cancel the traversal.

use crate::error::{ReconcileError, Result};
use std::ops::ControlFlow;

/// Default number of nodes processed between yields
pub const DEFAULT_YIELD_INTERVAL: usize = 1000;

type YieldHook<'a> = Box<dyn FnMut(usize) -> ControlFlow<()> + 'a>;

/// Counts processed nodes and calls the host hook at a fixed interval
pub struct YieldBudget<'a> {
    interval: usize,
    processed: usize,
    hook: Option<YieldHook<'a>>,
}

impl<'a> YieldBudget<'a> {
    /// Budget with no hook; traversals never pause
    pub fn new(interval: usize) -> Self {
        Self {
            interval,
            processed: 0,
            hook: None,
        }
    }

    /// Budget that calls `hook(processed)` every `interval` nodes
    ///
    /// Returning `ControlFlow::Break` cancels the traversal.
    pub fn with_hook(
        interval: usize,
        hook: impl FnMut(usize) -> ControlFlow<()> + 'a,
    ) -> Self {
        Self {
            interval,
            processed: 0,
            hook: Some(Box::new(hook)),
        }
    }

    /// Record one processed node
    pub fn tick(&mut self) -> Result<()> {
        self.processed += 1;

        if self.interval == 0 || self.processed % self.interval != 0 {
            return Ok(());
        }

        if let Some(hook) = self.hook.as_mut() {
            if hook(self.processed).is_break() {
                return Err(ReconcileError::Cancelled {
                    processed: self.processed,
                });
            }
        }
        Ok(())
    }

    /// Nodes processed so far
    pub fn processed(&self) -> usize {
        self.processed
    }
}

impl Default for YieldBudget<'_> {
    fn default() -> Self {
        Self::new(DEFAULT_YIELD_INTERVAL)
    }
}
