//! Alpha/beta score-window container carried by window-bounded nodes.
//!
//! Purely a bound holder mutated by the driver during an alpha-beta
//! traversal; no propagation logic lives here.

use crate::util::AtomicF64;

#[derive(Debug)]
pub struct WindowBounds {
    alpha: AtomicF64,
    beta: AtomicF64,
}

impl WindowBounds {
    pub(crate) fn new() -> Self {
        Self {
            alpha: AtomicF64::new(f64::NEG_INFINITY),
            beta: AtomicF64::new(f64::INFINITY),
        }
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha.load()
    }

    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta.load()
    }

    pub fn set_alpha(&self, value: f64) {
        self.alpha.store(value);
    }

    pub fn set_beta(&self, value: f64) {
        self.beta.store(value);
    }
}
