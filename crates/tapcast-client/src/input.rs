//! Input injection capability seam.
//!
//! On a real host this wraps the platform gesture-injection service; the
//! session only ever hands it absolute screen coordinates derived from
//! normalized TOUCH commands.

use tracing::info;

use tapcast_common::Result;

/// Host-side tap synthesis.
pub trait InputInjector: Send {
    /// Resolution of the screen taps are injected into.
    fn screen_size(&self) -> (u32, u32);

    /// Synthesize a tap at absolute screen coordinates.
    fn tap(&mut self, x: f64, y: f64) -> Result<()>;
}

/// Injector that only logs, for demo runs and platforms without an
/// injection service.
pub struct LoggingInjector {
    width: u32,
    height: u32,
}

impl LoggingInjector {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl InputInjector for LoggingInjector {
    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn tap(&mut self, x: f64, y: f64) -> Result<()> {
        info!("synthesizing tap at ({:.0}, {:.0})", x, y);
        Ok(())
    }
}
