//! Engine configuration.  Everything here is fixed for the lifetime of
//! an engine; only the view bounds change between rounds.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Largest width or height the TGA header can describe.
pub const MAX_DIMENSION: usize = 0xffff;

/// The parameters an engine is built with.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Frame width in pixels.
    pub width: usize,
    /// Frame height in pixels.
    pub height: usize,
    /// Number of compute workers.  Each gets a fixed band of rows, so
    /// there can be no more workers than rows.
    pub workers: usize,
    /// Iteration cap of the escape-time kernel.
    pub max_iterations: u32,
    /// Where every finished frame is published.
    pub output: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            width: 640,
            height: 480,
            workers: 16,
            max_iterations: 1000,
            output: PathBuf::from("output.tga"),
        }
    }
}

impl EngineConfig {
    /// Check the configuration before anything is allocated or spawned.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "frame must have pixels, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(Error::Config(format!(
                "frame {}x{} is larger than {} pixels on a side",
                self.width, self.height, MAX_DIMENSION
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".to_string()));
        }
        if self.workers > self.height {
            return Err(Error::Config(format!(
                "{} workers cannot share {} rows",
                self.workers, self.height
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("iteration cap must be positive".to_string()));
        }
        if self.output.file_name().is_none() {
            return Err(Error::Config(format!(
                "output '{}' does not name a file",
                self.output.display()
            )));
        }
        Ok(())
    }
}
