//! Splits the rows of a frame between the workers.  The split is made
//! once, at startup, and never changes.

use std::ops::Range;

use crate::error::{Error, Result};

/// Divide `[0, height)` into `workers` contiguous, disjoint row ranges
/// of `height / workers` rows each.  Rows left over by the division
/// go to the last worker.
pub fn partition_rows(height: usize, workers: usize) -> Result<Vec<Range<usize>>> {
    if workers == 0 {
        return Err(Error::Config("at least one worker is required".to_string()));
    }
    if workers > height {
        return Err(Error::Config(format!(
            "{} workers cannot share {} rows",
            workers, height
        )));
    }
    let rows = height / workers;
    Ok((0..workers)
        .map(|i| {
            let start = i * rows;
            let end = if i + 1 == workers { height } else { start + rows };
            start..end
        })
        .collect())
}
