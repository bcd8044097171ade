#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map a function over independent work items on the rayon pool and
//! collect the results once every item has finished.
//!
//! Workers never share mutable state: each item is moved into its worker
//! and each result is moved back out. The only synchronization is the
//! barrier at the end of [`in_parallel`].

pub mod progress;

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;

use crate::progress::ProgressCallback;

/// Runs `work` over every item in parallel and returns the results in input
/// order.
///
/// `progress` receives the item count up front and one increment per
/// completed item. Blocks until all items are done.
pub fn in_parallel<T, R, F>(items: Vec<T>, work: F, progress: &Arc<dyn ProgressCallback>) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    progress.set_total(items.len() as u64);

    let results: Vec<R> = items
        .into_par_iter()
        .map(|item| {
            let result = work(item);
            progress.inc(1);
            result
        })
        .collect();

    log::debug!("Parallel wave of {} items complete", results.len());
    results
}

/// Splits `0..len` into consecutive ranges of at most `batch_size`.
///
/// A zero `batch_size` is treated as "one batch". Returns no ranges for an
/// empty input.
#[must_use]
pub fn batch_ranges(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    if batch_size == 0 || len <= batch_size {
        return vec![0..len];
    }

    (0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect()
}
