use std::time::Duration;

use crate::lattice::Lattice;
use crate::lock_grid::LockGrid;
use crate::metropolis::{attempt_flip, Acceptance};
use crate::observer::Observer;
use crate::rng::WorkerRng;

pub mod data_parallel;
pub mod task_parallel;

/// (row, col) と上下左右の 5 ロックを `timeout` 以内に取れたら更新する。
/// 取れなければ None。Some(true) は反転した場合。
#[inline]
#[allow(clippy::too_many_arguments)]
pub(crate) fn locked_flip<P: Observer>(
    lattice: &Lattice,
    locks: &LockGrid,
    acceptance: &Acceptance,
    row: usize,
    col: usize,
    timeout: Duration,
    rng: &mut WorkerRng,
    observer: &P,
    worker: usize,
) -> Option<bool> {
    let guard = locks.lock_within(lattice, row, col, timeout)?;
    let footprint = guard.footprint();
    observer.locked(worker, footprint.as_slice());

    let flipped = attempt_flip(lattice, acceptance, row, col, rng);

    observer.unlocking(worker, footprint.as_slice());
    drop(guard);
    Some(flipped)
}
