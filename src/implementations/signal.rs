use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::debug;

use crate::config::Params;
use crate::error::{try_alloc, Result};
use crate::lattice::Lattice;
use crate::metropolis::{attempt_flip, Acceptance};
use crate::observer::Observer;
use crate::rng::WorkerRng;

use super::partition::Strip;
use super::{join_workers, RunStats};

/// 「いまこのセルを誰かが更新中」フラグ。
/// 必ず外側の Mutex を取った状態で検査と設定を 1 単位として行う。
#[derive(Debug)]
pub struct FlagGrid {
    in_use: Vec<bool>,
}

impl FlagGrid {
    pub fn new(size: usize) -> Result<Self> {
        let cells = size * size;
        let mut in_use = try_alloc("flag grid", cells)?;
        in_use.resize(cells, false);
        Ok(FlagGrid { in_use })
    }

    /// 帯は行方向に並ぶので、縦に隣接するセル (row±1) だけ見ればよい
    pub fn vertical_clear(&self, lattice: &Lattice, row: usize, col: usize) -> bool {
        let [up, down, _, _] = lattice.neighbors(row, col);
        !self.in_use[up] && !self.in_use[down]
    }

    fn set(&mut self, cell: usize, value: bool) {
        self.in_use[cell] = value;
    }
}

fn lock_flags(flags: &Mutex<FlagGrid>) -> MutexGuard<'_, FlagGrid> {
    flags.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 立てたフラグ。drop で (パニックで巻き戻るときも) 下ろす
struct Claim<'a, P: Observer> {
    flags: &'a Mutex<FlagGrid>,
    observer: &'a P,
    worker: usize,
    cell: usize,
}

impl<'a, P: Observer> Claim<'a, P> {
    /// 上下が空いていればフラグを立てる。検査と設定は 1 つのクリティカルセクション
    fn try_new(
        flags: &'a Mutex<FlagGrid>,
        observer: &'a P,
        worker: usize,
        lattice: &Lattice,
        row: usize,
        col: usize,
    ) -> Option<Self> {
        let cell = lattice.index(row, col);
        let mut grid = lock_flags(flags);
        if !grid.vertical_clear(lattice, row, col) {
            return None;
        }
        grid.set(cell, true);
        observer.flag_claimed(worker, cell);
        Some(Claim {
            flags,
            observer,
            worker,
            cell,
        })
    }
}

impl<P: Observer> Drop for Claim<'_, P> {
    fn drop(&mut self) {
        let mut grid = lock_flags(self.flags);
        self.observer.flag_releasing(self.worker, self.cell);
        grid.set(self.cell, false);
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    waiting: usize,
    generation: u64,
}

/// 中断できるバリア。
/// std の `Barrier` はワーカーが 1 人欠けると残りが永久に待つので、
/// パニックしたワーカーが `abort` で全員を起こせるようにしてある。
#[derive(Debug)]
struct AbortableBarrier {
    threads: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
    aborted: AtomicBool,
}

impl AbortableBarrier {
    fn new(threads: usize) -> Self {
        AbortableBarrier {
            threads,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
            aborted: AtomicBool::new(false),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 全員がそろえば true。中断されたら false
    fn wait(&self) -> bool {
        let mut state = self.lock_state();
        if self.is_aborted() {
            return false;
        }
        let generation = state.generation;
        state.waiting += 1;
        if state.waiting == self.threads {
            state.waiting = 0;
            state.generation += 1;
            self.cvar.notify_all();
            return true;
        }
        while state.generation == generation && !self.is_aborted() {
            state = self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.generation != generation
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        // 待機中のワーカーが条件を確認してから眠るまでの間に通知が漏れないよう、
        // ロックを取ってから起こす
        let _state = self.lock_state();
        self.cvar.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

/// ワーカーがパニックで抜けるときにバリアを中断する
struct AbortOnPanic<'a>(&'a AbortableBarrier);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.abort();
        }
    }
}

/*
  シグナル方式 (境界行はロックの代わりにフラグ格子)
  帯分割はデータ並列版と同じ。境界行では短いクリティカルセクションの中で
  上下のフラグを確認し、空いていれば自分のセルのフラグを立てる。
  メトロポリス更新そのものはクリティカルセクションの外で行い、
  終わったらもう一度だけ入ってフラグを下ろす。
  隣が使用中なら候補を捨てて次の試行へ進む (同じサイトで待たない)。
  `barrier_interval` 回ごとに全ワーカーをバリアで揃える。
  どれかのワーカーがパニックしたらバリアを中断し、残りも打ち切る。
*/
pub fn signal_parallel<P: Observer>(
    lattice: &Lattice,
    params: &Params,
    observer: &P,
) -> Result<RunStats> {
    let flags = Mutex::new(FlagGrid::new(lattice.size())?);
    let barrier = AbortableBarrier::new(params.threads);
    let acceptance = Acceptance::new(params.temperature);
    let n = lattice.size();
    // 全ワーカーが必ず回る回数。バリアはこの範囲でだけ待つ
    let common_rounds = params.steps / params.threads;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..params.threads)
            .map(|worker| {
                let (flags, barrier, acceptance) = (&flags, &barrier, &acceptance);
                let strip = Strip::for_worker(worker, params.threads, n);
                debug!(
                    worker,
                    first_row = strip.first_row,
                    rows = strip.rows,
                    surface_ratio = strip.surface_ratio(),
                    "帯を割り当て"
                );
                scope.spawn(move || {
                    let _abort = AbortOnPanic(barrier);
                    let mut rng = WorkerRng::new(params.seed, worker);
                    let mut stats = RunStats::default();
                    for step in 0..params.steps_for(worker) {
                        if barrier.is_aborted() {
                            break;
                        }
                        let row = strip.sample_row(&mut rng);
                        let col = rng.index(n);
                        stats.attempted += 1;

                        if strip.is_boundary(row) {
                            match Claim::try_new(flags, observer, worker, lattice, row, col) {
                                Some(claim) => {
                                    if attempt_flip(lattice, acceptance, row, col, &mut rng) {
                                        stats.accepted += 1;
                                    }
                                    drop(claim);
                                }
                                None => stats.abandoned += 1,
                            }
                        } else {
                            observer.unguarded(worker, row, col);
                            if attempt_flip(lattice, acceptance, row, col, &mut rng) {
                                stats.accepted += 1;
                            }
                        }

                        if step < common_rounds
                            && (step + 1) % params.barrier_interval == 0
                            && !barrier.wait()
                        {
                            break;
                        }
                    }
                    stats
                })
            })
            .collect();
        join_workers(handles)
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::time::Duration;

    use super::*;
    use crate::observer::NoObserver;

    #[test]
    fn vertical_flags_block_neighbors_only() {
        let lattice = Lattice::filled(4, 1).unwrap();
        let mut grid = FlagGrid::new(4).unwrap();
        grid.set(lattice.index(1, 2), true);

        assert!(!grid.vertical_clear(&lattice, 0, 2));
        assert!(!grid.vertical_clear(&lattice, 2, 2));
        // 横隣は同じ帯の中なので見ない
        assert!(grid.vertical_clear(&lattice, 1, 3));
        assert!(grid.vertical_clear(&lattice, 0, 1));
        // 周期境界: 0 行目の上は 3 行目
        grid.set(lattice.index(3, 0), true);
        assert!(!grid.vertical_clear(&lattice, 0, 0));
    }

    #[test]
    fn claim_blocks_vertical_neighbor_until_dropped() {
        let lattice = Lattice::filled(4, 1).unwrap();
        let flags = Mutex::new(FlagGrid::new(4).unwrap());

        let claim = Claim::try_new(&flags, &NoObserver, 0, &lattice, 1, 2).unwrap();
        assert!(Claim::try_new(&flags, &NoObserver, 1, &lattice, 2, 2).is_none());
        drop(claim);
        assert!(Claim::try_new(&flags, &NoObserver, 1, &lattice, 2, 2).is_some());
    }

    #[test]
    fn claim_is_released_when_worker_panics() {
        let lattice = Lattice::filled(4, 1).unwrap();
        let flags = Mutex::new(FlagGrid::new(4).unwrap());

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _claim = Claim::try_new(&flags, &NoObserver, 0, &lattice, 1, 2).unwrap();
            panic!("update failed");
        }));
        assert!(result.is_err());
        assert!(
            !lock_flags(&flags).in_use[lattice.index(1, 2)],
            "flag stayed set after unwinding"
        );
    }

    #[test]
    fn barrier_releases_all_workers() {
        let barrier = AbortableBarrier::new(3);
        thread::scope(|scope| {
            let handles: Vec<_> = (0..3).map(|_| scope.spawn(|| barrier.wait())).collect();
            for handle in handles {
                assert!(handle.join().unwrap());
            }
        });
        assert!(!barrier.is_aborted());
    }

    #[test]
    fn abort_wakes_waiting_workers() {
        let barrier = AbortableBarrier::new(3);
        thread::scope(|scope| {
            let waiter = scope.spawn(|| barrier.wait());
            thread::sleep(Duration::from_millis(20));
            barrier.abort();
            assert!(!waiter.join().unwrap(), "aborted barrier reported success");
        });
        // 中断後は待たずに false
        assert!(!barrier.wait());
    }
}
