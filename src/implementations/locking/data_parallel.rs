use std::thread;

use tracing::debug;

use crate::config::Params;
use crate::error::Result;
use crate::implementations::partition::Strip;
use crate::implementations::{join_workers, RunStats};
use crate::lattice::Lattice;
use crate::lock_grid::LockGrid;
use crate::metropolis::{attempt_flip, Acceptance};
use crate::observer::Observer;
use crate::rng::WorkerRng;

use super::locked_flip;

/*
  データ並列版 (境界行のみロック)
  行を帯に分け、各ワーカーは自分の帯の中だけでサイトを選ぶ。
  内部行の近傍は自分しか触らないのでロック不要。
  境界行 (帯の最初と最後の行) だけは隣の帯と近傍を共有するので、
  5 ロックが取れるまで同じサイトで取り直す。
  ロックするのは「表面」だけで、「体積」はロックフリー。
*/
pub fn data_parallel<P: Observer>(
    lattice: &Lattice,
    params: &Params,
    observer: &P,
) -> Result<RunStats> {
    let locks = LockGrid::new(lattice.size())?;
    let acceptance = Acceptance::new(params.temperature);
    let n = lattice.size();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..params.threads)
            .map(|worker| {
                let (locks, acceptance) = (&locks, &acceptance);
                let strip = Strip::for_worker(worker, params.threads, n);
                debug!(
                    worker,
                    first_row = strip.first_row,
                    rows = strip.rows,
                    surface_ratio = strip.surface_ratio(),
                    "帯を割り当て"
                );
                scope.spawn(move || {
                    let mut rng = WorkerRng::new(params.seed, worker);
                    let mut stats = RunStats::default();
                    for _ in 0..params.steps_for(worker) {
                        let row = strip.sample_row(&mut rng);
                        let col = rng.index(n);
                        stats.attempted += 1;

                        if !strip.is_boundary(row) {
                            observer.unguarded(worker, row, col);
                            if attempt_flip(lattice, acceptance, row, col, &mut rng) {
                                stats.accepted += 1;
                            }
                            continue;
                        }

                        // 境界行: 成功するまで取り直す
                        let flipped = loop {
                            match locked_flip(
                                lattice,
                                locks,
                                acceptance,
                                row,
                                col,
                                params.lock_timeout,
                                &mut rng,
                                observer,
                                worker,
                            ) {
                                Some(flipped) => break flipped,
                                None => stats.lock_timeouts += 1,
                            }
                        };
                        if flipped {
                            stats.accepted += 1;
                        }
                    }
                    stats
                })
            })
            .collect();
        join_workers(handles)
    })
}
