use std::thread;

use crate::config::Params;
use crate::error::Result;
use crate::implementations::{join_workers, RunStats};
use crate::lattice::Lattice;
use crate::lock_grid::LockGrid;
use crate::metropolis::Acceptance;
use crate::observer::Observer;
use crate::rng::WorkerRng;

use super::locked_flip;

/*
  タスク並列版 (細粒度ロック)
  毎回、対象セルと 4 近傍の計 5 ロックを try_lock で取りにいく。
  ブロックしないのでデッドロックの環はできない。
  時間切れならその試行は捨て、次の試行で別のサイトを選び直す。
  成功した更新同士は触るセルが重ならないので完全に直列化される。
*/
pub fn task_parallel<P: Observer>(
    lattice: &Lattice,
    params: &Params,
    observer: &P,
) -> Result<RunStats> {
    // ロック格子は実行ごとに作り、終わったら捨てる
    let locks = LockGrid::new(lattice.size())?;
    let acceptance = Acceptance::new(params.temperature);
    let n = lattice.size();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..params.threads)
            .map(|worker| {
                let (locks, acceptance) = (&locks, &acceptance);
                scope.spawn(move || {
                    let mut rng = WorkerRng::new(params.seed, worker);
                    let mut stats = RunStats::default();
                    for _ in 0..params.steps_for(worker) {
                        let row = rng.index(n);
                        let col = rng.index(n);
                        stats.attempted += 1;
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
                            Some(true) => stats.accepted += 1,
                            Some(false) => {}
                            None => stats.lock_timeouts += 1,
                        }
                    }
                    stats
                })
            })
            .collect();
        join_workers(handles)
    })
}
