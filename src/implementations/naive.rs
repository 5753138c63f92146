use std::thread;

use crate::config::Params;
use crate::error::Result;
use crate::lattice::Lattice;
use crate::metropolis::{attempt_flip, Acceptance};
use crate::rng::WorkerRng;

use super::{join_workers, RunStats};

/*
  同期なしの並列版
  各ワーカーが格子全体から勝手にサイトを選んで更新する。
  同じセルや隣接セルを同時に触ると、古い近傍和で判定したり
  反転が失われたりする (意図的な競合)。
  セルはアトミックなのでメモリ破壊は起きず、値は常に ±1。
*/
pub fn naive_parallel(lattice: &Lattice, params: &Params) -> Result<RunStats> {
    let acceptance = Acceptance::new(params.temperature);
    let n = lattice.size();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..params.threads)
            .map(|worker| {
                let acceptance = &acceptance;
                scope.spawn(move || {
                    let mut rng = WorkerRng::new(params.seed, worker);
                    let mut stats = RunStats::default();
                    for _ in 0..params.steps_for(worker) {
                        let row = rng.index(n);
                        let col = rng.index(n);
                        stats.attempted += 1;
                        if attempt_flip(lattice, acceptance, row, col, &mut rng) {
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
