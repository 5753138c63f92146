use crate::config::Params;
use crate::lattice::Lattice;
use crate::metropolis::{attempt_flip, Acceptance};
use crate::rng::WorkerRng;

use super::RunStats;

// シリアル版: 比較対象。固定シードなら反転の列は完全に再現できる
pub fn serial(lattice: &Lattice, params: &Params) -> RunStats {
    let acceptance = Acceptance::new(params.temperature);
    let mut rng = WorkerRng::new(params.seed, 0);
    let n = lattice.size();
    let mut stats = RunStats::default();

    for _ in 0..params.steps {
        let row = rng.index(n);
        let col = rng.index(n);
        stats.attempted += 1;
        if attempt_flip(lattice, &acceptance, row, col, &mut rng) {
            stats.accepted += 1;
        }
    }
    stats
}
