use std::fmt;
use std::ops::AddAssign;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::config::Params;
use crate::error::{Result, SimError};
use crate::lattice::Lattice;
use crate::observer::{NoObserver, Observer};

pub mod locking;
pub mod naive;
pub mod partition;
pub mod signal;
pub mod single;

/// 同じ格子に対する 5 通りの並列化方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum StrategyKind {
    /// 1 スレッド。比較の基準
    Serial,
    /// 同期なし。競合は起きるが値は ±1 のまま
    Naive,
    /// 毎回 5 ロック (時間切れで諦める)
    TaskLocking,
    /// 行の帯に分割し、境界行だけロック
    DataPartitionLocking,
    /// 行の帯に分割し、境界行はフラグ格子で回避
    DataPartitionSignaling,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Serial,
        StrategyKind::Naive,
        StrategyKind::TaskLocking,
        StrategyKind::DataPartitionLocking,
        StrategyKind::DataPartitionSignaling,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Serial => "Serial",
            StrategyKind::Naive => "Naive Parallel",
            StrategyKind::TaskLocking => "Task Parallel (locks)",
            StrategyKind::DataPartitionLocking => "Data Parallel (boundary locks)",
            StrategyKind::DataPartitionSignaling => "Data Parallel (signal flags)",
        }
    }

    /// 行の帯に分割する方式か (threads <= size が必要)
    pub fn is_strip_based(self) -> bool {
        matches!(
            self,
            StrategyKind::DataPartitionLocking | StrategyKind::DataPartitionSignaling
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 1 回の実行の集計
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// メトロポリス判定まで進んだ、または時間切れ・衝突で捨てた試行の数
    pub attempted: usize,
    pub accepted: usize,
    /// 5 ロックの取得が時間内に終わらなかった回数
    pub lock_timeouts: usize,
    /// シグナル方式で隣接フラグに阻まれて捨てた候補の数
    pub abandoned: usize,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, other: RunStats) {
        self.attempted += other.attempted;
        self.accepted += other.accepted;
        self.lock_timeouts += other.lock_timeouts;
        self.abandoned += other.abandoned;
        self.elapsed = self.elapsed.max(other.elapsed);
    }
}

/// 既定のチューニング値で戦略を実行し、格子をその場で更新する
pub fn run_strategy(
    kind: StrategyKind,
    lattice: &Lattice,
    temperature: f64,
    steps: usize,
    threads: usize,
) -> Result<RunStats> {
    run_with(kind, lattice, &Params::new(temperature, steps, threads), &NoObserver)
}

/// パラメータはすべてスレッド起動前に検証する
pub fn run_with<P: Observer>(
    kind: StrategyKind,
    lattice: &Lattice,
    params: &Params,
    observer: &P,
) -> Result<RunStats> {
    params.validate()?;
    if kind.is_strip_based() && params.threads > lattice.size() {
        return Err(SimError::invalid(
            "threads",
            format!(
                "{kind} needs at most one worker per row ({} threads, {} rows)",
                params.threads,
                lattice.size()
            ),
        ));
    }
    if let Ok(cores) = thread::available_parallelism() {
        if params.threads > cores.get() && kind != StrategyKind::Serial {
            warn!(
                threads = params.threads,
                cores = cores.get(),
                "スレッド数がコア数を超えています"
            );
        }
    }

    debug!(
        strategy = %kind,
        size = lattice.size(),
        steps = params.steps,
        threads = params.threads,
        "開始"
    );
    let start = Instant::now();
    let mut stats = match kind {
        StrategyKind::Serial => single::serial(lattice, params),
        StrategyKind::Naive => naive::naive_parallel(lattice, params)?,
        StrategyKind::TaskLocking => {
            locking::task_parallel::task_parallel(lattice, params, observer)?
        }
        StrategyKind::DataPartitionLocking => {
            locking::data_parallel::data_parallel(lattice, params, observer)?
        }
        StrategyKind::DataPartitionSignaling => signal::signal_parallel(lattice, params, observer)?,
    };
    stats.elapsed = start.elapsed();
    debug!(
        strategy = %kind,
        accepted = stats.accepted,
        timeouts = stats.lock_timeouts,
        abandoned = stats.abandoned,
        elapsed = ?stats.elapsed,
        "終了"
    );
    Ok(stats)
}

/// すべてのワーカーを join して集計する。
/// パニックしたワーカーがいても残りは必ず join する。
pub(crate) fn join_workers(handles: Vec<ScopedJoinHandle<'_, RunStats>>) -> Result<RunStats> {
    let mut total = RunStats::default();
    let mut failed = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(stats) => {
                trace!(worker, accepted = stats.accepted, "ワーカー終了");
                total += stats;
            }
            Err(_) => {
                failed.get_or_insert(worker);
            }
        }
    }
    match failed {
        Some(worker) => Err(SimError::WorkerPanicked { worker }),
        None => Ok(total),
    }
}
