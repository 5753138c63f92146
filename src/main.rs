use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ising_rust::config::{
    BARRIER_INTERVAL, DEFAULT_SIZE, DEFAULT_STEPS, DEFAULT_TEMPERATURE, LOCK_TIMEOUT, THREAD_SWEEP,
};
use ising_rust::observer::NoObserver;
use ising_rust::{run_with, Lattice, Params, Result, RunStats, SeedSource, StrategyKind};

/// 2D イジング模型 並列化ベンチマーク
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 格子の一辺 L
    #[arg(long, env = "ISING_SIZE", default_value_t = DEFAULT_SIZE)]
    size: usize,

    /// 温度 T (> 0)
    #[arg(long, env = "ISING_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f64,

    /// モンテカルロ試行回数
    #[arg(long, env = "ISING_STEPS", default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// 測定するスレッド数 (カンマ区切り)
    #[arg(
        long,
        env = "ISING_THREADS",
        value_delimiter = ',',
        default_values_t = THREAD_SWEEP
    )]
    threads: Vec<usize>,

    /// 実行する方式。省略時はすべて
    #[arg(long, env = "ISING_STRATEGY", value_enum, value_delimiter = ',')]
    strategy: Vec<StrategyKind>,

    /// 固定シード。省略時は時刻から
    #[arg(long, env = "ISING_SEED")]
    seed: Option<u64>,

    /// 5 ロック取得のタイムアウト (ナノ秒)
    #[arg(long, default_value_t = LOCK_TIMEOUT.as_nanos() as u64)]
    lock_timeout_ns: u64,

    /// シグナル方式のバリア間隔
    #[arg(long, default_value_t = BARRIER_INTERVAL)]
    barrier_interval: usize,

    /// 測定回数
    #[arg(long, default_value_t = 5)]
    repeat: usize,

    /// ウォームアップ回数
    #[arg(long, default_value_t = 1)]
    warmup: usize,

    /// 各方式の最後の格子を表示
    #[arg(long)]
    print_lattice: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("エラー: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let max_threads = cli.threads.iter().copied().max().unwrap_or(1);
    // 格子の初期化と集計は rayon で行う
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads.max(1))
        .build_global()
    {
        warn!(%err, "rayon のスレッドプールは既定のまま");
    }

    let seed = cli.seed.map(SeedSource::Fixed).unwrap_or(SeedSource::Clock);
    let base = Params::new(cli.temperature, cli.steps, 1)
        .with_seed(seed)
        .with_lock_timeout(Duration::from_nanos(cli.lock_timeout_ns))
        .with_barrier_interval(cli.barrier_interval);
    base.validate()?;

    let strategies: Vec<StrategyKind> = if cli.strategy.is_empty() {
        StrategyKind::ALL.to_vec()
    } else {
        cli.strategy.clone()
    };

    println!("=== 2D イジング模型 メトロポリス法ベンチマーク ===");
    println!(
        "L: {}, T: {}, STEPS: {}, 測定回数: {}\n",
        cli.size, cli.temperature, cli.steps, cli.repeat
    );

    let mut lattice = Lattice::new(cli.size, seed)?;
    let mut serial_median = None;

    for kind in strategies {
        // シリアル版はスレッド数によらないので 1 回だけ
        let sweep: Vec<usize> = if kind == StrategyKind::Serial {
            vec![1]
        } else {
            cli.threads.clone()
        };

        for &threads in &sweep {
            let params = Params { threads, ..base };
            let median = run_benchmark(cli, kind, &params, &mut lattice)?;
            if kind == StrategyKind::Serial {
                serial_median = Some(median);
            } else if let Some(serial) = serial_median {
                println!("  速度向上: {:.2}x", serial.as_secs_f64() / median.as_secs_f64());
            }
            println!();
        }

        if cli.print_lattice {
            println!("{lattice}");
        }
    }

    println!("=== ベンチマーク完了 ===");
    Ok(())
}

fn run_benchmark(
    cli: &Cli,
    kind: StrategyKind,
    params: &Params,
    lattice: &mut Lattice,
) -> Result<Duration> {
    println!("{} ({} スレッド):", kind, params.threads);

    // ウォームアップ
    for _ in 0..cli.warmup {
        lattice.randomize(params.seed);
        run_with(kind, lattice, params, &NoObserver)?;
    }

    // 本番計測。毎回ランダムな格子から始める
    let mut times = Vec::with_capacity(cli.repeat.max(1));
    let mut last = RunStats::default();
    for i in 0..cli.repeat.max(1) {
        lattice.randomize(params.seed);
        last = run_with(kind, lattice, params, &NoObserver)?;
        times.push(last.elapsed);
        println!("  試行 {:2}: {:?}", i + 1, last.elapsed);
    }

    // 統計計算
    times.sort();
    let count = times.len();
    let median = times[count / 2];
    let avg = times.iter().sum::<Duration>() / count as u32;

    println!("  ---");
    println!("  最小値:   {:?}", times[0]);
    println!("  中央値:   {:?}", median);
    println!("  平均値:   {:?}", avg);
    println!("  最大値:   {:?}", times[count - 1]);
    println!(
        "  受理率: {:.3}, タイムアウト: {}, 衝突: {}, |m|: {:.3}",
        last.acceptance_rate(),
        last.lock_timeouts,
        last.abandoned,
        lattice.mean_spin().abs()
    );
    info!(
        strategy = %kind,
        threads = params.threads,
        median_us = median.as_micros() as u64,
        energy = lattice.energy(),
        "計測完了"
    );
    Ok(median)
}
