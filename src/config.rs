use std::time::Duration;

use crate::error::{Result, SimError};
use crate::rng::SeedSource;

pub const DEFAULT_SIZE: usize = 128; // 格子の一辺 L
pub const DEFAULT_TEMPERATURE: f64 = 2.0; // 臨界温度は約 2.27
pub const DEFAULT_STEPS: usize = 8_000_000; // モンテカルロ試行回数
pub const THREAD_SWEEP: [usize; 4] = [1, 2, 4, 8];
pub const LOCK_TIMEOUT: Duration = Duration::from_micros(1); // 5ロック取得の猶予
pub const BARRIER_INTERVAL: usize = 10; // シグナル方式の同期間隔

/// 1回の戦略実行に渡すパラメータ
#[derive(Clone, Copy, Debug)]
pub struct Params {
    pub temperature: f64,
    pub steps: usize,
    pub threads: usize,
    pub seed: SeedSource,
    pub lock_timeout: Duration,
    pub barrier_interval: usize,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            temperature: DEFAULT_TEMPERATURE,
            steps: DEFAULT_STEPS,
            threads: 1,
            seed: SeedSource::Clock,
            lock_timeout: LOCK_TIMEOUT,
            barrier_interval: BARRIER_INTERVAL,
        }
    }
}

impl Params {
    pub fn new(temperature: f64, steps: usize, threads: usize) -> Self {
        Params {
            temperature,
            steps,
            threads,
            ..Params::default()
        }
    }

    pub fn with_seed(mut self, seed: SeedSource) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_barrier_interval(mut self, interval: usize) -> Self {
        self.barrier_interval = interval;
        self
    }

    /// スレッドを起動する前に呼ぶ
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(SimError::invalid(
                "temperature",
                format!("must be a positive finite number, got {}", self.temperature),
            ));
        }
        if self.steps == 0 {
            return Err(SimError::invalid("steps", "must be at least 1"));
        }
        if self.threads == 0 {
            return Err(SimError::invalid("threads", "must be at least 1"));
        }
        if self.barrier_interval == 0 {
            return Err(SimError::invalid("barrier_interval", "must be at least 1"));
        }
        Ok(())
    }

    /// ワーカー `worker` の担当試行回数。余りは先頭のワーカーから1つずつ配る
    pub fn steps_for(&self, worker: usize) -> usize {
        let base = self.steps / self.threads;
        if worker < self.steps % self.threads {
            base + 1
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_shares_add_up() {
        let params = Params::new(2.0, 1003, 4);
        let total: usize = (0..4).map(|w| params.steps_for(w)).sum();
        assert_eq!(total, 1003);
        assert_eq!(params.steps_for(0), 251);
        assert_eq!(params.steps_for(3), 250);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(Params::new(0.0, 10, 1).validate().is_err());
        assert!(Params::new(-1.0, 10, 1).validate().is_err());
        assert!(Params::new(f64::NAN, 10, 1).validate().is_err());
        assert!(Params::new(2.0, 0, 1).validate().is_err());
        assert!(Params::new(2.0, 10, 0).validate().is_err());
        assert!(Params::new(2.0, 10, 1).with_barrier_interval(0).validate().is_err());
        assert!(Params::new(2.0, 10, 1).validate().is_ok());
    }
}
