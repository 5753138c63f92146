//! 2 次元イジング模型のメトロポリス法を、同じ共有格子に対する
//! 複数の同期方式で並列化して比べるためのクレート。

pub mod config;
pub mod error;
pub mod implementations;
pub mod lattice;
pub mod lock_grid;
pub mod metropolis;
pub mod observer;
pub mod rng;

pub use config::Params;
pub use error::{Result, SimError};
pub use implementations::{run_strategy, run_with, RunStats, StrategyKind};
pub use lattice::Lattice;
pub use rng::SeedSource;
