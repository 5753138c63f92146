use crate::lattice::Lattice;
use crate::rng::WorkerRng;

/// スピン (row, col) を反転したときのエネルギー増加量 (J = 1)
#[inline(always)]
pub fn delta_energy(lattice: &Lattice, row: usize, col: usize) -> i32 {
    2 * lattice.get(row, col) as i32 * lattice.neighbor_sum(row, col)
}

/// 反転の受理確率 exp(-ΔE/T) / (exp(-ΔE/T) + exp(ΔE/T))。
/// 分子分母を exp(-ΔE/T) で割った形で計算し、低温での inf/inf を避ける。
#[inline]
pub fn flip_probability(delta_e: i32, temperature: f64) -> f64 {
    1.0 / (1.0 + (2.0 * delta_e as f64 / temperature).exp())
}

/// ΔE が取りうる 5 値 (-8, -4, 0, 4, 8) の受理確率表
#[derive(Clone, Copy, Debug)]
pub struct Acceptance {
    table: [f64; 5],
}

impl Acceptance {
    pub fn new(temperature: f64) -> Self {
        let mut table = [0.0; 5];
        for (k, p) in table.iter_mut().enumerate() {
            *p = flip_probability(4 * k as i32 - 8, temperature);
        }
        Acceptance { table }
    }

    #[inline(always)]
    pub fn probability(&self, delta_e: i32) -> f64 {
        debug_assert!(
            delta_e % 4 == 0 && (-8..=8).contains(&delta_e),
            "unexpected energy delta {delta_e}"
        );
        self.table[((delta_e + 8) / 4) as usize]
    }
}

/// 1 サイトのメトロポリス更新。反転したら true。
///
/// 呼び出し側が (row, col) と近傍への排他を保証していない場合でも、
/// 書き込まれる値は必ず ±1 になる。
#[inline(always)]
pub fn attempt_flip(
    lattice: &Lattice,
    acceptance: &Acceptance,
    row: usize,
    col: usize,
    rng: &mut WorkerRng,
) -> bool {
    let delta_e = delta_energy(lattice, row, col);
    let threshold = rng.unit();
    if threshold < acceptance.probability(delta_e) {
        lattice.flip(row, col);
        true
    } else {
        false
    }
}
