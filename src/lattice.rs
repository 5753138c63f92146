use std::fmt;
use std::sync::atomic::{AtomicI8, Ordering};

use rayon::prelude::*;

use crate::error::{try_alloc, Result, SimError};
use crate::rng::{SeedSource, WorkerRng};

/// N×N のスピン格子 (周期境界)。
///
/// セルは `row * N + col` の平坦な配列に並ぶ。各セルは常に +1 か -1。
/// 全スレッドが `&Lattice` を共有し、セル単位の読み書きは `Relaxed` の
/// アトミック操作で行う。近傍和の読み取りと書き戻しの間の排他は
/// 各戦略の責任 (naive は意図的に何もしない)。
#[derive(Debug)]
pub struct Lattice {
    size: usize,
    spins: Vec<AtomicI8>,
}

impl Lattice {
    /// 格子を確保して 50/50 でランダムに初期化する
    pub fn new(size: usize, seed: SeedSource) -> Result<Self> {
        let mut lattice = Lattice::filled(size, 1)?;
        lattice.randomize(seed);
        Ok(lattice)
    }

    /// 全セルを `spin` で埋めた格子。確保と単体テスト用で、
    /// 外から見える格子は必ず `new` のランダム初期化から始まる
    pub(crate) fn filled(size: usize, spin: i8) -> Result<Self> {
        if size == 0 {
            return Err(SimError::invalid("size", "lattice size must be at least 1"));
        }
        if spin != 1 && spin != -1 {
            return Err(SimError::invalid("spin", format!("must be +1 or -1, got {spin}")));
        }
        let cells = size
            .checked_mul(size)
            .ok_or_else(|| SimError::invalid("size", format!("{size}x{size} overflows")))?;
        let mut spins = try_alloc("lattice", cells)?;
        spins.extend((0..cells).map(|_| AtomicI8::new(spin)));
        Ok(Lattice { size, spins })
    }

    /// 行ごとに独立した乱数列で再初期化する。
    /// 行単位で種を決めるので、rayon のスレッド数に関係なく結果は同じ。
    pub fn randomize(&mut self, seed: SeedSource) {
        let seed = match seed {
            SeedSource::Clock => SeedSource::Fixed(SeedSource::Clock.worker_seed(0)),
            fixed => fixed,
        };
        self.spins
            .par_chunks_mut(self.size)
            .enumerate()
            .for_each(|(row, cells)| {
                let mut rng = WorkerRng::new(seed, row);
                for cell in cells {
                    *cell.get_mut() = rng.spin();
                }
            });
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.spins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }

    /// 範囲外の座標は周期境界で折り返す
    #[inline(always)]
    pub fn index(&self, row: usize, col: usize) -> usize {
        (row % self.size) * self.size + col % self.size
    }

    /// 上・下・左・右の近傍インデックス
    #[inline(always)]
    pub fn neighbors(&self, row: usize, col: usize) -> [usize; 4] {
        let n = self.size;
        let (row, col) = (row % n, col % n);
        let up = (row + n - 1) % n;
        let down = (row + 1) % n;
        let left = (col + n - 1) % n;
        let right = (col + 1) % n;
        [up * n + col, down * n + col, row * n + left, row * n + right]
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> i8 {
        self.spins[self.index(row, col)].load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn set(&self, row: usize, col: usize, spin: i8) {
        debug_assert!(spin == 1 || spin == -1, "spin must be +1 or -1, got {spin}");
        self.spins[self.index(row, col)].store(spin, Ordering::Relaxed);
    }

    /// 読み取りと書き戻しは別々の操作。間に割り込まれても値は ±1 のまま
    #[inline(always)]
    pub fn flip(&self, row: usize, col: usize) {
        let cell = &self.spins[self.index(row, col)];
        let spin = cell.load(Ordering::Relaxed);
        cell.store(-spin, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn neighbor_sum(&self, row: usize, col: usize) -> i32 {
        self.neighbors(row, col)
            .iter()
            .map(|&idx| self.spins[idx].load(Ordering::Relaxed) as i32)
            .sum()
    }

    /// 全スピンの和
    pub fn magnetization(&self) -> i64 {
        self.spins
            .par_iter()
            .map(|s| s.load(Ordering::Relaxed) as i64)
            .sum()
    }

    pub fn mean_spin(&self) -> f64 {
        self.magnetization() as f64 / self.len() as f64
    }

    /// E = -Σ s_i (s_right + s_down)。各ボンドを1回ずつ数える (J = 1)
    pub fn energy(&self) -> i64 {
        let n = self.size;
        let bonds: i64 = (0..n)
            .into_par_iter()
            .map(|row| {
                let mut sum = 0i64;
                for col in 0..n {
                    let s = self.get(row, col) as i64;
                    let right = self.get(row, col + 1) as i64;
                    let down = self.get(row + 1, col) as i64;
                    sum += s * (right + down);
                }
                sum
            })
            .sum();
        -bonds
    }

    pub fn snapshot(&self) -> Vec<i8> {
        self.spins.iter().map(|s| s.load(Ordering::Relaxed)).collect()
    }

    /// 全セルが ±1 か
    pub fn is_valid(&self) -> bool {
        self.spins
            .par_iter()
            .all(|s| matches!(s.load(Ordering::Relaxed), 1 | -1))
    }
}

// '+' と '-' で格子を表示
impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.size {
            for col in 0..self.size {
                f.write_str(if self.get(row, col) == 1 { "+" } else { "-" })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_init_is_valid_and_mixed() {
        let lattice = Lattice::new(64, SeedSource::Fixed(11)).unwrap();
        assert!(lattice.is_valid());
        // 4096 セルで偏りが 10% を超えることはまずない
        assert!(lattice.mean_spin().abs() < 0.1, "mean spin = {}", lattice.mean_spin());
    }

    #[test]
    fn same_seed_same_lattice() {
        let a = Lattice::new(16, SeedSource::Fixed(5)).unwrap();
        let b = Lattice::new(16, SeedSource::Fixed(5)).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn neighbors_wrap_around() {
        let lattice = Lattice::filled(4, 1).unwrap();
        // (0,0) の上は (3,0)、左は (0,3)
        assert_eq!(lattice.neighbors(0, 0), [12, 4, 3, 1]);
        assert_eq!(lattice.neighbors(3, 3), [11, 3, 14, 12]);
        assert_eq!(lattice.index(5, 6), lattice.index(1, 2));
    }

    #[test]
    fn neighbor_sum_and_flip() {
        let lattice = Lattice::filled(3, 1).unwrap();
        assert_eq!(lattice.neighbor_sum(1, 1), 4);
        lattice.flip(0, 1);
        lattice.set(1, 0, -1);
        assert_eq!(lattice.get(0, 1), -1);
        assert_eq!(lattice.neighbor_sum(1, 1), 0);
        assert!(lattice.is_valid());
    }

    #[test]
    fn observables_of_ordered_lattice() {
        let lattice = Lattice::filled(8, -1).unwrap();
        assert_eq!(lattice.magnetization(), -64);
        assert_eq!(lattice.mean_spin(), -1.0);
        // 基底状態: ボンド数 2N^2
        assert_eq!(lattice.energy(), -128);
    }

    #[test]
    fn display_uses_plus_and_minus() {
        let lattice = Lattice::filled(2, 1).unwrap();
        lattice.set(1, 1, -1);
        assert_eq!(lattice.to_string(), "++\n+-\n");
    }

    #[test]
    fn rejects_empty_lattice() {
        assert!(matches!(
            Lattice::filled(0, 1),
            Err(SimError::InvalidParameter { name: "size", .. })
        ));
    }
}
