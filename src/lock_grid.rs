use std::hint;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use crate::error::{try_alloc, Result};
use crate::lattice::Lattice;

/// 1 回の更新が触るセル: 対象セルと上下左右。
/// 小さい格子 (N <= 2) では近傍が重なるので重複は取り除く。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    cells: [usize; 5],
    len: usize,
}

impl Footprint {
    pub fn around(lattice: &Lattice, row: usize, col: usize) -> Self {
        let mut footprint = Footprint {
            cells: [lattice.index(row, col); 5],
            len: 1,
        };
        for idx in lattice.neighbors(row, col) {
            if !footprint.as_slice().contains(&idx) {
                footprint.cells[footprint.len] = idx;
                footprint.len += 1;
            }
        }
        footprint
    }

    /// 先頭は常に対象セル
    pub fn as_slice(&self) -> &[usize] {
        &self.cells[..self.len]
    }
}

/// サイトごとの Mutex。格子と同じ `row * N + col` で並ぶ平坦な配列。
/// 戦略の実行ごとに作り直し、実行が終われば捨てる。
#[derive(Debug)]
pub struct LockGrid {
    size: usize,
    locks: Vec<Mutex<()>>,
}

impl LockGrid {
    pub fn new(size: usize) -> Result<Self> {
        let cells = size * size;
        let mut locks = try_alloc("lock grid", cells)?;
        locks.extend((0..cells).map(|_| Mutex::new(())));
        Ok(LockGrid { size, locks })
    }

    /// 5 つのロックを順に try_lock する。1 つでも取れなければ、
    /// それまでに取ったロックを解放して None を返す (ブロックしない)。
    pub fn try_lock_footprint(&self, footprint: Footprint) -> Option<FootprintGuard<'_>> {
        let mut guards: [Option<MutexGuard<'_, ()>>; 5] = [None, None, None, None, None];
        for (slot, &idx) in guards.iter_mut().zip(footprint.as_slice()) {
            match self.locks[idx].try_lock() {
                Ok(guard) => *slot = Some(guard),
                // パニックしたワーカーのロックは中身が () なのでそのまま使える
                Err(TryLockError::Poisoned(poisoned)) => *slot = Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => return None,
            }
        }
        Some(FootprintGuard {
            footprint,
            _guards: guards,
        })
    }

    /// `timeout` 以内に (row, col) の 5 ロックを取ろうとする。
    /// 最低 1 回は試す。時間切れは None (エラーではない)。
    pub fn lock_within(
        &self,
        lattice: &Lattice,
        row: usize,
        col: usize,
        timeout: Duration,
    ) -> Option<FootprintGuard<'_>> {
        debug_assert_eq!(lattice.size(), self.size, "lock grid does not match lattice");
        let footprint = Footprint::around(lattice, row, col);
        let start = Instant::now();
        loop {
            if let Some(guard) = self.try_lock_footprint(footprint) {
                return Some(guard);
            }
            if start.elapsed() > timeout {
                return None;
            }
            hint::spin_loop();
        }
    }
}

/// 取得した 5 ロック。drop ですべて解放される。
pub struct FootprintGuard<'a> {
    footprint: Footprint,
    _guards: [Option<MutexGuard<'a, ()>>; 5],
}

impl FootprintGuard<'_> {
    pub fn footprint(&self) -> Footprint {
        self.footprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_is_target_plus_four_neighbors() {
        let lattice = Lattice::filled(8, 1).unwrap();
        let fp = Footprint::around(&lattice, 0, 0);
        assert_eq!(fp.as_slice(), &[0, 56, 8, 7, 1]);
    }

    #[test]
    fn footprint_deduplicates_on_tiny_lattices() {
        let two = Lattice::filled(2, 1).unwrap();
        assert_eq!(Footprint::around(&two, 0, 0).as_slice(), &[0, 2, 1]);
        let one = Lattice::filled(1, 1).unwrap();
        assert_eq!(Footprint::around(&one, 0, 0).as_slice(), &[0]);

        // 重複したまま try_lock すると自分のロックで永久に失敗する
        let grid = LockGrid::new(2).unwrap();
        assert!(grid.lock_within(&two, 1, 1, Duration::ZERO).is_some());
    }

    #[test]
    fn overlapping_footprints_exclude_each_other() {
        let lattice = Lattice::filled(8, 1).unwrap();
        let grid = LockGrid::new(8).unwrap();

        let held = grid.lock_within(&lattice, 3, 3, Duration::ZERO).unwrap();
        // (3,4) は (3,3) の右隣。共有セルがある
        assert!(grid.lock_within(&lattice, 3, 4, Duration::from_micros(50)).is_none());
        // (6,6) は離れている
        assert!(grid.lock_within(&lattice, 6, 6, Duration::ZERO).is_some());

        drop(held);
        assert!(grid.lock_within(&lattice, 3, 4, Duration::ZERO).is_some());
    }

    #[test]
    fn partial_acquisition_is_rolled_back() {
        let lattice = Lattice::filled(8, 1).unwrap();
        let grid = LockGrid::new(8).unwrap();

        // (3,5) だけ押さえておくと (3,4) の取得は右隣で失敗する
        let right = grid.locks[lattice.index(3, 5)].lock().unwrap();
        assert!(grid.lock_within(&lattice, 3, 4, Duration::ZERO).is_none());
        drop(right);

        // 途中まで取ったロックが残っていないこと
        for idx in Footprint::around(&lattice, 3, 4).as_slice() {
            assert!(grid.locks[*idx].try_lock().is_ok(), "lock {idx} leaked");
        }
    }
}
