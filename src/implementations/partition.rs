use crate::rng::WorkerRng;

/// ワーカーが担当する連続した行の帯 (全列)。
/// 高さは N / T、余りの行は最後の帯に入る。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strip {
    pub first_row: usize,
    pub rows: usize,
}

impl Strip {
    /// `threads <= size` が前提 (呼び出し側で検証済み)
    pub fn for_worker(worker: usize, threads: usize, size: usize) -> Self {
        debug_assert!(threads >= 1 && threads <= size && worker < threads);
        let height = size / threads;
        let first_row = worker * height;
        let rows = if worker + 1 == threads {
            size - first_row
        } else {
            height
        };
        Strip { first_row, rows }
    }

    pub fn last_row(&self) -> usize {
        self.first_row + self.rows - 1
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.first_row..=self.last_row()).contains(&row)
    }

    /// 帯の最初の行か最後の行。隣の帯のワーカーの近傍がここまで届く
    pub fn is_boundary(&self, row: usize) -> bool {
        debug_assert!(self.contains(row), "row {row} outside strip {self:?}");
        row == self.first_row || row == self.last_row()
    }

    /// 帯の中から一様に行を選ぶ
    #[inline(always)]
    pub fn sample_row(&self, rng: &mut WorkerRng) -> usize {
        let row = self.first_row + rng.index(self.rows);
        debug_assert!(self.contains(row), "sampled row {row} outside strip {self:?}");
        row
    }

    /// 境界行の数 / 帯の行数
    pub fn surface_ratio(&self) -> f64 {
        let boundary = if self.rows == 1 { 1 } else { 2 };
        boundary as f64 / self.rows as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeedSource;

    #[test]
    fn strips_cover_all_rows_once() {
        for (size, threads) in [(8, 1), (8, 2), (10, 3), (7, 7), (128, 8)] {
            let mut covered = vec![0; size];
            for w in 0..threads {
                let strip = Strip::for_worker(w, threads, size);
                for row in strip.first_row..=strip.last_row() {
                    covered[row] += 1;
                }
            }
            assert!(covered.iter().all(|&c| c == 1), "size={size} threads={threads}");
        }
    }

    #[test]
    fn remainder_goes_to_last_strip() {
        assert_eq!(Strip::for_worker(0, 3, 10), Strip { first_row: 0, rows: 3 });
        assert_eq!(Strip::for_worker(2, 3, 10), Strip { first_row: 6, rows: 4 });
    }

    #[test]
    fn boundary_rows_are_first_and_last() {
        let strip = Strip { first_row: 4, rows: 4 };
        let boundary: Vec<_> = (4..8).filter(|&r| strip.is_boundary(r)).collect();
        assert_eq!(boundary, vec![4, 7]);

        let thin = Strip { first_row: 3, rows: 1 };
        assert!(thin.is_boundary(3));
        assert_eq!(thin.surface_ratio(), 1.0);
        assert_eq!(Strip { first_row: 0, rows: 16 }.surface_ratio(), 0.125);
    }

    #[test]
    fn sampled_rows_stay_inside() {
        let strip = Strip::for_worker(1, 4, 32);
        let mut rng = WorkerRng::new(SeedSource::Fixed(9), 1);
        for _ in 0..10_000 {
            assert!(strip.contains(strip.sample_row(&mut rng)));
        }
    }
}
