//! 戦略の内部イベントを観測するためのフック。
//!
//! 通常の実行では [`NoObserver`] を使い、呼び出しはすべてインライン化されて消える。
//! テストではここに記録用の実装を差し込み、ロックの重なりやフラグの二重取得を検出する。

/// すべてのメソッドは何もしないデフォルト実装を持つ
pub trait Observer: Sync {
    /// 5 ロックを取得した直後 (更新の前)。`footprint[0]` が対象セル
    #[inline(always)]
    fn locked(&self, _worker: usize, _footprint: &[usize]) {}

    /// ロックを解放する直前 (更新の後)
    #[inline(always)]
    fn unlocking(&self, _worker: usize, _footprint: &[usize]) {}

    /// ロックもフラグも使わずに更新したとき
    #[inline(always)]
    fn unguarded(&self, _worker: usize, _row: usize, _col: usize) {}

    /// フラグ格子のセルを立てた直後 (クリティカルセクション内)
    #[inline(always)]
    fn flag_claimed(&self, _worker: usize, _cell: usize) {}

    /// フラグを下ろす直前 (クリティカルセクション内)
    #[inline(always)]
    fn flag_releasing(&self, _worker: usize, _cell: usize) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoObserver;

impl Observer for NoObserver {}
