use thiserror::Error;

/// シミュレーション全体で使うエラー型
#[derive(Debug, Error)]
pub enum SimError {
    /// スレッド起動前に弾かれるパラメータ不正
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// 格子・ロック格子・フラグ格子の確保に失敗
    #[error("failed to allocate {what} ({cells} cells)")]
    Allocation { what: &'static str, cells: usize },

    #[error("worker thread {worker} panicked")]
    WorkerPanicked { worker: usize },
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// `len` 要素の Vec を確保する。失敗は `Allocation` に変換する。
pub(crate) fn try_alloc<T>(what: &'static str, len: usize) -> Result<Vec<T>> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| SimError::Allocation { what, cells: len })?;
    Ok(cells)
}
