//! デバッガのエラー

use crate::BreakpointId;
use std::path::PathBuf;

/// デバッガ操作のエラー
///
/// どれもユーザーへのメッセージとして表示されるもので、デバッガを止めることはありません。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DebugError {
    /// 存在しないブレークポイントIDが指定された
    #[error("could not find breakpoint {0}")]
    NotFound(BreakpointId),

    /// ブレークポイント指定の形式が不正
    #[error("invalid breakpoint: {0}")]
    InvalidBreakpoint(String),

    /// デバッグ対象ファイルが設定されていない
    #[error("file is not set")]
    FileNotSet,

    /// デバッグ対象ファイルが存在しない
    #[error("file does not exist: {}", .0.display())]
    FileMissing(PathBuf),

    /// ターゲットプログラムのローダーが設定されていない
    #[error("no target program loader is configured")]
    NoTargetProgram,

    /// すでにデバッグ中
    #[error("debugger already started")]
    AlreadyDebugging,

    /// まだデバッグが開始されていない
    #[error("debugger hasn't been started yet")]
    NotDebugging,

    /// 停止中のスレッドがない
    #[error("no thread is suspended")]
    NotSuspended,

    /// ターゲット実行用スレッドを起動できなかった
    #[error("failed to start target thread: {0}")]
    Spawn(String),
}
