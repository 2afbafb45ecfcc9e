//! ターゲットプログラムのロード

use crate::{ExceptionInfo, Result, TraceEvent};
use std::path::Path;

/// ロードしたプログラムの終了状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOutcome {
    /// 最後まで実行された
    Finished,
    /// プロセス終了要求（exit）で抜けた
    Exit(i32),
    /// 捕捉されなかった例外で抜けた
    Uncaught(ExceptionInfo),
}

/// トレースイベントの受け手
///
/// イベントを発生させたスレッド上で同期的に呼び出されます。
/// 呼び出しが返るまでそのスレッドの実行は止まります。
pub trait Tracer: Send + Sync {
    fn on_event(&self, event: &TraceEvent);
}

/// デバッグ対象プログラム
pub trait TargetProgram: Send + Sync {
    /// ファイルをロードして実行する
    ///
    /// 実行中に発生したすべてのイベントを `tracer` に届けます。
    /// ロード自体の失敗（ファイルが読めない等）は `Err` で返します。
    fn load(&self, path: &Path, tracer: &dyn Tracer) -> Result<ProgramOutcome>;
}
