//! Shiori オブジェクトモデルとトレーススクリプト
//!
//! このクレートは、デバッガコアが必要とするホスト側の機能を提供します。
//! クラス・名前空間・継承・エイリアスを持つメモリ上のオブジェクトモデル、
//! 条件式の評価器、そしてイベント列をテキストで記述したトレーススクリプトを
//! 実行するターゲットプログラムです。

pub mod errors;
pub mod expr;
pub mod object_model;
pub mod script;

pub use errors::{ModelError, ScriptError};
pub use expr::ConditionEvaluator;
pub use object_model::{ObjectModel, SharedModel};
pub use script::{Directive, Receiver, ThreadScript, TraceScript, TraceScriptProgram};

/// モデル操作の結果型
pub type Result<T> = anyhow::Result<T>;
