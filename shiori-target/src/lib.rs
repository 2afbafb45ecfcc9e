//! Shiori トレース対象の抽象
//!
//! このクレートは、デバッグ対象プログラムとデバッガコアの境界を定義します。
//! トレースイベント、実行コンテキスト、型の内省、条件式の評価、
//! ターゲットプログラムのロードなどのインターフェースを提供します。

pub mod context;
pub mod eval;
pub mod event;
pub mod introspect;
pub mod program;
pub mod thread;

pub use context::{Context, Value};
pub use eval::ExpressionEvaluator;
pub use event::{EventKind, ExceptionInfo, TraceEvent, INTERNAL_SOURCE};
pub use introspect::{Constant, ImplId, MethodHandle, MethodKind, TypeHandle, TypeIntrospector};
pub use program::{ProgramOutcome, TargetProgram, Tracer};
pub use thread::{Thread, Tid};

/// ターゲット側の結果型
pub type Result<T> = anyhow::Result<T>;
