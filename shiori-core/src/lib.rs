//! Shiori デバッガのコア機能
//!
//! このクレートは、デバッガの中核となるロジックを提供します。
//! ブレークポイントの管理と照合、条件式による停止判定、ステップ実行、
//! そして複数スレッド間での停止・再開の受け渡しを統合します。

pub mod breakpoint;
pub mod command;
pub mod condition;
pub mod debugger;
pub mod dispatch;
pub mod errors;
pub mod parse;
pub mod path;
pub mod registry;
pub mod resolver;
pub mod session;

pub use breakpoint::{Breakpoint, BreakpointId, BreakpointType, LineBreakpoint, MethodBreakpoint};
pub use command::{Command, CommandOutput};
pub use debugger::{Debugger, DebuggerConfig};
pub use errors::DebugError;
pub use parse::BreakpointSpec;
pub use registry::BreakpointRegistry;
pub use resolver::MethodResolver;
pub use session::{
    Interactive, ResumeDirective, SessionController, SessionEvent, Stop, StopReason, Termination,
};

// 他のクレートから使用するために再エクスポート
pub use shiori_target::{Context, ExceptionInfo, Thread, Tid, Value};

/// デバッガの結果型
pub type Result<T> = std::result::Result<T, DebugError>;
