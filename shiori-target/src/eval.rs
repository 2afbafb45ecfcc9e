//! 条件式の評価

use crate::{Context, Result, Value};

/// 式評価器
///
/// 停止したフレームのコンテキストに対して、ユーザーが入力した式文字列を評価します。
pub trait ExpressionEvaluator: Send + Sync {
    /// 式を評価する
    fn evaluate(&self, expression: &str, context: &Context) -> Result<Value>;
}
