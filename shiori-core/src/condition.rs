//! 条件付きブレークポイントの判定

use shiori_target::{Context, ExpressionEvaluator};
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// 条件を満たすか判定する
///
/// 条件がなければ常に真です。評価中のエラーや評価器内のpanicは
/// 「条件を満たさない」として扱い、呼び出し元には伝えません。
pub fn passes(
    evaluator: &dyn ExpressionEvaluator,
    condition: Option<&str>,
    context: &Context,
) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(condition, context))) {
        Ok(Ok(value)) => value.is_truthy(),
        Ok(Err(err)) => {
            debug!("condition '{}' failed: {:#}", condition, err);
            false
        }
        Err(_) => {
            debug!("condition '{}' panicked", condition);
            false
        }
    }
}

/// 条件の表示用文字列
pub fn describe(condition: Option<&str>) -> String {
    match condition {
        Some(condition) => format!(" (if {})", condition),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiori_target::Value;

    /// `n == <整数>` だけを理解する評価器
    struct EqualsZero;

    impl ExpressionEvaluator for EqualsZero {
        fn evaluate(&self, expression: &str, context: &Context) -> anyhow::Result<Value> {
            match expression {
                "n == 0" => {
                    let n = context
                        .lookup("n")
                        .ok_or_else(|| anyhow::anyhow!("undefined local variable 'n'"))?;
                    Ok(Value::Boolean(*n == Value::Integer(0)))
                }
                "explode" => panic!("evaluator bug"),
                "n" => Ok(context.lookup("n").cloned().unwrap_or(Value::Nil)),
                other => Err(anyhow::anyhow!("undefined method '{}'", other)),
            }
        }
    }

    #[test]
    fn test_absent_condition_always_passes() {
        assert!(passes(&EqualsZero, None, &Context::new()));
    }

    #[test]
    fn test_condition_against_locals() {
        let zero = Context::new().with_local("n", Value::Integer(0));
        let negative = Context::new().with_local("n", Value::Integer(-1));

        assert!(passes(&EqualsZero, Some("n == 0"), &zero));
        assert!(!passes(&EqualsZero, Some("n == 0"), &negative));
    }

    #[test]
    fn test_errors_do_not_pass() {
        // 未定義の変数
        assert!(!passes(&EqualsZero, Some("n == 0"), &Context::new()));
        assert!(!passes(&EqualsZero, Some("raise_error"), &Context::new()));
        assert!(!passes(&EqualsZero, Some("explode"), &Context::new()));
    }

    #[test]
    fn test_truthiness_of_result() {
        let nil = Context::new().with_local("n", Value::Nil);
        let number = Context::new().with_local("n", Value::Integer(3));

        assert!(!passes(&EqualsZero, Some("n"), &nil));
        assert!(passes(&EqualsZero, Some("n"), &number));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(Some("n == 0")), " (if n == 0)");
        assert_eq!(describe(None), "");
    }
}
