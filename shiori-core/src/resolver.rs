//! メソッドブレークポイントの解決
//!
//! テキストで指定されたクラス名・メソッド名を、内省機能を使って実際の
//! 型とメソッド実装に対応付けます。継承やエイリアスを考慮して、
//! 観測された呼び出しがブレークポイントの指すメソッドか判定します。

use crate::MethodBreakpoint;
use shiori_target::{Constant, MethodHandle, MethodKind, TypeHandle, TypeIntrospector};
use tracing::debug;

/// メソッド解決器
pub struct MethodResolver<'a> {
    introspector: &'a dyn TypeIntrospector,
}

impl<'a> MethodResolver<'a> {
    /// 新しいメソッド解決器を作成する
    pub fn new(introspector: &'a dyn TypeIntrospector) -> Self {
        Self { introspector }
    }

    /// `::` 区切りの名前をルート名前空間から順にたどって型を解決する
    ///
    /// 途中の要素が存在しない、またはメンバーを持てない値に解決された時点で
    /// `None` を返します。
    pub fn resolve(&self, class_name: &str) -> Option<TypeHandle> {
        let mut current = Constant::Type(self.introspector.root());

        for component in class_name.split("::") {
            if component.is_empty() {
                return None;
            }
            let namespace = current.as_type()?;
            current = self.introspector.member(namespace, component)?;
        }

        current.as_type()
    }

    /// ブレークポイントのクラスを解決する（成功した結果のみキャッシュ）
    pub fn actual_class(&self, bp: &MethodBreakpoint) -> Option<TypeHandle> {
        if let Some(ty) = bp.resolved_class.get() {
            return Some(*ty);
        }

        let ty = self.resolve(&bp.class_name)?;
        debug!("resolved class '{}' to {:?}", bp.class_name, ty);
        Some(*bp.resolved_class.get_or_init(|| ty))
    }

    /// ブレークポイントが参照するメソッドを解決する（成功した結果のみキャッシュ）
    pub fn referred_method(&self, bp: &MethodBreakpoint) -> Option<MethodHandle> {
        if let Some(method) = bp.referred_method.get() {
            return Some(method.clone());
        }

        let ty = self.actual_class(bp)?;
        let method = self.introspector.find_method(ty, &bp.method_name, bp.kind)?;
        debug!("resolved method '{}' to {:?}", bp.qualified_name(), method);
        Some(bp.referred_method.get_or_init(|| method).clone())
    }

    /// 観測された呼び出しがブレークポイントに一致するか判定する
    ///
    /// 判定順:
    /// 1. メソッドの種類が異なれば不一致
    /// 2. クラス名とメソッド名がテキストとして一致すれば一致
    /// 3. クラスと参照先メソッドが解決でき、観測された型がそのクラスか子孫で、
    ///    観測された型から見える同名のメソッドが同じ実装なら一致
    pub fn matches(
        &self,
        bp: &MethodBreakpoint,
        observed: TypeHandle,
        method_name: &str,
        kind: MethodKind,
    ) -> bool {
        if bp.kind != kind {
            return false;
        }

        if bp.method_name == method_name && bp.class_name == self.introspector.type_name(observed)
        {
            return true;
        }

        let Some(class) = self.actual_class(bp) else {
            return false;
        };
        let Some(referred) = self.referred_method(bp) else {
            return false;
        };
        let Some(other) = self.introspector.find_method(observed, method_name, kind) else {
            return false;
        };

        self.introspector.is_subtype(observed, class) && referred.same_implementation(&other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiori_model::ObjectModel;

    fn model() -> ObjectModel {
        let mut model = ObjectModel::with_builtins();
        let a = model.define_class("A", None).unwrap();
        model.define_method(a, "m", MethodKind::Class);
        model.define_method(a, "run", MethodKind::Instance);
        model.define_class("B", Some(a)).unwrap();
        let c = model.define_class("C", Some(a)).unwrap();
        model.define_method(c, "m", MethodKind::Class);
        model.define_method(c, "run", MethodKind::Instance);
        let outer = model.define_module("Outer").unwrap();
        model.define_class("Outer::Inner", None).unwrap();
        model.define_constant(outer, "LIMIT", Constant::Value("10".to_string()));
        model
    }

    fn handle(model: &ObjectModel, name: &str) -> TypeHandle {
        MethodResolver::new(model).resolve(name).unwrap()
    }

    #[test]
    fn test_resolve_walks_namespaces() {
        let model = model();
        let resolver = MethodResolver::new(&model);

        assert!(resolver.resolve("A").is_some());
        assert!(resolver.resolve("Outer::Inner").is_some());
        assert!(resolver.resolve("Outer::Missing").is_none());
        assert!(resolver.resolve("Missing::Inner").is_none());
        // メンバーを持てない値
        assert!(resolver.resolve("Outer::LIMIT").is_none());
        assert!(resolver.resolve("Outer::LIMIT::size").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn test_inherited_class_method_matches() {
        let model = model();
        let resolver = MethodResolver::new(&model);
        let bp = MethodBreakpoint::new("A", "m", true);

        assert!(resolver.matches(&bp, handle(&model, "A"), "m", MethodKind::Class));
        assert!(resolver.matches(&bp, handle(&model, "B"), "m", MethodKind::Class));
        assert!(!resolver.matches(&bp, handle(&model, "B"), "m", MethodKind::Instance));
    }

    #[test]
    fn test_overridden_method_does_not_match() {
        let model = model();
        let resolver = MethodResolver::new(&model);

        let class_bp = MethodBreakpoint::new("A", "m", true);
        assert!(!resolver.matches(&class_bp, handle(&model, "C"), "m", MethodKind::Class));

        let instance_bp = MethodBreakpoint::new("A", "run", false);
        assert!(resolver.matches(&instance_bp, handle(&model, "B"), "run", MethodKind::Instance));
        assert!(!resolver.matches(&instance_bp, handle(&model, "C"), "run", MethodKind::Instance));
    }

    #[test]
    fn test_alias_matches() {
        let model = ObjectModel::with_builtins();
        let resolver = MethodResolver::new(&model);
        let string = handle(&model, "String");
        let bp = MethodBreakpoint::new("String", "size", false);

        assert!(resolver.matches(&bp, string, "size", MethodKind::Instance));
        assert!(resolver.matches(&bp, string, "length", MethodKind::Instance));
        assert!(!resolver.matches(&bp, string, "size", MethodKind::Class));
        assert!(!resolver.matches(&bp, string, "foo", MethodKind::Instance));
        assert!(!resolver.matches(&bp, handle(&model, "Time"), "size", MethodKind::Instance));
    }

    #[test]
    fn test_unknown_method_only_matches_textually() {
        let model = ObjectModel::with_builtins();
        let resolver = MethodResolver::new(&model);
        let time = handle(&model, "Time");
        let bp = MethodBreakpoint::new("Time", "foo", true);

        assert_eq!(resolver.actual_class(&bp), Some(time));
        assert_eq!(resolver.referred_method(&bp), None);

        assert!(resolver.matches(&bp, time, "foo", MethodKind::Class));
        assert!(!resolver.matches(&bp, time, "now", MethodKind::Instance));
        assert!(!resolver.matches(&bp, time, "new", MethodKind::Class));
        assert!(!resolver.matches(&bp, handle(&model, "String"), "now", MethodKind::Class));
    }

    #[test]
    fn test_unknown_class_never_matches() {
        let model = ObjectModel::with_builtins();
        let resolver = MethodResolver::new(&model);
        let time = handle(&model, "Time");
        let bp = MethodBreakpoint::new("Bar", "foo", true);

        assert_eq!(resolver.actual_class(&bp), None);
        assert_eq!(resolver.referred_method(&bp), None);
        assert!(!resolver.matches(&bp, time, "foo", MethodKind::Class));
        assert!(!resolver.matches(&bp, time, "new", MethodKind::Class));
        assert!(!resolver.matches(&bp, time, "now", MethodKind::Instance));
    }

    #[test]
    fn test_non_class_constant_never_matches() {
        let model = ObjectModel::with_builtins();
        let resolver = MethodResolver::new(&model);
        let bp = MethodBreakpoint::new("File::SEPARATOR", "size", true);

        assert_eq!(resolver.actual_class(&bp), None);
        assert!(!resolver.matches(&bp, handle(&model, "String"), "size", MethodKind::Instance));
        assert!(!resolver.matches(&bp, handle(&model, "String"), "size", MethodKind::Class));
    }

    #[test]
    fn test_resolution_is_cached_but_failures_are_retried() {
        let mut model = ObjectModel::with_builtins();
        let bp = MethodBreakpoint::new("Later", "go", false);

        assert_eq!(MethodResolver::new(&model).referred_method(&bp), None);

        let later = model.define_class("Later", None).unwrap();
        let original = model.define_method(later, "go", MethodKind::Instance);
        let resolved = MethodResolver::new(&model).referred_method(&bp);
        assert_eq!(resolved.as_ref(), Some(&original));

        // 再定義後もキャッシュされた参照は変わらない
        model.define_method(later, "go", MethodKind::Instance);
        assert_eq!(MethodResolver::new(&model).referred_method(&bp), Some(original));
    }
}
