//! 型の内省
//!
//! ターゲットプログラムの型（クラス・名前空間）とメソッド表への問い合わせを
//! 抽象化します。ホストごとに実装が異なっても、メソッドブレークポイントの
//! 解決ロジックは変わりません。

use crate::Value;

/// 型（クラスまたは名前空間）のハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub u32);

/// 名前空間のメンバーとして参照できる値
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// メンバーを持てる型
    Type(TypeHandle),
    /// メンバーを持てない値（表示用の文字列）
    Value(String),
}

impl Constant {
    /// 型であればハンドルを返す
    pub fn as_type(&self) -> Option<TypeHandle> {
        match self {
            Constant::Type(ty) => Some(*ty),
            Constant::Value(_) => None,
        }
    }
}

/// メソッド実装の識別子
///
/// エイリアスされたメソッドは同じ実装IDを共有します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImplId(pub u64);

/// メソッドの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// クラスメソッド
    Class,
    /// インスタンスメソッド
    Instance,
}

impl MethodKind {
    /// クラスメソッドかどうかのフラグから種類を得る
    pub fn from_class_method(is_class_method: bool) -> Self {
        if is_class_method {
            MethodKind::Class
        } else {
            MethodKind::Instance
        }
    }

    pub fn is_class_method(self) -> bool {
        self == MethodKind::Class
    }

    /// 表示用の区切り文字（`.` または `#`）
    pub fn separator(self) -> char {
        match self {
            MethodKind::Class => '.',
            MethodKind::Instance => '#',
        }
    }
}

/// 解決済みメソッドへの参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    /// 参照に使った名前
    pub name: String,
    /// メソッドを宣言した型
    pub owner: TypeHandle,
    pub implementation: ImplId,
}

impl MethodHandle {
    /// 2つのハンドルが同じ実装を指しているか判定する
    ///
    /// 実装IDが一致するか、同じ型で同じ名前として宣言されていれば同一とみなします。
    pub fn same_implementation(&self, other: &MethodHandle) -> bool {
        self.implementation == other.implementation
            || (self.name == other.name && self.owner == other.owner)
    }
}

/// 型の内省機能
pub trait TypeIntrospector: Send + Sync {
    /// ルート名前空間を取得する
    fn root(&self) -> TypeHandle;

    /// 名前空間の直接のメンバーを取得する
    fn member(&self, namespace: TypeHandle, name: &str) -> Option<Constant>;

    /// 型の完全修飾名を取得する（例: `Foo::Bar`）
    fn type_name(&self, ty: TypeHandle) -> String;

    /// 型から見えるメソッドを取得する
    ///
    /// 継承したメソッドやprivateメソッドも含みます。
    fn methods(&self, ty: TypeHandle, kind: MethodKind) -> Vec<MethodHandle>;

    /// `sub` が `ancestor` 自身またはその子孫か判定する
    fn is_subtype(&self, sub: TypeHandle, ancestor: TypeHandle) -> bool;

    /// 値が型のインスタンスか判定する
    fn is_instance_of(&self, value: &Value, ty: TypeHandle) -> bool;

    /// 名前でメソッドを探す
    fn find_method(&self, ty: TypeHandle, name: &str, kind: MethodKind) -> Option<MethodHandle> {
        self.methods(ty, kind).into_iter().find(|m| m.name == name)
    }

    /// メソッドが存在するか判定する
    fn has_method(&self, ty: TypeHandle, name: &str, kind: MethodKind) -> bool {
        self.find_method(ty, name, kind).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_implementation() {
        let size = MethodHandle {
            name: "size".to_string(),
            owner: TypeHandle(1),
            implementation: ImplId(10),
        };
        let length = MethodHandle {
            name: "length".to_string(),
            owner: TypeHandle(1),
            implementation: ImplId(10),
        };
        let redefined = MethodHandle {
            name: "size".to_string(),
            owner: TypeHandle(2),
            implementation: ImplId(11),
        };

        assert!(size.same_implementation(&length));
        assert!(!size.same_implementation(&redefined));
    }

    #[test]
    fn test_method_kind_separator() {
        assert_eq!(MethodKind::from_class_method(true).separator(), '.');
        assert_eq!(MethodKind::from_class_method(false).separator(), '#');
    }
}
