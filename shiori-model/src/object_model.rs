//! メモリ上のオブジェクトモデル
//!
//! クラスとモジュールを名前空間の木として保持します。ルート名前空間は
//! `Object` クラスで、トップレベルの定数はすべてそのメンバーです。
//! クラスは単一継承で、クラスメソッドもインスタンスメソッドも親クラスから継承します。

use crate::{ModelError, Result};
use shiori_target::{
    Constant, ImplId, MethodHandle, MethodKind, TypeHandle, TypeIntrospector, Value,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// 型の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Class,
    Module,
}

/// 型の定義
#[derive(Debug, Clone)]
struct TypeEntry {
    /// 完全修飾名
    name: String,
    kind: TypeKind,
    superclass: Option<TypeHandle>,
    members: BTreeMap<String, Constant>,
    class_methods: BTreeMap<String, MethodHandle>,
    instance_methods: BTreeMap<String, MethodHandle>,
}

impl TypeEntry {
    fn new(name: String, kind: TypeKind, superclass: Option<TypeHandle>) -> Self {
        Self {
            name,
            kind,
            superclass,
            members: BTreeMap::new(),
            class_methods: BTreeMap::new(),
            instance_methods: BTreeMap::new(),
        }
    }

    fn table(&self, kind: MethodKind) -> &BTreeMap<String, MethodHandle> {
        match kind {
            MethodKind::Class => &self.class_methods,
            MethodKind::Instance => &self.instance_methods,
        }
    }

    fn table_mut(&mut self, kind: MethodKind) -> &mut BTreeMap<String, MethodHandle> {
        match kind {
            MethodKind::Class => &mut self.class_methods,
            MethodKind::Instance => &mut self.instance_methods,
        }
    }
}

const ROOT: TypeHandle = TypeHandle(0);

/// オブジェクトモデル
#[derive(Debug, Clone)]
pub struct ObjectModel {
    types: Vec<TypeEntry>,
    next_impl: u64,
}

impl ObjectModel {
    /// ルートの `Object` クラスだけを持つモデルを作成する
    pub fn new() -> Self {
        let mut model = Self {
            types: vec![TypeEntry::new("Object".to_string(), TypeKind::Class, None)],
            next_impl: 1,
        };
        model.define_method(ROOT, "new", MethodKind::Class);
        model
    }

    /// 組み込みのクラスを持つモデルを作成する
    ///
    /// `String`（`size` とそのエイリアス `length`）、`Integer`、`Time`
    /// （`Object.new` を上書きする `new`）、`File`（定数 `SEPARATOR`）を定義します。
    pub fn with_builtins() -> Self {
        let mut model = Self::new();
        model.install_builtins();
        model
    }

    fn install_builtins(&mut self) {
        let string = self.insert_type(ROOT, "String", TypeKind::Class, Some(ROOT));
        self.define_method(string, "size", MethodKind::Instance);
        self.define_method(string, "upcase", MethodKind::Instance);
        self.define_method(string, "to_s", MethodKind::Instance);
        self.alias_existing(string, "length", "size", MethodKind::Instance);

        let integer = self.insert_type(ROOT, "Integer", TypeKind::Class, Some(ROOT));
        self.define_method(integer, "to_s", MethodKind::Instance);
        self.define_method(integer, "times", MethodKind::Instance);

        let time = self.insert_type(ROOT, "Time", TypeKind::Class, Some(ROOT));
        self.define_method(time, "new", MethodKind::Class);
        self.define_method(time, "now", MethodKind::Class);
        self.define_method(time, "parse", MethodKind::Class);
        self.define_method(time, "to_i", MethodKind::Instance);

        let file = self.insert_type(ROOT, "File", TypeKind::Class, Some(ROOT));
        self.define_method(file, "exist?", MethodKind::Class);
        self.define_method(file, "join", MethodKind::Class);
        self.define_method(file, "path", MethodKind::Instance);
        self.define_constant(file, "SEPARATOR", Constant::Value("\"/\"".to_string()));
    }

    fn entry(&self, ty: TypeHandle) -> Option<&TypeEntry> {
        self.types.get(ty.0 as usize)
    }

    fn entry_mut(&mut self, ty: TypeHandle) -> Option<&mut TypeEntry> {
        self.types.get_mut(ty.0 as usize)
    }

    fn insert_type(
        &mut self,
        parent: TypeHandle,
        name: &str,
        kind: TypeKind,
        superclass: Option<TypeHandle>,
    ) -> TypeHandle {
        let qualified = if parent == ROOT {
            name.to_string()
        } else {
            format!("{}::{}", self.type_name(parent), name)
        };

        let handle = TypeHandle(self.types.len() as u32);
        self.types.push(TypeEntry::new(qualified, kind, superclass));
        if let Some(entry) = self.entry_mut(parent) {
            entry.members.insert(name.to_string(), Constant::Type(handle));
        }
        handle
    }

    /// `::` 区切りの名前で定数を探す
    pub fn lookup(&self, path: &str) -> Option<Constant> {
        let mut current = Constant::Type(ROOT);
        for component in path.split("::") {
            let namespace = current.as_type()?;
            current = self.member(namespace, component)?;
        }
        Some(current)
    }

    /// `::` 区切りの名前で型を探す
    pub fn resolve_type(&self, path: &str) -> Result<TypeHandle> {
        match self.lookup(path) {
            Some(Constant::Type(ty)) => Ok(ty),
            Some(Constant::Value(_)) => Err(ModelError::NotAType(path.to_string()).into()),
            None => Err(ModelError::UnknownConstant(path.to_string()).into()),
        }
    }

    /// 定義先の名前空間と末尾の名前に分ける
    fn split_definition<'p>(&self, path: &'p str) -> Result<(TypeHandle, &'p str)> {
        match path.rsplit_once("::") {
            Some((parent, name)) => Ok((self.resolve_type(parent)?, name)),
            None => Ok((ROOT, path)),
        }
    }

    /// 定義済みの同名の型を取得する（値ならエラー）
    fn existing_type(&self, parent: TypeHandle, name: &str, path: &str) -> Result<Option<TypeHandle>> {
        match self.member(parent, name) {
            Some(Constant::Type(ty)) => Ok(Some(ty)),
            Some(Constant::Value(_)) => Err(ModelError::NotAType(path.to_string()).into()),
            None => Ok(None),
        }
    }

    /// クラスを定義する
    ///
    /// 親クラスを省略すると `Object` を継承します。定義済みのクラスは再オープンされ、
    /// 異なる親クラスが指定された場合はエラーになります。
    pub fn define_class(&mut self, path: &str, superclass: Option<TypeHandle>) -> Result<TypeHandle> {
        let (parent, name) = self.split_definition(path)?;

        if let Some(ty) = self.existing_type(parent, name, path)? {
            let entry = self.entry(ty).ok_or_else(|| ModelError::NotAType(path.to_string()))?;
            if entry.kind != TypeKind::Class {
                return Err(ModelError::NotAType(path.to_string()).into());
            }
            if superclass.is_some() && entry.superclass != superclass {
                return Err(ModelError::SuperclassMismatch(path.to_string()).into());
            }
            return Ok(ty);
        }

        let ty = self.insert_type(parent, name, TypeKind::Class, Some(superclass.unwrap_or(ROOT)));
        debug!("defined class {} as {:?}", path, ty);
        Ok(ty)
    }

    /// モジュールを定義する
    pub fn define_module(&mut self, path: &str) -> Result<TypeHandle> {
        let (parent, name) = self.split_definition(path)?;

        if let Some(ty) = self.existing_type(parent, name, path)? {
            return match self.entry(ty) {
                Some(entry) if entry.kind == TypeKind::Module => Ok(ty),
                _ => Err(ModelError::NotAType(path.to_string()).into()),
            };
        }

        let ty = self.insert_type(parent, name, TypeKind::Module, None);
        debug!("defined module {} as {:?}", path, ty);
        Ok(ty)
    }

    /// メソッドを定義する
    ///
    /// 定義のたびに新しい実装になります。同じ名前で再定義すると以前の実装を置き換えます。
    pub fn define_method(&mut self, ty: TypeHandle, name: &str, kind: MethodKind) -> MethodHandle {
        let handle = MethodHandle {
            name: name.to_string(),
            owner: ty,
            implementation: ImplId(self.next_impl),
        };
        self.next_impl += 1;

        if let Some(entry) = self.entry_mut(ty) {
            entry.table_mut(kind).insert(name.to_string(), handle.clone());
        }
        handle
    }

    /// 既存のメソッドに別名を付ける
    ///
    /// 別名は元のメソッドと同じ実装を共有します。
    pub fn alias_method(
        &mut self,
        ty: TypeHandle,
        new_name: &str,
        old_name: &str,
        kind: MethodKind,
    ) -> Result<MethodHandle> {
        self.alias_existing(ty, new_name, old_name, kind)
            .ok_or_else(|| {
                ModelError::UndefinedMethod {
                    owner: self.type_name(ty),
                    method: old_name.to_string(),
                }
                .into()
            })
    }

    fn alias_existing(
        &mut self,
        ty: TypeHandle,
        new_name: &str,
        old_name: &str,
        kind: MethodKind,
    ) -> Option<MethodHandle> {
        let original = self.find_method(ty, old_name, kind)?;
        let handle = MethodHandle {
            name: new_name.to_string(),
            owner: ty,
            implementation: original.implementation,
        };
        self.entry_mut(ty)?
            .table_mut(kind)
            .insert(new_name.to_string(), handle.clone());
        Some(handle)
    }

    /// 名前空間に定数を定義する
    pub fn define_constant(&mut self, namespace: TypeHandle, name: &str, value: Constant) {
        if let Some(entry) = self.entry_mut(namespace) {
            entry.members.insert(name.to_string(), value);
        }
    }

    /// `::` 区切りの名前で定数を定義する
    pub fn define_constant_at(&mut self, path: &str, value: Constant) -> Result<()> {
        let (namespace, name) = self.split_definition(path)?;
        self.define_constant(namespace, name, value);
        Ok(())
    }

    /// `ty` から親クラスをたどる
    fn ancestors(&self, ty: TypeHandle) -> impl Iterator<Item = TypeHandle> + '_ {
        std::iter::successors(Some(ty), move |t| self.entry(*t).and_then(|e| e.superclass))
    }

    fn builtin(&self, name: &str) -> Option<TypeHandle> {
        self.member(ROOT, name).and_then(|c| c.as_type())
    }
}

impl Default for ObjectModel {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeIntrospector for ObjectModel {
    fn root(&self) -> TypeHandle {
        ROOT
    }

    fn member(&self, namespace: TypeHandle, name: &str) -> Option<Constant> {
        self.entry(namespace)?.members.get(name).cloned()
    }

    fn type_name(&self, ty: TypeHandle) -> String {
        self.entry(ty)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| format!("#<type {}>", ty.0))
    }

    fn methods(&self, ty: TypeHandle, kind: MethodKind) -> Vec<MethodHandle> {
        let mut seen = HashSet::new();
        let mut methods = Vec::new();
        for ancestor in self.ancestors(ty) {
            let Some(entry) = self.entry(ancestor) else {
                break;
            };
            for (name, handle) in entry.table(kind) {
                if seen.insert(name.as_str()) {
                    methods.push(handle.clone());
                }
            }
        }
        methods
    }

    fn is_subtype(&self, sub: TypeHandle, ancestor: TypeHandle) -> bool {
        self.ancestors(sub).any(|t| t == ancestor)
    }

    fn is_instance_of(&self, value: &Value, ty: TypeHandle) -> bool {
        let class = match value {
            Value::Instance(class) => Some(*class),
            Value::String(_) => self.builtin("String"),
            Value::Integer(_) => self.builtin("Integer"),
            Value::Nil | Value::Boolean(_) => Some(ROOT),
            Value::Type(_) => None,
        };
        class.is_some_and(|class| self.is_subtype(class, ty))
    }
}

/// スレッド間で共有するオブジェクトモデル
///
/// ターゲットプログラムが実行中にクラスを定義し、デバッガが同じモデルを
/// 内省できるようにします。
#[derive(Debug, Clone, Default)]
pub struct SharedModel(Arc<RwLock<ObjectModel>>);

impl SharedModel {
    pub fn new(model: ObjectModel) -> Self {
        Self(Arc::new(RwLock::new(model)))
    }

    /// 読み取りロックを取得する
    pub fn read(&self) -> RwLockReadGuard<'_, ObjectModel> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// 書き込みロックを取得する
    pub fn write(&self) -> RwLockWriteGuard<'_, ObjectModel> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TypeIntrospector for SharedModel {
    fn root(&self) -> TypeHandle {
        self.read().root()
    }

    fn member(&self, namespace: TypeHandle, name: &str) -> Option<Constant> {
        self.read().member(namespace, name)
    }

    fn type_name(&self, ty: TypeHandle) -> String {
        self.read().type_name(ty)
    }

    fn methods(&self, ty: TypeHandle, kind: MethodKind) -> Vec<MethodHandle> {
        self.read().methods(ty, kind)
    }

    fn is_subtype(&self, sub: TypeHandle, ancestor: TypeHandle) -> bool {
        self.read().is_subtype(sub, ancestor)
    }

    fn is_instance_of(&self, value: &Value, ty: TypeHandle) -> bool {
        self.read().is_instance_of(value, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        let model = ObjectModel::with_builtins();
        let string = model.resolve_type("String").unwrap();
        let size = model.find_method(string, "size", MethodKind::Instance).unwrap();
        let length = model.find_method(string, "length", MethodKind::Instance).unwrap();
        assert_eq!(size.implementation, length.implementation);

        let time = model.resolve_type("Time").unwrap();
        let time_new = model.find_method(time, "new", MethodKind::Class).unwrap();
        assert_eq!(time_new.owner, time);

        assert_eq!(
            model.lookup("File::SEPARATOR"),
            Some(Constant::Value("\"/\"".to_string()))
        );
        assert!(model.resolve_type("File::SEPARATOR").is_err());
    }

    #[test]
    fn test_inheritance_and_override() {
        let mut model = ObjectModel::new();
        let a = model.define_class("A", None).unwrap();
        let a_run = model.define_method(a, "run", MethodKind::Instance);
        let b = model.define_class("B", Some(a)).unwrap();

        assert!(model.is_subtype(b, a));
        assert!(model.is_subtype(b, ROOT));
        assert!(!model.is_subtype(a, b));
        assert_eq!(model.find_method(b, "run", MethodKind::Instance), Some(a_run.clone()));
        // Object.new はすべてのクラスが継承する
        assert!(model.has_method(b, "new", MethodKind::Class));

        let b_run = model.define_method(b, "run", MethodKind::Instance);
        assert_eq!(model.find_method(b, "run", MethodKind::Instance), Some(b_run));
        assert_eq!(model.find_method(a, "run", MethodKind::Instance), Some(a_run));
    }

    #[test]
    fn test_namespaces() {
        let mut model = ObjectModel::new();
        let outer = model.define_module("Outer").unwrap();
        let inner = model.define_class("Outer::Inner", None).unwrap();

        assert_eq!(model.type_name(inner), "Outer::Inner");
        assert_eq!(model.member(outer, "Inner"), Some(Constant::Type(inner)));
        assert!(model.define_class("Missing::Inner", None).is_err());

        // モジュールはメソッドを継承しない
        assert!(!model.has_method(outer, "new", MethodKind::Class));
    }

    #[test]
    fn test_reopen_class() {
        let mut model = ObjectModel::new();
        let a = model.define_class("A", None).unwrap();
        let b = model.define_class("B", None).unwrap();
        assert_eq!(model.define_class("A", None).unwrap(), a);

        let err = model.define_class("A", Some(b)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::SuperclassMismatch("A".to_string()))
        );
        assert!(model.define_module("A").is_err());
    }

    #[test]
    fn test_alias_requires_existing_method() {
        let mut model = ObjectModel::new();
        let a = model.define_class("A", None).unwrap();
        assert!(model.alias_method(a, "go", "run", MethodKind::Instance).is_err());

        let run = model.define_method(a, "run", MethodKind::Instance);
        let go = model.alias_method(a, "go", "run", MethodKind::Instance).unwrap();
        assert!(go.same_implementation(&run));
    }

    #[test]
    fn test_is_instance_of() {
        let mut model = ObjectModel::with_builtins();
        let a = model.define_class("A", None).unwrap();
        let b = model.define_class("B", Some(a)).unwrap();
        let string = model.resolve_type("String").unwrap();

        assert!(model.is_instance_of(&Value::Instance(b), a));
        assert!(!model.is_instance_of(&Value::Instance(a), b));
        assert!(!model.is_instance_of(&Value::Type(a), a));
        assert!(model.is_instance_of(&Value::String("x".to_string()), string));
        assert!(model.is_instance_of(&Value::Nil, ROOT));
    }

    #[test]
    fn test_shared_model_sees_later_definitions() {
        let shared = SharedModel::new(ObjectModel::new());
        let reader = shared.clone();

        let later = shared.write().define_class("Later", None).unwrap();
        assert_eq!(reader.member(reader.root(), "Later"), Some(Constant::Type(later)));
    }
}
