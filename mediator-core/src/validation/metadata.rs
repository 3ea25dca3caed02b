//! 校验元数据（Metadata）
//!
//! Rust 无运行期反射，命令图通过 [`Validate`] 暴露一份只读视图：
//! - [`Validate::metadata`]：类型级元数据（类型级规则）；
//! - [`Validate::node`]：节点形态（标量/对象/序列/间接引用）。
//!
//! 对象的属性元数据（属性名与字段规则）由 `#[derive(Validate)]` 生成。
//!
use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// 取得 `&dyn Any` 视图（供自定义规则向下转型与身份判定）
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 可被校验的值
pub trait Validate: AsAny + Send + Sync {
    /// 类型级元数据，默认无规则
    fn metadata(&self) -> ModelMetadata {
        ModelMetadata::for_type::<Self>(&[])
    }

    /// 节点形态，默认视为不透明标量
    fn node(&self) -> Node<'_> {
        Node::Scalar(Scalar::Other)
    }
}

/// 标量取值（供内置校验器读取）
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar<'a> {
    Str(&'a str),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Other,
}

impl Scalar<'_> {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Int(v) => Some(v as f64),
            Scalar::UInt(v) => Some(v as f64),
            Scalar::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// 对象的一个属性
pub struct Property<'a> {
    metadata: ModelMetadata,
    value: &'a dyn Validate,
}

impl<'a> Property<'a> {
    pub fn new(metadata: ModelMetadata, value: &'a dyn Validate) -> Self {
        Self { metadata, value }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn value(&self) -> &'a dyn Validate {
        self.value
    }
}

/// 节点形态
pub enum Node<'a> {
    Scalar(Scalar<'a>),
    Object(Vec<Property<'a>>),
    Sequence(Vec<&'a dyn Validate>),
    /// 透明包装（`Option`/`Box`/`Arc`/`OnceLock`）；`None` 视为空值
    Indirect(Option<&'a dyn Validate>),
}

impl Node<'_> {
    pub fn scalar(&self) -> Option<Scalar<'_>> {
        match self {
            Node::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// 字符串按字符计数，序列按元素计数
    pub fn len(&self) -> Option<usize> {
        match self {
            Node::Scalar(Scalar::Str(s)) => Some(s.chars().count()),
            Node::Sequence(items) => Some(items.len()),
            Node::Object(props) => Some(props.len()),
            _ => None,
        }
    }
}

/// 自定义规则：对声明类型向下转型后执行，返回错误信息
#[derive(Clone, Copy)]
pub struct CustomRule {
    pub name: &'static str,
    pub check: fn(&dyn Any) -> Option<String>,
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule").field("name", &self.name).finish()
    }
}

/// 声明式规则
#[derive(Clone, Copy, Debug)]
pub enum Rule {
    Required,
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
    Custom(CustomRule),
}

/// 元数据身份键（验证器缓存使用）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    model_type: TypeId,
    container: Option<TypeId>,
    variant: Option<&'static str>,
    property: Option<&'static str>,
}

/// 模型元数据
#[derive(Clone, Copy, Debug)]
pub struct ModelMetadata {
    model_type: TypeId,
    model_name: &'static str,
    container: Option<(TypeId, &'static str)>,
    variant: Option<&'static str>,
    property: Option<&'static str>,
    rules: &'static [Rule],
}

impl ModelMetadata {
    /// 类型级元数据
    pub fn for_type<T: ?Sized + 'static>(rules: &'static [Rule]) -> Self {
        Self {
            model_type: TypeId::of::<T>(),
            model_name: type_name::<T>(),
            container: None,
            variant: None,
            property: None,
            rules,
        }
    }

    /// 属性级元数据：容器类型 `C` 的字段 `name`，字段类型 `T`
    pub fn for_property<C: ?Sized + 'static, T: ?Sized + 'static>(
        name: &'static str,
        rules: &'static [Rule],
    ) -> Self {
        Self {
            model_type: TypeId::of::<T>(),
            model_name: type_name::<T>(),
            container: Some((TypeId::of::<C>(), type_name::<C>())),
            variant: None,
            property: Some(name),
            rules,
        }
    }

    /// 枚举变体字段：同名字段在不同变体下各有规则
    pub fn for_variant_property<C: ?Sized + 'static, T: ?Sized + 'static>(
        variant: &'static str,
        name: &'static str,
        rules: &'static [Rule],
    ) -> Self {
        Self {
            variant: Some(variant),
            ..Self::for_property::<C, T>(name, rules)
        }
    }

    pub fn key(&self) -> MetadataKey {
        MetadataKey {
            model_type: self.model_type,
            container: self.container.map(|(id, _)| id),
            variant: self.variant,
            property: self.property,
        }
    }

    pub fn model_type(&self) -> TypeId {
        self.model_type
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn container_name(&self) -> Option<&'static str> {
        self.container.map(|(_, name)| name)
    }

    pub fn variant_name(&self) -> Option<&'static str> {
        self.variant
    }

    pub fn property_name(&self) -> Option<&'static str> {
        self.property
    }

    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    /// 错误信息中使用的名称：属性名，或类型名最后一段
    pub fn display_name(&self) -> &'static str {
        if let Some(p) = self.property {
            return p;
        }
        let base = self.model_name.split('<').next().unwrap_or(self.model_name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

macro_rules! scalar_impls {
    ($variant:ident as $target:ty => $($t:ty),* $(,)?) => {
        $(
            impl Validate for $t {
                fn node(&self) -> Node<'_> {
                    Node::Scalar(Scalar::$variant(*self as $target))
                }
            }
        )*
    };
}

scalar_impls!(Int as i64 => i8, i16, i32, i64, isize);
scalar_impls!(UInt as u64 => u8, u16, u32, u64, usize);
scalar_impls!(Float as f64 => f32, f64);

impl Validate for bool {
    fn node(&self) -> Node<'_> {
        Node::Scalar(Scalar::Bool(*self))
    }
}

impl Validate for String {
    fn node(&self) -> Node<'_> {
        Node::Scalar(Scalar::Str(self.as_str()))
    }
}

impl Validate for &'static str {
    fn node(&self) -> Node<'_> {
        Node::Scalar(Scalar::Str(self))
    }
}

impl Validate for char {}
impl Validate for () {}
impl Validate for uuid::Uuid {}

impl<T: Validate> Validate for Option<T> {
    fn node(&self) -> Node<'_> {
        Node::Indirect(self.as_ref().map(|v| v as &dyn Validate))
    }
}

impl<T: Validate> Validate for Box<T> {
    fn node(&self) -> Node<'_> {
        Node::Indirect(Some(&**self))
    }
}

impl<T: Validate> Validate for Arc<T> {
    fn node(&self) -> Node<'_> {
        Node::Indirect(Some(&**self))
    }
}

impl<T: Validate> Validate for OnceLock<T> {
    fn node(&self) -> Node<'_> {
        Node::Indirect(self.get().map(|v| v as &dyn Validate))
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

impl<T: Validate> Validate for VecDeque<T> {
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

impl<T: Validate, const N: usize> Validate for [T; N] {
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

impl<T: Validate> Validate for Box<[T]> {
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

impl<T: Validate> Validate for Arc<[T]> {
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

impl<T: Validate> Validate for BTreeSet<T> {
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

impl<T, S> Validate for HashSet<T, S>
where
    T: Validate,
    S: Send + Sync + 'static,
{
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.iter().map(|v| v as &dyn Validate).collect())
    }
}

/// 映射只校验值，按迭代顺序编号
impl<K, V> Validate for BTreeMap<K, V>
where
    K: Send + Sync + 'static,
    V: Validate,
{
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.values().map(|v| v as &dyn Validate).collect())
    }
}

impl<K, V, S> Validate for HashMap<K, V, S>
where
    K: Send + Sync + 'static,
    V: Validate,
    S: Send + Sync + 'static,
{
    fn node(&self) -> Node<'_> {
        Node::Sequence(self.values().map(|v| v as &dyn Validate).collect())
    }
}
