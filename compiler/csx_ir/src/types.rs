//! Static type model.
//!
//! Types are small immutable values compared structurally. Nominal types
//! (classes, structs, interfaces) are described by a [`TypeDef`] whose
//! identity is its name plus generic arguments; members are part of the
//! definition but not of its identity.
//!
//! # Assignability
//!
//! [`Type::is_assignable_from`] models the conversions a pattern or variable
//! binding may rely on without changing representation:
//!
//! - identity
//! - boxing into `object`
//! - wrapping `T` into `T?`
//! - base-class chains and interface implementation (tuples implement `ITuple`)
//!
//! Numeric widening is deliberately not an assignability relation; it is a
//! `Convert` node.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::runtime::{self, Intrinsic};

/// A static type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Char,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Object,
    /// `System.Index`: a position counted from the start or from the end.
    Index,
    /// `System.Range`: a pair of [`Type::Index`] bounds.
    Range,
    Nullable(Arc<Type>),
    Tuple(Arc<[Type]>),
    Array(Arc<Type>),
    ByRef(Arc<Type>),
    Pointer(Arc<Type>),
    /// Delegate type of a lambda: parameter types and return type.
    Func(Arc<[Type]>, Arc<Type>),
    Named(Arc<TypeDef>),
}

impl Type {
    pub fn nullable(underlying: Type) -> Type {
        Type::Nullable(Arc::new(underlying))
    }

    pub fn tuple(elements: Vec<Type>) -> Type {
        Type::Tuple(elements.into())
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Arc::new(element))
    }

    pub fn by_ref(target: Type) -> Type {
        Type::ByRef(Arc::new(target))
    }

    pub fn pointer(target: Type) -> Type {
        Type::Pointer(Arc::new(target))
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Func(params.into(), Arc::new(ret))
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Value types are copied on assignment and can never be `null`
    /// (except through [`Type::Nullable`], which is itself a value type).
    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Bool
            | Type::Char
            | Type::Int32
            | Type::Int64
            | Type::Float32
            | Type::Float64
            | Type::Index
            | Type::Range
            | Type::Nullable(_)
            | Type::Tuple(_) => true,
            Type::Named(def) => def.kind == TypeDefKind::Struct,
            _ => false,
        }
    }

    pub fn is_reference_type(&self) -> bool {
        match self {
            Type::String | Type::Object | Type::Array(_) | Type::Func(..) => true,
            Type::Named(def) => def.kind != TypeDefKind::Struct,
            _ => false,
        }
    }

    /// Whether a value of this type can be `null` at runtime.
    pub fn can_be_null(&self) -> bool {
        self.is_reference_type() || self.is_nullable()
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// `T` for `T?`, `None` otherwise.
    pub fn nullable_underlying(&self) -> Option<&Type> {
        match self {
            Type::Nullable(inner) => Some(inner),
            _ => None,
        }
    }

    /// The type itself, or `T` for `T?`.
    pub fn non_nullable(&self) -> &Type {
        self.nullable_underlying().unwrap_or(self)
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, Type::Named(def) if def.kind == TypeDefKind::Interface)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Int32 | Type::Int64 | Type::Float32 | Type::Float64
        )
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, Type::Float32 | Type::Float64)
    }

    pub fn is_by_ref_or_pointer(&self) -> bool {
        matches!(self, Type::ByRef(_) | Type::Pointer(_))
    }

    pub fn tuple_elements(&self) -> Option<&[Type]> {
        match self {
            Type::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Element type of arrays and strings.
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Array(element) => Some((**element).clone()),
            Type::String => Some(Type::Char),
            _ => None,
        }
    }

    pub fn func_signature(&self) -> Option<(&[Type], &Type)> {
        match self {
            Type::Func(params, ret) => Some((params, ret)),
            _ => None,
        }
    }

    pub fn type_def(&self) -> Option<&TypeDef> {
        match self {
            Type::Named(def) => Some(def),
            _ => None,
        }
    }

    /// Direct base class. Every non-interface reference type other than
    /// `object` ultimately derives from `object`.
    pub fn base_type(&self) -> Option<Type> {
        match self {
            Type::Named(def) => def.base.clone(),
            _ => None,
        }
    }

    /// Whether this type lists `iface` among its interfaces, directly or
    /// through a base type or another interface.
    pub fn implements(&self, iface: &Type) -> bool {
        match self {
            Type::Tuple(_) => *iface == runtime::ituple(),
            Type::Named(def) => {
                def.interfaces
                    .iter()
                    .any(|i| i == iface || i.implements(iface))
                    || def.base.as_ref().is_some_and(|b| b.implements(iface))
            }
            _ => false,
        }
    }

    /// Whether `self` derives from `ancestor` through base classes.
    pub fn derives_from(&self, ancestor: &Type) -> bool {
        let mut current = self.base_type();
        while let Some(base) = current {
            if base == *ancestor {
                return true;
            }
            current = base.base_type();
        }
        false
    }

    /// Identity, boxing, nullable wrapping, base chain and interface
    /// assignability: a value of `source` can be stored in a location of
    /// type `self` without a representation-changing conversion.
    pub fn is_assignable_from(&self, source: &Type) -> bool {
        if self == source {
            return true;
        }
        if source.is_void() || source.is_by_ref_or_pointer() {
            return false;
        }
        match self {
            Type::Object => true,
            Type::Nullable(inner) => **inner == *source,
            _ if self.is_interface() => source.implements(self),
            Type::Named(_) => source.derives_from(self),
            _ => false,
        }
    }

    /// `self` is strictly narrower than `other`: every value of `self` is a
    /// value of `other`, and the two differ.
    pub fn is_more_specific_than(&self, other: &Type) -> bool {
        self != other && other.is_assignable_from(self)
    }

    /// Look up a field, property or tuple element by name, walking base
    /// classes.
    pub fn find_member(&self, name: &str) -> Option<MemberInfo> {
        match self {
            Type::Tuple(elements) => {
                let index = tuple_item_index(name)?;
                let ty = elements.get(index)?.clone();
                Some(MemberInfo::tuple_item(self.clone(), index, ty))
            }
            Type::Array(_) | Type::String if name == "Length" => Some(MemberInfo {
                declaring: self.clone(),
                name: Arc::from("Length"),
                ty: Type::Int32,
                kind: MemberKind::Property,
                body: MethodBody::Intrinsic(Intrinsic::CollectionLength),
            }),
            Type::Named(def) => def
                .fields
                .iter()
                .find(|f| &*f.name == name)
                .map(|f| MemberInfo {
                    declaring: self.clone(),
                    name: f.name.clone(),
                    ty: f.ty.clone(),
                    kind: f.kind,
                    body: f.body.clone(),
                })
                .or_else(|| def.base.as_ref().and_then(|b| b.find_member(name))),
            _ => None,
        }
    }

    /// Look up a method by name and parameter count, walking base classes
    /// and, for interfaces, inherited interfaces.
    pub fn find_method(&self, name: &str, arity: usize) -> Option<MethodInfo> {
        let Type::Named(def) = self else {
            return None;
        };
        def.methods
            .iter()
            .find(|m| &*m.name == name && m.params.len() == arity)
            .map(|m| MethodInfo::new(Some(self.clone()), m.clone()))
            .or_else(|| def.base.as_ref().and_then(|b| b.find_method(name, arity)))
            .or_else(|| {
                def.interfaces
                    .iter()
                    .find_map(|i| i.find_method(name, arity))
            })
    }
}

/// `Item1` → 0, `Item2` → 1, …
fn tuple_item_index(name: &str) -> Option<usize> {
    let n: usize = name.strip_prefix("Item")?.parse().ok()?;
    n.checked_sub(1)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Bool => f.write_str("bool"),
            Type::Char => f.write_str("char"),
            Type::Int32 => f.write_str("int"),
            Type::Int64 => f.write_str("long"),
            Type::Float32 => f.write_str("float"),
            Type::Float64 => f.write_str("double"),
            Type::String => f.write_str("string"),
            Type::Object => f.write_str("object"),
            Type::Index => f.write_str("Index"),
            Type::Range => f.write_str("Range"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Tuple(elements) => {
                f.write_str("(")?;
                write_list(f, elements)?;
                f.write_str(")")
            }
            Type::Array(element) => write!(f, "{element}[]"),
            Type::ByRef(target) => write!(f, "{target}&"),
            Type::Pointer(target) => write!(f, "{target}*"),
            Type::Func(params, ret) => {
                f.write_str("Func<")?;
                write_list(f, params)?;
                if !params.is_empty() {
                    f.write_str(", ")?;
                }
                write!(f, "{ret}>")
            }
            Type::Named(def) => {
                f.write_str(&def.name)?;
                if !def.args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, &def.args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[Type]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

// ── Nominal types ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeDefKind {
    Class,
    Struct,
    Interface,
}

/// Definition of a nominal type.
///
/// Identity is `name` + `args`; two definitions with the same name and
/// generic arguments are the same type even if built separately.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: Arc<str>,
    pub args: Vec<Type>,
    pub kind: TypeDefKind,
    pub base: Option<Type>,
    pub interfaces: Vec<Type>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl PartialEq for TypeDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl Eq for TypeDef {}

impl Hash for TypeDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.hash(state);
    }
}

/// A field or property declared on a [`TypeDef`].
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: Arc<str>,
    pub ty: Type,
    pub kind: MemberKind,
    pub body: MethodBody,
}

/// A method declared on a [`TypeDef`]. The declaring type is attached when
/// the method is looked up, see [`Type::find_method`].
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    pub name: Arc<str>,
    pub params: Vec<ParamInfo>,
    pub ret: Type,
    pub is_static: bool,
    pub body: MethodBody,
}

impl MethodDef {
    pub fn new(name: &str, params: Vec<ParamInfo>, ret: Type, body: MethodBody) -> Self {
        Self {
            name: Arc::from(name),
            params,
            ret,
            is_static: false,
            body,
        }
    }

    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// Fluent construction of nominal types.
///
/// ```text
/// let point = TypeBuilder::class("Point")
///     .property("X", Type::Int32)
///     .property("Y", Type::Int32)
///     .build();
/// ```
pub struct TypeBuilder {
    def: TypeDef,
}

impl TypeBuilder {
    fn new(name: &str, kind: TypeDefKind) -> Self {
        let base = match kind {
            TypeDefKind::Class => Some(Type::Object),
            TypeDefKind::Struct | TypeDefKind::Interface => None,
        };
        Self {
            def: TypeDef {
                name: Arc::from(name),
                args: Vec::new(),
                kind,
                base,
                interfaces: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, TypeDefKind::Class)
    }

    pub fn structure(name: &str) -> Self {
        Self::new(name, TypeDefKind::Struct)
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name, TypeDefKind::Interface)
    }

    #[must_use]
    pub fn generic_args(mut self, args: Vec<Type>) -> Self {
        self.def.args = args;
        self
    }

    #[must_use]
    pub fn base(mut self, base: Type) -> Self {
        self.def.base = Some(base);
        self
    }

    #[must_use]
    pub fn implements(mut self, iface: Type) -> Self {
        self.def.interfaces.push(iface);
        self
    }

    #[must_use]
    pub fn field(self, name: &str, ty: Type) -> Self {
        self.member(name, ty, MemberKind::Field, MethodBody::Stored)
    }

    /// An auto-property backed by object storage.
    #[must_use]
    pub fn property(self, name: &str, ty: Type) -> Self {
        self.member(name, ty, MemberKind::Property, MethodBody::Stored)
    }

    #[must_use]
    pub fn computed_property(self, name: &str, ty: Type, body: MethodBody) -> Self {
        self.member(name, ty, MemberKind::Property, body)
    }

    fn member(mut self, name: &str, ty: Type, kind: MemberKind, body: MethodBody) -> Self {
        self.def.fields.push(FieldDef {
            name: Arc::from(name),
            ty,
            kind,
            body,
        });
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodDef) -> Self {
        self.def.methods.push(method);
        self
    }

    pub fn build(self) -> Type {
        Type::Named(Arc::new(self.def))
    }
}

// ── Members and methods ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
    /// `ItemN` of a value tuple (0-based index).
    TupleItem(usize),
}

/// How a method or computed property is executed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MethodBody {
    /// Plain storage on the receiver object.
    Stored,
    /// Part of the well-known runtime surface.
    Intrinsic(Intrinsic),
    /// Supplied by the embedding host under this key.
    Host(Arc<str>),
}

/// A resolved field, property or tuple element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    pub declaring: Type,
    pub name: Arc<str>,
    pub ty: Type,
    pub kind: MemberKind,
    pub body: MethodBody,
}

impl MemberInfo {
    pub fn tuple_item(tuple: Type, index: usize, ty: Type) -> Self {
        Self {
            declaring: tuple,
            name: Arc::from(format!("Item{}", index + 1)),
            ty,
            kind: MemberKind::TupleItem(index),
            body: MethodBody::Stored,
        }
    }
}

/// A method parameter. Out parameters have a [`Type::ByRef`] type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: Arc<str>,
    pub ty: Type,
}

impl ParamInfo {
    pub fn new(name: &str, ty: Type) -> Self {
        Self {
            name: Arc::from(name),
            ty,
        }
    }

    #[inline]
    pub fn is_out(&self) -> bool {
        matches!(self.ty, Type::ByRef(_))
    }
}

/// A resolved method: a [`MethodDef`] plus its declaring type.
#[derive(Clone)]
pub struct MethodInfo(Arc<MethodData>);

#[derive(Debug)]
pub struct MethodData {
    pub declaring: Option<Type>,
    pub def: MethodDef,
}

impl MethodInfo {
    pub fn new(declaring: Option<Type>, def: MethodDef) -> Self {
        Self(Arc::new(MethodData { declaring, def }))
    }

    pub fn declaring(&self) -> Option<&Type> {
        self.0.declaring.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.0.def.name
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.0.def.params
    }

    pub fn return_type(&self) -> &Type {
        &self.0.def.ret
    }

    pub fn is_static(&self) -> bool {
        self.0.def.is_static
    }

    pub fn body(&self) -> &MethodBody {
        &self.0.def.body
    }

    pub fn ptr_eq(&self, other: &MethodInfo) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for MethodInfo {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.0.declaring == other.0.declaring && self.0.def == other.0.def)
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(declaring) = self.declaring() {
            write!(f, "{declaring}.")?;
        }
        write!(f, "{}(", self.name())?;
        write_list(
            f,
            &self.params().iter().map(|p| p.ty.clone()).collect::<Vec<_>>(),
        )?;
        write!(f, ") -> {}", self.return_type())
    }
}
