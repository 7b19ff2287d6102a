//! Type classification.
//!
//! [`classify`] turns a source-level [`TypeRef`] into a [`TypeDescriptor`]:
//! the shape category the mapper registry dispatches on. Classification is a
//! pure function of the model, the type expression and its generic context.

use crate::error::{Error, Result};
use crate::model::{DefKind, GenericContext, TypeModel, TypeRef, OBJECT_TYPE};
use log::debug;
use serde::{Deserialize, Serialize};

/// Primitive types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    String,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
}

impl PrimitiveType {
    /// Parse a primitive type name
    pub fn parse(type_name: &str) -> Option<PrimitiveType> {
        match type_name {
            "String" | "str" => Some(PrimitiveType::String),
            "i8" => Some(PrimitiveType::I8),
            "i16" => Some(PrimitiveType::I16),
            "i32" => Some(PrimitiveType::I32),
            "i64" | "isize" => Some(PrimitiveType::I64),
            "i128" => Some(PrimitiveType::I128),
            "u8" => Some(PrimitiveType::U8),
            "u16" => Some(PrimitiveType::U16),
            "u32" => Some(PrimitiveType::U32),
            "u64" | "usize" => Some(PrimitiveType::U64),
            "u128" => Some(PrimitiveType::U128),
            "f32" => Some(PrimitiveType::F32),
            "f64" => Some(PrimitiveType::F64),
            "bool" => Some(PrimitiveType::Bool),
            "char" => Some(PrimitiveType::Char),
            _ => None,
        }
    }

    /// XML Schema type of the primitive
    pub fn xml_type(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::I8 => "byte",
            PrimitiveType::I16 => "short",
            PrimitiveType::I32 => "int",
            PrimitiveType::I64 => "long",
            PrimitiveType::I128 | PrimitiveType::U128 => "integer",
            PrimitiveType::U8 => "unsignedByte",
            PrimitiveType::U16 | PrimitiveType::Char => "unsignedShort",
            PrimitiveType::U32 => "unsignedInt",
            PrimitiveType::U64 => "unsignedLong",
            PrimitiveType::F32 => "float",
            PrimitiveType::F64 => "double",
            PrimitiveType::Bool => "boolean",
        }
    }

    /// Inclusive integer range, for integer primitives narrower than 128 bits
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        match self {
            PrimitiveType::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            PrimitiveType::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            PrimitiveType::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            PrimitiveType::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            PrimitiveType::U8 => Some((0, u8::MAX as i128)),
            PrimitiveType::U16 => Some((0, u16::MAX as i128)),
            PrimitiveType::U32 => Some((0, u32::MAX as i128)),
            PrimitiveType::U64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::String
                | PrimitiveType::F32
                | PrimitiveType::F64
                | PrimitiveType::Bool
                | PrimitiveType::Char
        )
    }
}

/// Concrete container a collection converts into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionFlavor {
    Vec,
    VecDeque,
    LinkedList,
    HashSet,
    BTreeSet,
    Array,
}

impl CollectionFlavor {
    /// Concrete flavor for a collection raw type, substituting abstract requests
    pub fn for_raw(raw: &str) -> Option<CollectionFlavor> {
        match raw {
            "Vec" | "Collection" | "List" | "Queue" => Some(CollectionFlavor::Vec),
            "VecDeque" => Some(CollectionFlavor::VecDeque),
            "LinkedList" => Some(CollectionFlavor::LinkedList),
            "HashSet" | "Set" => Some(CollectionFlavor::HashSet),
            "BTreeSet" | "SortedSet" => Some(CollectionFlavor::BTreeSet),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, CollectionFlavor::HashSet | CollectionFlavor::BTreeSet)
    }
}

/// Concrete container a map converts into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapFlavor {
    HashMap,
    BTreeMap,
}

impl MapFlavor {
    pub fn for_raw(raw: &str) -> Option<MapFlavor> {
        match raw {
            "HashMap" | "Map" => Some(MapFlavor::HashMap),
            "BTreeMap" => Some(MapFlavor::BTreeMap),
            _ => None,
        }
    }
}

/// Abstract collection and map requests, substituted by a concrete default
pub const ABSTRACT_CONTAINERS: &[&str] = &["Collection", "List", "Queue", "Set", "SortedSet", "Map"];

/// Well-known scalar types handled by built-in custom mappers
pub const EXTERNAL_SCALARS: &[&str] = &["Uuid", "QName", "Url", "DateTime"];

const TRANSPARENT_WRAPPERS: &[&str] = &["Box", "Rc", "Arc", "Cow"];
const BYTE_SEQUENCES: &[&str] = &["Bytes", "ByteBuf"];

/// Shape category of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    /// A sequence of single-byte values
    Bytes,
    Enum,
    Collection(CollectionFlavor),
    Map(MapFlavor),
    Array,
    Bean,
    /// Interface-like, opaque, or external scalar type
    Reference,
}

/// Classification of a type, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    raw: String,
    kind: TypeKind,
    args: Vec<TypeDescriptor>,
    adapter: Option<String>,
    nullable: bool,
}

impl TypeDescriptor {
    fn new(raw: &str, kind: TypeKind, args: Vec<TypeDescriptor>) -> Self {
        Self {
            raw: raw.to_string(),
            kind,
            args,
            adapter: None,
            nullable: false,
        }
    }

    /// The opaque object descriptor
    pub fn opaque() -> Self {
        Self::new(OBJECT_TYPE, TypeKind::Reference, Vec::new())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn args(&self) -> &[TypeDescriptor] {
        &self.args
    }

    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == TypeKind::Reference && self.raw == OBJECT_TYPE
    }

    /// Whether the raw type was an abstract container request
    pub fn is_abstract_request(&self) -> bool {
        ABSTRACT_CONTAINERS.contains(&self.raw.as_str())
    }

    /// Same descriptor carrying an adapter
    pub fn with_adapter(mut self, adapter: Option<&str>) -> Self {
        self.adapter = adapter.map(str::to_string);
        self
    }

    /// Same descriptor marked nullable
    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Element descriptor of a collection, array or byte sequence
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match self.kind {
            TypeKind::Collection(_) | TypeKind::Array => self.args.first(),
            _ => None,
        }
    }

    /// Structural type expression with wrappers stripped and variables resolved
    pub fn canonical(&self) -> TypeRef {
        match self.kind {
            TypeKind::Array => TypeRef::Array(Box::new(
                self.args
                    .first()
                    .map(TypeDescriptor::canonical)
                    .unwrap_or_else(TypeRef::object),
            )),
            _ => TypeRef::Named {
                name: self.raw.clone(),
                args: self.args.iter().map(TypeDescriptor::canonical).collect(),
            },
        }
    }
}

/// Classify a type expression in a generic context
pub fn classify(model: &TypeModel, type_ref: &TypeRef, context: &GenericContext) -> Result<TypeDescriptor> {
    let descriptor = classify_inner(model, type_ref, context, 0).map_err(|err| match err {
        Error::Classification { reason, .. } if reason == UNBOUNDED_NESTING => Error::Classification {
            type_name: growing_type(model, type_ref),
            reason,
        },
        other => other,
    })?;
    debug!("Classified {} as {:?}", type_ref, descriptor.kind);
    Ok(descriptor)
}

const MAX_BINDING_DEPTH: usize = 64;
const UNBOUNDED_NESTING: &str = "generic arguments nest without bound";

/// Outermost model type of an expression, the one whose arguments keep nesting
fn growing_type(model: &TypeModel, type_ref: &TypeRef) -> String {
    let mut current = type_ref;
    loop {
        let next = match current {
            TypeRef::Named { name, .. } if model.type_def(name).is_some() => return name.clone(),
            TypeRef::Named { args, .. } => args.first(),
            TypeRef::Array(element) => Some(element.as_ref()),
            TypeRef::Wildcard(Some(bound)) => Some(bound.as_ref()),
            _ => None,
        };
        match next {
            Some(next) => current = next,
            None => return type_ref.to_string(),
        }
    }
}

fn classify_inner(
    model: &TypeModel,
    type_ref: &TypeRef,
    context: &GenericContext,
    depth: usize,
) -> Result<TypeDescriptor> {
    if depth > MAX_BINDING_DEPTH {
        return Err(Error::Classification {
            type_name: type_ref.to_string(),
            reason: UNBOUNDED_NESTING.to_string(),
        });
    }

    match type_ref {
        TypeRef::Var(name) => match context.get(name) {
            Some(bound) => classify_inner(model, bound, context, depth + 1),
            None => Ok(TypeDescriptor::opaque()),
        },
        // a bound outside the model (Send, Display, ...) says nothing about the mapping
        TypeRef::Wildcard(Some(bound)) => match bound.raw_name() {
            Some(name) if model.type_def(name).is_none() => Ok(TypeDescriptor::opaque()),
            _ => classify_inner(model, bound, context, depth + 1),
        },
        TypeRef::Wildcard(None) => Ok(TypeDescriptor::opaque()),
        TypeRef::Unsupported(text) => Err(Error::Classification {
            type_name: text.clone(),
            reason: "unsupported type shape".to_string(),
        }),
        TypeRef::Array(element) => {
            let element = classify_inner(model, element, context, depth + 1)?;
            if is_single_byte(&element) {
                return Ok(TypeDescriptor::new("[u8]", TypeKind::Bytes, Vec::new()));
            }
            Ok(TypeDescriptor::new("[]", TypeKind::Array, vec![element]))
        }
        TypeRef::Named { name, args } => classify_named(model, name, args, context, depth),
    }
}

fn classify_named(
    model: &TypeModel,
    name: &str,
    args: &[TypeRef],
    context: &GenericContext,
    depth: usize,
) -> Result<TypeDescriptor> {
    let arg = |index: usize| -> Result<TypeDescriptor> {
        match args.get(index) {
            Some(arg) => classify_inner(model, arg, context, depth + 1),
            None => Ok(TypeDescriptor::opaque()),
        }
    };

    if name == "Option" {
        let mut inner = arg(0)?;
        inner.nullable = true;
        return Ok(inner);
    }
    if TRANSPARENT_WRAPPERS.contains(&name) {
        return arg(0);
    }
    if let Some(primitive) = PrimitiveType::parse(name) {
        return Ok(TypeDescriptor::new(name_of(primitive, name), TypeKind::Primitive(primitive), Vec::new()));
    }
    if BYTE_SEQUENCES.contains(&name) {
        return Ok(TypeDescriptor::new(name, TypeKind::Bytes, Vec::new()));
    }
    if let Some(flavor) = CollectionFlavor::for_raw(name) {
        let element = arg(0)?;
        if name == "Vec" && is_single_byte(&element) {
            return Ok(TypeDescriptor::new(name, TypeKind::Bytes, vec![element]));
        }
        return Ok(TypeDescriptor::new(name, TypeKind::Collection(flavor), vec![element]));
    }
    if let Some(flavor) = MapFlavor::for_raw(name) {
        let key = arg(0)?;
        let value = arg(1)?;
        return Ok(TypeDescriptor::new(name, TypeKind::Map(flavor), vec![key, value]));
    }
    if name == OBJECT_TYPE {
        return Ok(TypeDescriptor::opaque());
    }
    if EXTERNAL_SCALARS.contains(&name) {
        return Ok(TypeDescriptor::new(name, TypeKind::Reference, Vec::new()));
    }

    let Some(def) = model.type_def(name) else {
        return Err(Error::Classification {
            type_name: name.to_string(),
            reason: "not declared in the model".to_string(),
        });
    };

    let kind = match def.kind {
        DefKind::Bean => TypeKind::Bean,
        DefKind::Enum => TypeKind::Enum,
        DefKind::Trait => TypeKind::Reference,
    };

    // every declared generic parameter gets an argument: given, else its bound, else opaque
    let mut resolved_args = Vec::with_capacity(def.generics.len());
    for (index, param) in def.generics.iter().enumerate() {
        let resolved = match (args.get(index), &param.bound) {
            (Some(arg), _) => classify_inner(model, arg, context, depth + 1)?,
            (None, Some(bound)) => classify_inner(model, bound, context, depth + 1)?,
            (None, None) => TypeDescriptor::opaque(),
        };
        resolved_args.push(resolved);
    }
    if args.len() > def.generics.len() {
        return Err(Error::Classification {
            type_name: name.to_string(),
            reason: format!(
                "expected {} generic arguments, found {}",
                def.generics.len(),
                args.len()
            ),
        });
    }

    Ok(TypeDescriptor::new(name, kind, resolved_args))
}

fn name_of(primitive: PrimitiveType, name: &str) -> &str {
    match primitive {
        PrimitiveType::String => "String",
        _ => name,
    }
}

fn is_single_byte(descriptor: &TypeDescriptor) -> bool {
    matches!(
        descriptor.kind,
        TypeKind::Primitive(PrimitiveType::U8) | TypeKind::Primitive(PrimitiveType::I8)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GenericParam, ModelBuilder, PropertyDef, TypeDef};

    fn model() -> TypeModel {
        let mut builder = ModelBuilder::new();
        let mut page = TypeDef::bean("Page");
        page.generics.push(GenericParam {
            name: "T".to_string(),
            bound: None,
        });
        page.properties.push(PropertyDef::new(
            "items",
            TypeRef::generic("Vec", vec![TypeRef::Var("T".to_string())]),
        ));
        builder
            .add_type(TypeDef::bean("User"))
            .add_type(TypeDef::enumeration("Status", &["Active", "Inactive"]))
            .add_type(TypeDef::new("Shape", DefKind::Trait))
            .add_type(page);
        builder.build().unwrap()
    }

    fn classify_plain(model: &TypeModel, type_ref: &TypeRef) -> TypeDescriptor {
        classify(model, type_ref, &GenericContext::new()).unwrap()
    }

    #[test]
    fn test_classify_primitives() {
        let model = model();
        let cases = vec![
            ("String", PrimitiveType::String),
            ("str", PrimitiveType::String),
            ("i32", PrimitiveType::I32),
            ("u64", PrimitiveType::U64),
            ("bool", PrimitiveType::Bool),
            ("char", PrimitiveType::Char),
        ];
        for (name, expected) in cases {
            let descriptor = classify_plain(&model, &TypeRef::named(name));
            assert_eq!(descriptor.kind(), TypeKind::Primitive(expected), "{}", name);
        }
        assert_eq!(classify_plain(&model, &TypeRef::named("str")).raw(), "String");
    }

    #[test]
    fn test_classify_byte_sequences() {
        let model = model();
        let vec_u8 = TypeRef::generic("Vec", vec![TypeRef::named("u8")]);
        let array_i8 = TypeRef::array(TypeRef::named("i8"));
        assert_eq!(classify_plain(&model, &vec_u8).kind(), TypeKind::Bytes);
        assert_eq!(classify_plain(&model, &array_i8).kind(), TypeKind::Bytes);

        let array_i32 = TypeRef::array(TypeRef::named("i32"));
        let descriptor = classify_plain(&model, &array_i32);
        assert_eq!(descriptor.kind(), TypeKind::Array);
        assert_eq!(
            descriptor.element().unwrap().kind(),
            TypeKind::Primitive(PrimitiveType::I32)
        );
    }

    #[test]
    fn test_abstract_collections_substitute_concrete_flavor() {
        let model = model();
        let cases = vec![
            ("List", CollectionFlavor::Vec),
            ("Collection", CollectionFlavor::Vec),
            ("Set", CollectionFlavor::HashSet),
            ("SortedSet", CollectionFlavor::BTreeSet),
            ("VecDeque", CollectionFlavor::VecDeque),
        ];
        for (raw, flavor) in cases {
            let type_ref = TypeRef::generic(raw, vec![TypeRef::named("String")]);
            let descriptor = classify_plain(&model, &type_ref);
            assert_eq!(descriptor.kind(), TypeKind::Collection(flavor), "{}", raw);
            assert_eq!(descriptor.raw(), raw);
        }
        let map = classify_plain(&model, &TypeRef::named("Map"));
        assert_eq!(map.kind(), TypeKind::Map(MapFlavor::HashMap));
        assert!(map.is_abstract_request());
        assert!(map.args().iter().all(TypeDescriptor::is_opaque));
    }

    #[test]
    fn test_option_and_wrappers() {
        let model = model();
        let option = TypeRef::generic("Option", vec![TypeRef::generic("Box", vec![TypeRef::named("User")])]);
        let descriptor = classify_plain(&model, &option);
        assert_eq!(descriptor.kind(), TypeKind::Bean);
        assert_eq!(descriptor.raw(), "User");
        assert!(descriptor.nullable());
        assert_eq!(descriptor.canonical(), TypeRef::named("User"));
    }

    #[test]
    fn test_type_variables_and_wildcards() {
        let model = model();
        let unbound = classify_plain(&model, &TypeRef::Var("T".to_string()));
        assert!(unbound.is_opaque());

        let mut context = GenericContext::new();
        context.insert("T".to_string(), TypeRef::named("User"));
        let bound = classify(&model, &TypeRef::Var("T".to_string()), &context).unwrap();
        assert_eq!(bound.raw(), "User");

        let wildcard = TypeRef::Wildcard(Some(Box::new(TypeRef::named("Shape"))));
        assert_eq!(classify_plain(&model, &wildcard).kind(), TypeKind::Reference);
        assert!(classify_plain(&model, &TypeRef::Wildcard(None)).is_opaque());

        let send = TypeRef::Wildcard(Some(Box::new(TypeRef::named("Send"))));
        assert!(classify_plain(&model, &send).is_opaque());
        let boxed_display = TypeRef::generic(
            "Box",
            vec![TypeRef::Wildcard(Some(Box::new(TypeRef::named("Display"))))],
        );
        assert!(classify_plain(&model, &boxed_display).is_opaque());
    }

    #[test]
    fn test_generic_bean_arguments() {
        let model = model();
        let raw_page = classify_plain(&model, &TypeRef::named("Page"));
        assert_eq!(raw_page.args().len(), 1);
        assert!(raw_page.args()[0].is_opaque());

        let page_of_user = TypeRef::generic("Page", vec![TypeRef::named("User")]);
        let descriptor = classify_plain(&model, &page_of_user);
        assert_eq!(descriptor.args()[0].raw(), "User");
        assert_eq!(descriptor.canonical(), page_of_user);
    }

    #[test]
    fn test_classification_errors() {
        let model = model();
        let unknown = classify(&model, &TypeRef::named("Nope"), &GenericContext::new());
        assert!(matches!(unknown, Err(Error::Classification { .. })));

        let tuple = classify(
            &model,
            &TypeRef::Unsupported("(i32, i32)".to_string()),
            &GenericContext::new(),
        );
        assert!(matches!(tuple, Err(Error::Classification { .. })));

        let too_many = TypeRef::generic("User", vec![TypeRef::named("i32")]);
        assert!(classify(&model, &too_many, &GenericContext::new()).is_err());
    }

    #[test]
    fn test_unbounded_nesting_names_the_growing_type() {
        let model = model();
        let mut nested = TypeRef::named("i32");
        for _ in 0..80 {
            nested = TypeRef::generic("Vec", vec![nested]);
        }
        let page = TypeRef::generic(
            "Option",
            vec![TypeRef::generic("Page", vec![nested])],
        );
        match classify(&model, &page, &GenericContext::new()) {
            Err(Error::Classification { type_name, reason }) => {
                assert_eq!(type_name, "Page");
                assert_eq!(reason, UNBOUNDED_NESTING);
            }
            other => panic!("Expected classification error, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_trait_and_scalars() {
        let model = model();
        assert_eq!(classify_plain(&model, &TypeRef::named("Status")).kind(), TypeKind::Enum);
        assert_eq!(classify_plain(&model, &TypeRef::named("Shape")).kind(), TypeKind::Reference);
        assert_eq!(classify_plain(&model, &TypeRef::named("Uuid")).kind(), TypeKind::Reference);
        let timestamp = TypeRef::generic("DateTime", vec![TypeRef::named("Utc")]);
        assert_eq!(classify_plain(&model, &timestamp).raw(), "DateTime");
        assert_eq!(classify_plain(&model, &TypeRef::named("Url")).kind(), TypeKind::Reference);
        assert!(classify_plain(&model, &TypeRef::named("Object")).is_opaque());
    }
}
