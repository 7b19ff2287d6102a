//! Mapper variants and the pluggable mapper/adapter traits.
//!
//! Mappers live in the resolver's arena and refer to each other through
//! [`MapperId`]s, so a bean mapper can point back at itself (directly or
//! through other mappers) without owning a cycle.

pub mod builtin;

use crate::descriptor::{CollectionFlavor, MapFlavor, PrimitiveType, TypeDescriptor};
use crate::model::{AdapterDecl, GlobalDeclaration, QName, TypeRef};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Handle of a mapper slot in the resolver's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MapperId(pub(crate) usize);

impl MapperId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MapperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// External representation of a mapped type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalType {
    /// Qualified external (wire) name
    pub qname: QName,
    /// XML Schema type
    pub xml_type: QName,
}

/// XML Schema namespace
pub const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

impl ExternalType {
    pub fn schema(local: &str) -> Self {
        Self {
            qname: QName::new(None, local),
            xml_type: QName::new(Some(XS_NAMESPACE), local),
        }
    }

    /// A named (model-declared) type: its XML type is its own qualified name
    pub fn named(qname: QName) -> Self {
        Self {
            xml_type: qname.clone(),
            qname,
        }
    }
}

/// User-supplied escape hatch for types the built-in strategies cannot map
pub trait CustomMapper: Send + Sync + fmt::Debug {
    /// Name used to refer to the mapper from annotations
    fn name(&self) -> &str;

    /// External representation produced by this mapper
    fn external_type(&self) -> ExternalType {
        ExternalType::schema("anyType")
    }

    fn to_external(&self, value: &Value) -> Result<Value, String>;

    fn to_internal(&self, value: &Value) -> Result<Value, String>;
}

/// Transform pair between a bound (internal) type and a value (external) type
pub trait TypeAdapter: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Type the adapter produces on the way out
    fn value_type(&self) -> TypeRef;

    fn marshal(&self, value: &Value) -> Result<Value, String>;

    fn unmarshal(&self, value: &Value) -> Result<Value, String>;
}

/// Adapter known only from its declaration; values pass through unchanged
#[derive(Debug, Clone)]
pub struct DeclaredAdapter {
    decl: AdapterDecl,
}

impl DeclaredAdapter {
    pub fn new(decl: AdapterDecl) -> Self {
        Self { decl }
    }
}

impl TypeAdapter for DeclaredAdapter {
    fn name(&self) -> &str {
        &self.decl.name
    }

    fn value_type(&self) -> TypeRef {
        self.decl.value_type.clone()
    }

    fn marshal(&self, value: &Value) -> Result<Value, String> {
        Ok(value.clone())
    }

    fn unmarshal(&self, value: &Value) -> Result<Value, String> {
        Ok(value.clone())
    }
}

/// One mapped bean property
#[derive(Debug, Clone)]
pub struct PropertyMapping {
    pub name: String,
    pub wire_name: String,
    pub declared_in: String,
    pub attribute: bool,
    pub required: bool,
    pub mapper: MapperId,
}

/// Bean mapper: fixed, ordered property mappings
#[derive(Debug, Clone)]
pub struct BeanMapper {
    pub internal_type: String,
    pub external_type: QName,
    pub properties: Vec<PropertyMapping>,
}

/// Enum mapper: literal to external value table
#[derive(Debug, Clone)]
pub struct EnumMapper {
    pub type_name: String,
    pub table: Vec<(String, String)>,
}

impl EnumMapper {
    pub fn external_of(&self, literal: &str) -> Option<&str> {
        self.table
            .iter()
            .find(|(l, _)| l == literal)
            .map(|(_, e)| e.as_str())
    }

    pub fn literal_of(&self, external: &str) -> Option<&str> {
        self.table
            .iter()
            .find(|(_, e)| e == external)
            .map(|(l, _)| l.as_str())
    }
}

/// A candidate of a choice group
#[derive(Debug, Clone)]
pub struct ChoiceCandidate {
    pub declaration: GlobalDeclaration,
    pub mapper: MapperId,
}

/// Mapper variants
#[derive(Debug, Clone)]
pub enum Mapper {
    Primitive(PrimitiveType),
    Bytes,
    Enum(EnumMapper),
    Collection {
        element: MapperId,
        flavor: CollectionFlavor,
    },
    Array {
        element: MapperId,
    },
    Map {
        key: MapperId,
        value: MapperId,
        flavor: MapFlavor,
    },
    Adapting {
        inner: MapperId,
        adapter: Arc<dyn TypeAdapter>,
    },
    Bean(BeanMapper),
    Choice(Vec<ChoiceCandidate>),
    /// Opaque object: dispatches on the runtime type of each value
    Dynamic,
    Custom(Arc<dyn CustomMapper>),
}

impl Mapper {
    /// Short variant name for logs and reports
    pub fn variant(&self) -> &'static str {
        match self {
            Mapper::Primitive(_) => "primitive",
            Mapper::Bytes => "bytes",
            Mapper::Enum(_) => "enum",
            Mapper::Collection { .. } => "collection",
            Mapper::Array { .. } => "array",
            Mapper::Map { .. } => "map",
            Mapper::Adapting { .. } => "adapting",
            Mapper::Bean(_) => "bean",
            Mapper::Choice(_) => "choice",
            Mapper::Dynamic => "dynamic",
            Mapper::Custom(_) => "custom",
        }
    }

    /// Mappers this one delegates to
    pub fn nested(&self) -> Vec<MapperId> {
        match self {
            Mapper::Collection { element, .. } | Mapper::Array { element } => vec![*element],
            Mapper::Map { key, value, .. } => vec![*key, *value],
            Mapper::Adapting { inner, .. } => vec![*inner],
            Mapper::Bean(bean) => bean.properties.iter().map(|p| p.mapper).collect(),
            Mapper::Choice(candidates) => candidates.iter().map(|c| c.mapper).collect(),
            _ => Vec::new(),
        }
    }
}

/// A finished mapper with its internal and external types
#[derive(Debug, Clone)]
pub struct ResolvedMapper {
    pub id: MapperId,
    pub descriptor: TypeDescriptor,
    pub external: ExternalType,
    pub mapper: Mapper,
}

impl ResolvedMapper {
    pub fn as_bean(&self) -> Option<&BeanMapper> {
        match &self.mapper {
            Mapper::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Mapper of a bean property by name
    pub fn property(&self, name: &str) -> Option<MapperId> {
        self.as_bean()?
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.mapper)
    }
}
