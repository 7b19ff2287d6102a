//! Described type system: the declarations the resolver maps.
//!
//! A model is assembled by a [`ModelBuilder`] during the loading phase (from
//! annotated source through [`loader::ModelLoader`], or programmatically) and
//! then sealed into an immutable [`TypeModel`]. Sealing validates the
//! inheritance graph and precomputes each bean's effective property list so
//! later lookups never walk the hierarchy.

pub mod loader;

use crate::error::{Error, Result, SourceLocation};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A type expression as written in a declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeRef {
    /// A named raw type with its generic arguments
    Named { name: String, args: Vec<TypeRef> },
    /// A fixed-size array or slice
    Array(Box<TypeRef>),
    /// A generic type variable
    Var(String),
    /// An existential type with an optional upper bound
    Wildcard(Option<Box<TypeRef>>),
    /// A shape that cannot be classified
    Unsupported(String),
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef::Named {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.to_string(),
            args,
        }
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// The opaque object type
    pub fn object() -> Self {
        TypeRef::named(OBJECT_TYPE)
    }

    /// Raw name of a named type
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Replace type variables by their bindings
    pub fn substitute(&self, bindings: &GenericContext) -> TypeRef {
        match self {
            TypeRef::Named { name, args } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeRef::Array(element) => TypeRef::Array(Box::new(element.substitute(bindings))),
            TypeRef::Var(name) => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| TypeRef::Var(name.clone())),
            TypeRef::Wildcard(bound) => {
                TypeRef::Wildcard(bound.as_ref().map(|b| Box::new(b.substitute(bindings))))
            }
            TypeRef::Unsupported(text) => TypeRef::Unsupported(text.clone()),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::Array(element) => write!(f, "[{}]", element),
            TypeRef::Var(name) => write!(f, "{}", name),
            TypeRef::Wildcard(Some(bound)) => write!(f, "impl {}", bound),
            TypeRef::Wildcard(None) => write!(f, "_"),
            TypeRef::Unsupported(text) => write!(f, "{}", text),
        }
    }
}

/// Raw name of the opaque object type
pub const OBJECT_TYPE: &str = "Object";

/// Bindings of generic type variables, compared structurally
pub type GenericContext = BTreeMap<String, TypeRef>;

/// A namespace-qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.to_string(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Category of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefKind {
    Bean,
    Enum,
    /// Interface-like type with no fields of its own
    Trait,
}

/// A declared generic parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParam {
    pub name: String,
    pub bound: Option<TypeRef>,
}

/// A declared property of a bean
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub type_ref: TypeRef,
    /// Type that declares the property (differs from the owner for inherited ones)
    pub declared_in: String,
    pub readable: bool,
    pub writable: bool,
    pub external_name: Option<String>,
    pub adapter: Option<String>,
    pub element_type: Option<TypeRef>,
    pub element_ref: bool,
    pub attribute: bool,
    pub required: bool,
    pub skip: bool,
}

impl PropertyDef {
    pub fn new(name: &str, type_ref: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            type_ref,
            declared_in: String::new(),
            readable: true,
            writable: true,
            external_name: None,
            adapter: None,
            element_type: None,
            element_ref: false,
            attribute: false,
            required: false,
            skip: false,
        }
    }

    /// Name used on the wire
    pub fn wire_name(&self) -> &str {
        self.external_name.as_deref().unwrap_or(&self.name)
    }
}

/// A declared enum constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub literal: String,
    pub external_value: Option<String>,
}

impl EnumConstant {
    pub fn external(&self) -> &str {
        self.external_value.as_deref().unwrap_or(&self.literal)
    }
}

/// A declared type with its annotation metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub package: String,
    pub kind: DefKind,
    pub generics: Vec<GenericParam>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub properties: Vec<PropertyDef>,
    pub constants: Vec<EnumConstant>,
    pub root: Option<String>,
    pub namespace: Option<String>,
    pub external_name: Option<String>,
    pub prop_order: Option<Vec<String>>,
    pub adapter: Option<String>,
    pub self_mapper: Option<String>,
    pub constructible: bool,
    pub implicit_global: bool,
    pub file: Option<PathBuf>,
}

impl TypeDef {
    pub fn new(name: &str, kind: DefKind) -> Self {
        Self {
            name: name.to_string(),
            package: String::new(),
            kind,
            generics: Vec::new(),
            extends: None,
            implements: Vec::new(),
            properties: Vec::new(),
            constants: Vec::new(),
            root: None,
            namespace: None,
            external_name: None,
            prop_order: None,
            adapter: None,
            self_mapper: None,
            constructible: kind != DefKind::Trait,
            implicit_global: false,
            file: None,
        }
    }

    pub fn bean(name: &str) -> Self {
        Self::new(name, DefKind::Bean)
    }

    pub fn enumeration(name: &str, literals: &[&str]) -> Self {
        let mut def = Self::new(name, DefKind::Enum);
        def.constants = literals
            .iter()
            .map(|l| EnumConstant {
                literal: l.to_string(),
                external_value: None,
            })
            .collect();
        def
    }

    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_root(mut self, name: &str) -> Self {
        self.root = Some(name.to_string());
        self
    }

    pub fn extending(mut self, supertype: &str) -> Self {
        self.extends = Some(supertype.to_string());
        self
    }

    /// External (wire) type name: the override, else the decapitalized type name
    pub fn external_type_name(&self) -> String {
        self.external_name
            .clone()
            .unwrap_or_else(|| decapitalize(&self.name))
    }

    pub fn qname(&self) -> QName {
        QName::new(self.namespace.as_deref(), &self.external_type_name())
    }

    pub fn location(&self, property: Option<&str>) -> SourceLocation {
        SourceLocation {
            file: self.file.clone(),
            type_name: self.name.clone(),
            property: property.map(str::to_string),
        }
    }
}

/// Lower-case the first character unless the name starts with two capitals.
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            name.to_string()
        }
        (Some(first), _) => {
            let mut out: String = first.to_lowercase().collect();
            out.push_str(&name[first.len_utf8()..]);
            out
        }
        (None, _) => String::new(),
    }
}

/// A declared adapter between a bound (internal) type and a value (external) type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDecl {
    pub name: String,
    pub bound_type: TypeRef,
    pub value_type: TypeRef,
    pub package: String,
    pub package_default: bool,
}

/// A globally registered top-level declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDeclaration {
    pub qname: QName,
    pub type_name: String,
    pub root: bool,
}

/// Registration-ordered set of global declarations
#[derive(Debug, Clone, Default)]
pub struct GlobalRegistry {
    declarations: Vec<GlobalDeclaration>,
}

impl GlobalRegistry {
    pub fn register(&mut self, declaration: GlobalDeclaration) {
        self.declarations.push(declaration);
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlobalDeclaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// Collects declarations during the loading phase
#[derive(Debug, Default)]
pub struct ModelBuilder {
    types: Vec<TypeDef>,
    adapters: Vec<AdapterDecl>,
    globals: GlobalRegistry,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type; root types are registered as global declarations in call order
    pub fn add_type(&mut self, def: TypeDef) -> &mut Self {
        if let Some(root) = &def.root {
            self.globals.register(GlobalDeclaration {
                qname: QName::new(def.namespace.as_deref(), root),
                type_name: def.name.clone(),
                root: true,
            });
        }
        self.types.push(def);
        self
    }

    pub fn add_adapter(&mut self, adapter: AdapterDecl) -> &mut Self {
        self.adapters.push(adapter);
        self
    }

    pub fn register_global_declaration(&mut self, declaration: GlobalDeclaration) -> &mut Self {
        self.globals.register(declaration);
        self
    }

    /// Validate and seal the model
    pub fn build(self) -> Result<TypeModel> {
        let mut types = HashMap::new();
        let mut order = Vec::new();
        for mut def in self.types {
            for property in &mut def.properties {
                if property.declared_in.is_empty() {
                    property.declared_in = def.name.clone();
                }
            }
            if types.contains_key(&def.name) {
                return Err(Error::Classification {
                    type_name: def.name.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
            order.push(def.name.clone());
            types.insert(def.name.clone(), def);
        }

        for def in types.values() {
            for supertype in def.extends.iter().chain(def.implements.iter()) {
                if !types.contains_key(supertype) {
                    return Err(Error::Classification {
                        type_name: def.name.clone(),
                        reason: format!("unknown supertype {}", supertype),
                    });
                }
            }
        }

        let mut effective = HashMap::new();
        for name in &order {
            let mut visiting = HashSet::new();
            let properties = flatten_properties(&types, name, &mut visiting)?;
            effective.insert(name.clone(), Arc::from(properties));
        }

        let mut adapters = HashMap::new();
        let mut package_adapters = HashMap::new();
        for adapter in self.adapters {
            if adapter.package_default {
                if let Some(bound) = adapter.bound_type.raw_name() {
                    package_adapters.insert(
                        (adapter.package.clone(), bound.to_string()),
                        adapter.name.clone(),
                    );
                }
            }
            adapters.insert(adapter.name.clone(), adapter);
        }

        debug!(
            "Sealed model with {} types, {} adapters, {} global declarations",
            order.len(),
            adapters.len(),
            self.globals.len()
        );

        Ok(TypeModel {
            types,
            order,
            effective,
            adapters,
            package_adapters,
            globals: self.globals,
        })
    }
}

fn flatten_properties(
    types: &HashMap<String, TypeDef>,
    name: &str,
    visiting: &mut HashSet<String>,
) -> Result<Vec<PropertyDef>> {
    if !visiting.insert(name.to_string()) {
        return Err(Error::Classification {
            type_name: name.to_string(),
            reason: "inheritance cycle".to_string(),
        });
    }
    let def = &types[name];
    let mut properties = match &def.extends {
        Some(supertype) => flatten_properties(types, supertype, visiting)?,
        None => Vec::new(),
    };
    for trait_name in &def.implements {
        // traits carry no properties but may themselves form a cycle
        flatten_properties(types, trait_name, visiting)?;
    }
    properties.extend(def.properties.iter().cloned());
    visiting.remove(name);
    Ok(properties)
}

/// A sealed, immutable type model
#[derive(Debug)]
pub struct TypeModel {
    types: HashMap<String, TypeDef>,
    order: Vec<String>,
    effective: HashMap<String, Arc<[PropertyDef]>>,
    adapters: HashMap<String, AdapterDecl>,
    package_adapters: HashMap<(String, String), String>,
    globals: GlobalRegistry,
}

impl TypeModel {
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Types in declaration order
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    /// Flattened properties: supertype properties first, then declared ones
    pub fn effective_properties(&self, name: &str) -> Option<Arc<[PropertyDef]>> {
        self.effective.get(name).cloned()
    }

    pub fn adapter(&self, name: &str) -> Option<&AdapterDecl> {
        self.adapters.get(name)
    }

    pub fn adapters(&self) -> impl Iterator<Item = &AdapterDecl> {
        self.adapters.values()
    }

    /// Package-default adapter for a raw type
    pub fn package_adapter(&self, package: &str, raw_type: &str) -> Option<&str> {
        self.package_adapters
            .get(&(package.to_string(), raw_type.to_string()))
            .map(String::as_str)
    }

    pub fn globals(&self) -> &GlobalRegistry {
        &self.globals
    }

    /// Whether `sub` equals `base` or reaches it through `extends`/`implements`
    pub fn is_assignable(&self, sub: &str, base: &str) -> bool {
        if sub == base || base == OBJECT_TYPE {
            return true;
        }
        let mut pending = vec![sub];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            let Some(def) = self.types.get(current) else {
                continue;
            };
            for supertype in def.extends.iter().chain(def.implements.iter()) {
                if supertype == base {
                    return true;
                }
                pending.push(supertype);
            }
        }
        false
    }
}
