//! Loads a [`TypeModel`] from parsed source files.
//!
//! Every top-level struct, enum and trait becomes a type definition. Mapping
//! metadata comes from `#[mapping(...)]` attributes on items, fields and enum
//! variants. A unit struct carrying `adapter_of`/`adapts_to` declares an
//! adapter instead of a type.

use super::{
    AdapterDecl, DefKind, EnumConstant, GenericParam, ModelBuilder, PropertyDef, TypeDef, TypeModel,
    TypeRef,
};
use crate::error::{Error, Result};
use crate::parser::ParsedFile;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::Path;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{LitStr, Token};

const ATTRIBUTE: &str = "mapping";

/// Collects type definitions and adapters across files
#[derive(Debug, Default)]
pub struct ModelLoader {
    types: Vec<TypeDef>,
    adapters: Vec<AdapterDecl>,
    /// `impl Trait for Type` pairs, applied once every file is loaded
    impls: Vec<(String, String)>,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and seal a model from files in the given order
    pub fn load(files: &[ParsedFile]) -> Result<TypeModel> {
        let mut loader = Self::new();
        for file in files {
            loader.load_file(file)?;
        }
        loader.build()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Read the top-level items of one file
    pub fn load_file(&mut self, file: &ParsedFile) -> Result<()> {
        let package = package_of(&file.path);
        debug!("Loading model items from {} (package '{}')", file.path.display(), package);
        let parse_error = |err: syn::Error| Error::Parse {
            file: file.path.clone(),
            message: err.to_string(),
        };

        for item in &file.syntax_tree.items {
            match item {
                syn::Item::Struct(item_struct) => {
                    let attrs = TypeAttrs::parse(&item_struct.attrs).map_err(parse_error)?;
                    if attrs.adapter_of.is_some() || attrs.adapts_to.is_some() {
                        let adapter = adapter_decl(&item_struct.ident, attrs, &package).map_err(parse_error)?;
                        debug!("Found adapter {} for {}", adapter.name, adapter.bound_type);
                        self.adapters.push(adapter);
                        continue;
                    }
                    let mut def = TypeDef::bean(&item_struct.ident.to_string());
                    def.generics = generic_params(&item_struct.generics);
                    let vars = var_names(&def.generics);
                    match &item_struct.fields {
                        syn::Fields::Named(fields) => {
                            for field in &fields.named {
                                if let Some(property) = property(field, &vars).map_err(parse_error)? {
                                    def.properties.push(property);
                                }
                            }
                        }
                        syn::Fields::Unnamed(_) => {
                            debug!("Tuple struct {} has no named properties", def.name);
                        }
                        syn::Fields::Unit => {}
                    }
                    self.push_type(def, attrs, &package, file);
                }
                syn::Item::Enum(item_enum) => {
                    let attrs = TypeAttrs::parse(&item_enum.attrs).map_err(parse_error)?;
                    let mut def = TypeDef::new(&item_enum.ident.to_string(), DefKind::Enum);
                    for variant in &item_enum.variants {
                        if !matches!(variant.fields, syn::Fields::Unit) {
                            warn!(
                                "Variant {}::{} carries data; only its name is mapped",
                                item_enum.ident, variant.ident
                            );
                        }
                        def.constants.push(EnumConstant {
                            literal: variant.ident.to_string(),
                            external_value: variant_value(&variant.attrs).map_err(parse_error)?,
                        });
                    }
                    self.push_type(def, attrs, &package, file);
                }
                syn::Item::Trait(item_trait) => {
                    let attrs = TypeAttrs::parse(&item_trait.attrs).map_err(parse_error)?;
                    let mut def = TypeDef::new(&item_trait.ident.to_string(), DefKind::Trait);
                    def.generics = generic_params(&item_trait.generics);
                    self.push_type(def, attrs, &package, file);
                }
                syn::Item::Impl(item_impl) => {
                    if let (Some((_, trait_path, _)), syn::Type::Path(self_type)) =
                        (&item_impl.trait_, item_impl.self_ty.as_ref())
                    {
                        if let (Some(trait_name), Some(type_name)) =
                            (trait_path.segments.last(), self_type.path.segments.last())
                        {
                            self.impls
                                .push((type_name.ident.to_string(), trait_name.ident.to_string()));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn push_type(&mut self, mut def: TypeDef, attrs: TypeAttrs, package: &str, file: &ParsedFile) {
        def.package = package.to_string();
        def.file = Some(file.path.clone());
        def.namespace = attrs.namespace;
        def.external_name = attrs.name;
        def.extends = attrs.extends;
        def.implements = attrs.implements;
        def.prop_order = attrs.prop_order;
        def.adapter = attrs.adapter;
        def.self_mapper = attrs.mapper;
        def.implicit_global = attrs.implicit_global;
        if attrs.no_default {
            def.constructible = false;
        }
        def.root = attrs
            .root
            .map(|name| name.unwrap_or_else(|| def.external_type_name()));
        debug!("Loaded {:?} {} with {} properties", def.kind, def.name, def.properties.len());
        self.types.push(def);
    }

    /// Apply cross-file facts and seal the model
    pub fn build(self) -> Result<TypeModel> {
        let known: HashSet<String> = self.types.iter().map(|def| def.name.clone()).collect();
        let traits: HashSet<String> = self
            .types
            .iter()
            .filter(|def| def.kind == DefKind::Trait)
            .map(|def| def.name.clone())
            .collect();

        let mut builder = ModelBuilder::new();
        for mut def in self.types {
            // bounds on traits outside the model (Clone, Send, ...) do not constrain mapping
            for param in &mut def.generics {
                let outside = param
                    .bound
                    .as_ref()
                    .and_then(TypeRef::raw_name)
                    .is_some_and(|bound| !known.contains(bound));
                if outside {
                    param.bound = None;
                }
            }
            for (type_name, trait_name) in &self.impls {
                if type_name == &def.name
                    && traits.contains(trait_name)
                    && !def.implements.contains(trait_name)
                {
                    def.implements.push(trait_name.clone());
                }
            }
            builder.add_type(def);
        }
        for adapter in self.adapters {
            builder.add_adapter(adapter);
        }
        builder.build()
    }
}

/// Package of a source file: its stem
fn package_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct TypeAttrs {
    /// `Some(None)` for a bare `root`
    root: Option<Option<String>>,
    namespace: Option<String>,
    name: Option<String>,
    extends: Option<String>,
    implements: Vec<String>,
    prop_order: Option<Vec<String>>,
    adapter: Option<String>,
    mapper: Option<String>,
    no_default: bool,
    implicit_global: bool,
    adapter_of: Option<syn::Type>,
    adapts_to: Option<syn::Type>,
    package_default: bool,
}

impl TypeAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident(ATTRIBUTE)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("root") {
                    let name = if meta.input.peek(Token![=]) {
                        Some(string_value(&meta)?)
                    } else {
                        None
                    };
                    parsed.root = Some(name);
                } else if meta.path.is_ident("namespace") {
                    parsed.namespace = Some(string_value(&meta)?);
                } else if meta.path.is_ident("name") {
                    parsed.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("extends") {
                    parsed.extends = Some(string_value(&meta)?);
                } else if meta.path.is_ident("implements") {
                    parsed.implements.push(string_value(&meta)?);
                } else if meta.path.is_ident("prop_order") {
                    let order = string_value(&meta)?;
                    parsed.prop_order = Some(
                        order
                            .split(',')
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(str::to_string)
                            .collect(),
                    );
                } else if meta.path.is_ident("adapter") {
                    parsed.adapter = Some(string_value(&meta)?);
                } else if meta.path.is_ident("mapper") {
                    parsed.mapper = Some(string_value(&meta)?);
                } else if meta.path.is_ident("no_default") {
                    parsed.no_default = true;
                } else if meta.path.is_ident("implicit_global") {
                    parsed.implicit_global = true;
                } else if meta.path.is_ident("adapter_of") {
                    parsed.adapter_of = Some(type_value(&meta)?);
                } else if meta.path.is_ident("adapts_to") {
                    parsed.adapts_to = Some(type_value(&meta)?);
                } else if meta.path.is_ident("package_default") {
                    parsed.package_default = true;
                } else {
                    return Err(meta.error("unknown mapping attribute"));
                }
                Ok(())
            })?;
        }
        Ok(parsed)
    }
}

#[derive(Debug, Default)]
struct FieldAttrs {
    name: Option<String>,
    adapter: Option<String>,
    element_type: Option<syn::Type>,
    element_ref: bool,
    attribute: bool,
    required: bool,
    read_only: bool,
    write_only: bool,
    skip: bool,
}

impl FieldAttrs {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident(ATTRIBUTE)) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    parsed.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("adapter") {
                    parsed.adapter = Some(string_value(&meta)?);
                } else if meta.path.is_ident("element_type") {
                    parsed.element_type = Some(type_value(&meta)?);
                } else if meta.path.is_ident("element_ref") {
                    parsed.element_ref = true;
                } else if meta.path.is_ident("attribute") {
                    parsed.attribute = true;
                } else if meta.path.is_ident("required") {
                    parsed.required = true;
                } else if meta.path.is_ident("read_only") {
                    parsed.read_only = true;
                } else if meta.path.is_ident("write_only") {
                    parsed.write_only = true;
                } else if meta.path.is_ident("skip") {
                    parsed.skip = true;
                } else {
                    return Err(meta.error("unknown mapping attribute"));
                }
                Ok(())
            })?;
        }
        Ok(parsed)
    }
}

fn variant_value(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut value = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident(ATTRIBUTE)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("value") {
                value = Some(string_value(&meta)?);
                Ok(())
            } else {
                Err(meta.error("unknown mapping attribute"))
            }
        })?;
    }
    Ok(value)
}

fn string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn type_value(meta: &ParseNestedMeta) -> syn::Result<syn::Type> {
    let lit: LitStr = meta.value()?.parse()?;
    lit.parse()
}

fn adapter_decl(ident: &syn::Ident, attrs: TypeAttrs, package: &str) -> syn::Result<AdapterDecl> {
    let (Some(bound), Some(value)) = (attrs.adapter_of, attrs.adapts_to) else {
        return Err(syn::Error::new(
            ident.span(),
            "an adapter declaration needs both adapter_of and adapts_to",
        ));
    };
    Ok(AdapterDecl {
        name: ident.to_string(),
        bound_type: type_ref(&bound, &[]),
        value_type: type_ref(&value, &[]),
        package: package.to_string(),
        package_default: attrs.package_default,
    })
}

fn property(field: &syn::Field, vars: &[String]) -> syn::Result<Option<PropertyDef>> {
    let Some(ident) = &field.ident else {
        return Ok(None);
    };
    let attrs = FieldAttrs::parse(&field.attrs)?;
    if attrs.read_only && attrs.write_only {
        return Err(syn::Error::new(
            ident.span(),
            "a property cannot be both read_only and write_only",
        ));
    }
    let mut property = PropertyDef::new(&ident.to_string(), type_ref(&field.ty, vars));
    property.external_name = attrs.name;
    property.adapter = attrs.adapter;
    property.element_type = attrs.element_type.map(|ty| type_ref(&ty, vars));
    property.element_ref = attrs.element_ref;
    property.attribute = attrs.attribute;
    property.required = attrs.required;
    property.readable = !attrs.write_only;
    property.writable = !attrs.read_only;
    property.skip = attrs.skip;
    Ok(Some(property))
}

fn generic_params(generics: &syn::Generics) -> Vec<GenericParam> {
    let names: Vec<String> = generics.type_params().map(|p| p.ident.to_string()).collect();
    generics
        .type_params()
        .map(|param| GenericParam {
            name: param.ident.to_string(),
            bound: first_trait_bound(&param.bounds, &names),
        })
        .collect()
}

fn var_names(generics: &[GenericParam]) -> Vec<String> {
    generics.iter().map(|g| g.name.clone()).collect()
}

fn first_trait_bound(
    bounds: &Punctuated<syn::TypeParamBound, Token![+]>,
    vars: &[String],
) -> Option<TypeRef> {
    bounds.iter().find_map(|bound| match bound {
        syn::TypeParamBound::Trait(trait_bound) => Some(path_type_ref(&trait_bound.path, vars)),
        _ => None,
    })
}

/// Convert a syntactic type; `vars` are the generic parameters in scope
pub(crate) fn type_ref(ty: &syn::Type, vars: &[String]) -> TypeRef {
    match ty {
        syn::Type::Path(type_path) if type_path.qself.is_none() => path_type_ref(&type_path.path, vars),
        syn::Type::Reference(reference) => type_ref(&reference.elem, vars),
        syn::Type::Array(array) => TypeRef::array(type_ref(&array.elem, vars)),
        syn::Type::Slice(slice) => TypeRef::array(type_ref(&slice.elem, vars)),
        syn::Type::Paren(paren) => type_ref(&paren.elem, vars),
        syn::Type::Group(group) => type_ref(&group.elem, vars),
        syn::Type::ImplTrait(impl_trait) => wildcard(&impl_trait.bounds, vars),
        syn::Type::TraitObject(object) => wildcard(&object.bounds, vars),
        syn::Type::Infer(_) => TypeRef::Wildcard(None),
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => TypeRef::Unsupported("()".to_string()),
        syn::Type::Tuple(tuple) => TypeRef::Unsupported(format!("tuple of {} elements", tuple.elems.len())),
        syn::Type::Ptr(_) => TypeRef::Unsupported("raw pointer".to_string()),
        syn::Type::BareFn(_) => TypeRef::Unsupported("function pointer".to_string()),
        _ => TypeRef::Unsupported("unrecognized type".to_string()),
    }
}

fn path_type_ref(path: &syn::Path, vars: &[String]) -> TypeRef {
    let Some(segment) = path.segments.last() else {
        return TypeRef::Unsupported("empty path".to_string());
    };
    let name = segment.ident.to_string();
    if path.segments.len() == 1 && vars.contains(&name) {
        return TypeRef::Var(name);
    }
    let args = match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(type_ref(ty, vars)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    TypeRef::Named { name, args }
}

fn wildcard(bounds: &Punctuated<syn::TypeParamBound, Token![+]>, vars: &[String]) -> TypeRef {
    match first_trait_bound(bounds, vars) {
        Some(bound) if bound.raw_name() != Some("Any") => TypeRef::Wildcard(Some(Box::new(bound))),
        _ => TypeRef::Wildcard(None),
    }
}
