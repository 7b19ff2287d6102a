//! Strategy selection and mapper construction.
//!
//! Dispatch order, first match wins:
//! 1. the type names its own custom mapper (`#[mapping(mapper = "...")]`);
//! 2. an adapter, the requested override or the type-level annotation;
//! 3. a custom mapper registered for the exact raw type;
//! 4. a built-in strategy by kind;
//! 5. the default bean mapper.

use super::Build;
use crate::descriptor::{classify, CollectionFlavor, TypeDescriptor, TypeKind};
use crate::error::{Error, MappingSite, Result, SourceLocation};
use crate::mapper::{
    BeanMapper, ChoiceCandidate, CustomMapper, DeclaredAdapter, EnumMapper, ExternalType, Mapper,
    MapperId, PropertyMapping, TypeAdapter,
};
use crate::model::{GenericContext, PropertyDef, TypeDef, TypeRef, OBJECT_TYPE};
use log::debug;
use std::sync::Arc;

/// How a descriptor gets its mapper
pub(crate) enum Strategy {
    SelfMapper(Arc<dyn CustomMapper>),
    Adapter(String),
    Custom(Arc<dyn CustomMapper>),
    BuiltIn,
    Bean,
}

impl<'a> Build<'a> {
    pub(super) fn select_strategy(&self, descriptor: &TypeDescriptor, site: &MappingSite) -> Result<Strategy> {
        let def = self.model.type_def(descriptor.raw());

        if let Some(name) = def.and_then(|d| d.self_mapper.as_deref()) {
            return match self.state.named.get(name) {
                Some(mapper) => Ok(Strategy::SelfMapper(Arc::clone(mapper))),
                None => Err(no_mapper(descriptor, site)),
            };
        }

        let adapter = descriptor
            .adapter()
            .map(str::to_string)
            .or_else(|| def.and_then(|d| d.adapter.clone()));
        if let Some(adapter) = adapter {
            return Ok(Strategy::Adapter(adapter));
        }

        if let Some(mapper) = self.state.custom.get(descriptor.raw()) {
            return Ok(Strategy::Custom(Arc::clone(mapper)));
        }

        match descriptor.kind() {
            TypeKind::Bean => Ok(Strategy::Bean),
            TypeKind::Reference if !descriptor.is_opaque() => Err(no_mapper(descriptor, site)),
            _ => Ok(Strategy::BuiltIn),
        }
    }

    pub(super) fn build(&mut self, descriptor: &TypeDescriptor, site: &MappingSite) -> Result<(Mapper, ExternalType)> {
        match self.select_strategy(descriptor, site)? {
            Strategy::SelfMapper(mapper) | Strategy::Custom(mapper) => {
                let external = mapper.external_type();
                Ok((Mapper::Custom(mapper), external))
            }
            Strategy::Adapter(name) => self.build_adapting(descriptor, &name, site),
            Strategy::BuiltIn => self.build_builtin(descriptor, site),
            Strategy::Bean => self.build_bean(descriptor, site),
        }
    }

    fn build_builtin(&mut self, descriptor: &TypeDescriptor, site: &MappingSite) -> Result<(Mapper, ExternalType)> {
        match descriptor.kind() {
            TypeKind::Primitive(primitive) => Ok((
                Mapper::Primitive(primitive),
                ExternalType::schema(primitive.xml_type()),
            )),
            TypeKind::Bytes => Ok((Mapper::Bytes, ExternalType::schema("base64Binary"))),
            TypeKind::Enum => {
                let def = self.def_of(descriptor, site)?;
                let table = def
                    .constants
                    .iter()
                    .map(|c| (c.literal.clone(), c.external().to_string()))
                    .collect();
                Ok((
                    Mapper::Enum(EnumMapper {
                        type_name: def.name.clone(),
                        table,
                    }),
                    ExternalType::named(def.qname()),
                ))
            }
            TypeKind::Collection(_) | TypeKind::Array => self.build_sequence(descriptor, None, site),
            TypeKind::Map(flavor) => {
                let opaque = TypeDescriptor::opaque();
                let args = descriptor.args();
                let key = self.resolve(args.first().unwrap_or(&opaque).clone(), site)?;
                let value = self.resolve(args.get(1).unwrap_or(&opaque).clone(), site)?;
                Ok((Mapper::Map { key, value, flavor }, ExternalType::schema("anyType")))
            }
            TypeKind::Reference if descriptor.is_opaque() => {
                Ok((Mapper::Dynamic, ExternalType::schema("anyType")))
            }
            _ => Err(no_mapper(descriptor, site)),
        }
    }

    /// Collection or array mapper; an adapter applies to the elements
    fn build_sequence(
        &mut self,
        descriptor: &TypeDescriptor,
        adapter: Option<&str>,
        site: &MappingSite,
    ) -> Result<(Mapper, ExternalType)> {
        let element = descriptor
            .element()
            .cloned()
            .unwrap_or_else(TypeDescriptor::opaque)
            .with_adapter(adapter);
        let id = self.resolve(element.clone(), site)?;
        let external = self.external_or_describe(id, &element);
        let mapper = match descriptor.kind() {
            TypeKind::Collection(flavor) => Mapper::Collection { element: id, flavor },
            _ => Mapper::Array { element: id },
        };
        Ok((mapper, external))
    }

    fn build_adapting(
        &mut self,
        descriptor: &TypeDescriptor,
        name: &str,
        site: &MappingSite,
    ) -> Result<(Mapper, ExternalType)> {
        if matches!(descriptor.kind(), TypeKind::Collection(_) | TypeKind::Array) {
            return self.build_sequence(descriptor, Some(name), site);
        }

        if let Some(decl) = self.model.adapter(name) {
            if let Some(bound) = decl.bound_type.raw_name() {
                if bound != descriptor.raw() && bound != OBJECT_TYPE {
                    return Err(Error::ConstructionFailure {
                        type_name: descriptor.raw().to_string(),
                        reason: format!("adapter {} is bound to {}", name, bound),
                    });
                }
            }
        }

        let adapter: Arc<dyn TypeAdapter> = match self.state.adapters.get(name) {
            Some(adapter) => Arc::clone(adapter),
            None => match self.model.adapter(name) {
                Some(decl) => Arc::new(DeclaredAdapter::new(decl.clone())),
                None => {
                    return Err(Error::ConstructionFailure {
                        type_name: descriptor.raw().to_string(),
                        reason: format!("unknown adapter {}", name),
                    })
                }
            },
        };

        let value = classify(self.model, &adapter.value_type(), &GenericContext::new())?;
        if value.canonical() == descriptor.canonical() {
            return Err(Error::ConstructionFailure {
                type_name: descriptor.raw().to_string(),
                reason: format!("adapter {} maps the type onto itself", name),
            });
        }

        debug!("Adapting {} to {} through {}", descriptor.raw(), value.raw(), name);
        let inner = self.resolve(value.clone(), site)?;
        let external = self.external_or_describe(inner, &value);
        Ok((Mapper::Adapting { inner, adapter }, external))
    }

    fn build_bean(&mut self, descriptor: &TypeDescriptor, site: &MappingSite) -> Result<(Mapper, ExternalType)> {
        let def = self.def_of(descriptor, site)?;

        if self.direction.needs_write() && !def.constructible {
            return Err(Error::ConstructionFailure {
                type_name: def.name.clone(),
                reason: "type cannot be default-constructed".to_string(),
            });
        }

        let bindings: GenericContext = def
            .generics
            .iter()
            .zip(descriptor.args())
            .map(|(param, arg)| (param.name.clone(), arg.canonical()))
            .collect();

        let effective = self.model.effective_properties(&def.name).unwrap_or_else(|| Arc::from(Vec::new()));
        let ordered = order_properties(def, &effective)?;

        let mut properties = Vec::with_capacity(ordered.len());
        for property in ordered.into_iter().filter(|p| !p.skip) {
            self.check_accessors(def, property)?;
            let site = MappingSite::property(&property.declared_in, &property.name);
            let mapper = if property.element_ref {
                self.resolve_element_ref(property, &bindings, &site)?
            } else {
                self.resolve_property(property, &bindings, &site)?
            };
            properties.push(PropertyMapping {
                name: property.name.clone(),
                wire_name: property.wire_name().to_string(),
                declared_in: property.declared_in.clone(),
                attribute: property.attribute,
                required: property.required,
                mapper,
            });
        }

        debug!("Built bean mapper for {} with {} properties", def.name, properties.len());
        Ok((
            Mapper::Bean(BeanMapper {
                internal_type: def.name.clone(),
                external_type: def.qname(),
                properties,
            }),
            ExternalType::named(def.qname()),
        ))
    }

    fn check_accessors(&self, def: &TypeDef, property: &PropertyDef) -> Result<()> {
        let missing = if self.direction.needs_read() && !property.readable {
            Some("readable")
        } else if self.direction.needs_write() && !property.writable {
            Some("writable")
        } else {
            None
        };
        match missing {
            Some(accessor) => Err(Error::ConstructionFailure {
                type_name: def.name.clone(),
                reason: format!("property '{}' has no {} accessor", property.name, accessor),
            }),
            None => Ok(()),
        }
    }

    fn resolve_property(
        &mut self,
        property: &PropertyDef,
        bindings: &GenericContext,
        site: &MappingSite,
    ) -> Result<MapperId> {
        let type_ref = property_type(property, bindings);
        let descriptor = classify(self.model, &type_ref, bindings).map_err(|e| at_site(e, site))?;
        let adapter = match &property.adapter {
            Some(adapter) => Some(adapter.clone()),
            None => self.package_default(property, &descriptor),
        };
        self.resolve(descriptor.with_adapter(adapter.as_deref()), site)
    }

    /// Package-default adapter for a property, unless its type carries its own
    fn package_default(&self, property: &PropertyDef, descriptor: &TypeDescriptor) -> Option<String> {
        let target = match descriptor.kind() {
            TypeKind::Collection(_) | TypeKind::Array => descriptor.element()?,
            _ => descriptor,
        };
        if self
            .model
            .type_def(target.raw())
            .is_some_and(|def| def.adapter.is_some())
        {
            return None;
        }
        let package = &self.model.type_def(&property.declared_in)?.package;
        self.model
            .package_adapter(package, target.raw())
            .map(str::to_string)
    }

    /// A choice over the global declarations assignable to the property type
    fn resolve_element_ref(
        &mut self,
        property: &PropertyDef,
        bindings: &GenericContext,
        site: &MappingSite,
    ) -> Result<MapperId> {
        let type_ref = property_type(property, bindings);
        let descriptor = classify(self.model, &type_ref, bindings).map_err(|e| at_site(e, site))?;
        let base = match descriptor.kind() {
            TypeKind::Collection(_) | TypeKind::Array => descriptor
                .element()
                .cloned()
                .unwrap_or_else(TypeDescriptor::opaque),
            _ => descriptor.clone(),
        };

        let location = match self.model.type_def(&property.declared_in) {
            Some(def) => def.location(Some(&property.name)),
            None => SourceLocation {
                file: None,
                type_name: property.declared_in.clone(),
                property: Some(property.name.clone()),
            },
        };
        let declarations = self.reference(&base, &location)?;

        let mut candidates = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let candidate = classify(
                self.model,
                &TypeRef::named(&declaration.type_name),
                &GenericContext::new(),
            )?;
            let mapper = self.resolve(candidate, site)?;
            candidates.push(ChoiceCandidate { declaration, mapper });
        }

        let choice = self.push_uncached(base, ExternalType::schema("anyType"), Mapper::Choice(candidates));
        let wrapper = match descriptor.kind() {
            TypeKind::Collection(flavor) => Mapper::Collection { element: choice, flavor },
            TypeKind::Array => Mapper::Array { element: choice },
            _ => return Ok(choice),
        };
        Ok(self.push_uncached(descriptor, ExternalType::schema("anyType"), wrapper))
    }

    fn def_of(&self, descriptor: &TypeDescriptor, site: &MappingSite) -> Result<&'a TypeDef> {
        self.model
            .type_def(descriptor.raw())
            .ok_or_else(|| no_mapper(descriptor, site))
    }

    fn external_or_describe(&self, id: MapperId, descriptor: &TypeDescriptor) -> ExternalType {
        self.external_of(id).unwrap_or_else(|| self.describe(descriptor))
    }

    /// External type derived from a descriptor alone, for slots still being built
    fn describe(&self, descriptor: &TypeDescriptor) -> ExternalType {
        match descriptor.kind() {
            TypeKind::Primitive(primitive) => ExternalType::schema(primitive.xml_type()),
            TypeKind::Bytes => ExternalType::schema("base64Binary"),
            TypeKind::Collection(_) | TypeKind::Array => match descriptor.element() {
                Some(element) => self.describe(element),
                None => ExternalType::schema("anyType"),
            },
            _ => match self.model.type_def(descriptor.raw()) {
                Some(def) => ExternalType::named(def.qname()),
                None => ExternalType::schema("anyType"),
            },
        }
    }
}

/// Properties in effective order: `prop_order` names first, then the rest
fn order_properties<'p>(def: &TypeDef, properties: &'p [PropertyDef]) -> Result<Vec<&'p PropertyDef>> {
    let Some(order) = &def.prop_order else {
        return Ok(properties.iter().collect());
    };

    let mut ordered = Vec::with_capacity(properties.len());
    for name in order {
        let property = properties
            .iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| Error::ConstructionFailure {
                type_name: def.name.clone(),
                reason: format!("prop_order names unknown property '{}'", name),
            })?;
        if !ordered.iter().any(|p: &&PropertyDef| p.name == property.name) {
            ordered.push(property);
        }
    }
    for property in properties {
        if !order.contains(&property.name) {
            ordered.push(property);
        }
    }
    Ok(ordered)
}

/// Property type with generic bindings substituted and a specified element type applied
fn property_type(property: &PropertyDef, bindings: &GenericContext) -> TypeRef {
    let type_ref = property.type_ref.substitute(bindings);
    match &property.element_type {
        Some(element) => with_element(&type_ref, element.substitute(bindings)),
        None => type_ref,
    }
}

fn with_element(type_ref: &TypeRef, element: TypeRef) -> TypeRef {
    match type_ref {
        TypeRef::Named { name, args } if is_wrapper(name) && !args.is_empty() => {
            TypeRef::generic(name, vec![with_element(&args[0], element)])
        }
        TypeRef::Named { name, .. } if CollectionFlavor::for_raw(name).is_some() => {
            TypeRef::generic(name, vec![element])
        }
        TypeRef::Array(_) => TypeRef::array(element),
        _ => element,
    }
}

fn is_wrapper(name: &str) -> bool {
    matches!(name, "Option" | "Box" | "Rc" | "Arc" | "Cow")
}

fn no_mapper(descriptor: &TypeDescriptor, site: &MappingSite) -> Error {
    Error::NoMapperAvailable {
        type_name: descriptor.raw().to_string(),
        site: site.clone(),
    }
}

fn at_site(err: Error, site: &MappingSite) -> Error {
    match err {
        Error::Classification { type_name, reason } => Error::Classification {
            type_name,
            reason: format!("{} ({})", reason, site),
        },
        other => other,
    }
}
