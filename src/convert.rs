//! Object graph conversion through resolved mappers.
//!
//! Every top-level call runs inside a [`ConversionSession`]: sequences, maps
//! and objects are registered there by instance identity as soon as their
//! target is allocated (before any element or property is converted), so a
//! second encounter of the same source instance yields the same target. This
//! keeps shared references shared and makes cyclic graphs terminate.

use crate::descriptor::{CollectionFlavor, MapFlavor, PrimitiveType};
use crate::error::{Error, Result};
use crate::mapper::{ChoiceCandidate, Mapper, MapperId, ResolvedMapper};
use crate::model::{GenericContext, TypeRef};
use crate::resolver::Resolver;
use crate::value::Value;
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Way {
    Outward,
    Inward,
}

/// Identity tracking for one top-level conversion call
#[derive(Debug, Default)]
pub struct ConversionSession {
    /// Source identity to (source, target); the source is kept so its address stays taken
    outward: HashMap<usize, (Value, Value)>,
    inward: HashMap<usize, (Value, Value)>,
    /// Runtime type to its self-supplied mapper, if it declares one
    self_mapped: HashMap<String, Option<MapperId>>,
}

impl ConversionSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn seen(&self, way: Way) -> &HashMap<usize, (Value, Value)> {
        match way {
            Way::Outward => &self.outward,
            Way::Inward => &self.inward,
        }
    }

    fn lookup(&self, way: Way, source: &Value) -> Option<Value> {
        let identity = source.identity()?;
        self.seen(way).get(&identity).map(|(_, target)| target.clone())
    }

    fn register(&mut self, way: Way, source: &Value, target: &Value) {
        if let Some(identity) = source.identity() {
            let seen = match way {
                Way::Outward => &mut self.outward,
                Way::Inward => &mut self.inward,
            };
            seen.insert(identity, (source.clone(), target.clone()));
        }
    }

    /// Number of shared instances converted so far, both directions
    pub fn len(&self) -> usize {
        self.outward.len() + self.inward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts values between their internal and external shapes
pub struct ObjectGraphMapper<'r> {
    resolver: &'r Resolver,
}

impl<'r> ObjectGraphMapper<'r> {
    pub fn new(resolver: &'r Resolver) -> Self {
        Self { resolver }
    }

    /// Convert an internal value to its external representation
    pub fn convert_outward(&self, value: &Value, mapper: MapperId, session: &mut ConversionSession) -> Result<Value> {
        debug!("Converting {:?} outward with mapper {}", value, mapper);
        self.convert(value, mapper, Way::Outward, session)
    }

    /// Convert an external value back to its internal representation
    pub fn convert_inward(&self, value: &Value, mapper: MapperId, session: &mut ConversionSession) -> Result<Value> {
        debug!("Converting {:?} inward with mapper {}", value, mapper);
        self.convert(value, mapper, Way::Inward, session)
    }

    /// Outward conversion in a fresh session
    pub fn to_external(&self, value: &Value, mapper: MapperId) -> Result<Value> {
        self.convert_outward(value, mapper, &mut ConversionSession::new())
    }

    /// Inward conversion in a fresh session
    pub fn to_internal(&self, value: &Value, mapper: MapperId) -> Result<Value> {
        self.convert_inward(value, mapper, &mut ConversionSession::new())
    }

    fn convert(&self, value: &Value, id: MapperId, way: Way, session: &mut ConversionSession) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Some(target) = session.lookup(way, value) {
            return Ok(target);
        }
        if let Some(own) = self.self_mapped(value, way, session)? {
            if own != id {
                return self.convert(value, own, way, session);
            }
        }

        let resolved = self.resolver.mapper(id)?;
        let declaring = resolved.descriptor.raw();
        match &resolved.mapper {
            Mapper::Primitive(primitive) => convert_primitive(*primitive, value, way),
            Mapper::Bytes => match value {
                Value::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
                other => Err(Error::mapping(declaring, format!("expected bytes, found {}", other.shape()))),
            },
            Mapper::Enum(table) => match (way, value) {
                (Way::Outward, Value::Enum(literal)) => table
                    .external_of(literal)
                    .map(Value::str)
                    .ok_or_else(|| Error::mapping(declaring, format!("unknown constant {}", literal))),
                (Way::Inward, Value::Str(external)) => table
                    .literal_of(external)
                    .map(|literal| Value::Enum(literal.to_string()))
                    .ok_or_else(|| Error::mapping(declaring, format!("unknown value '{}'", external))),
                (_, other) => Err(Error::mapping(
                    declaring,
                    format!("expected enum value, found {}", other.shape()),
                )),
            },
            Mapper::Collection { element, flavor } => {
                self.convert_sequence(value, *element, *flavor, way, session, declaring)
            }
            Mapper::Array { element } => {
                self.convert_sequence(value, *element, CollectionFlavor::Array, way, session, declaring)
            }
            Mapper::Map { key, value: entry, flavor } => {
                self.convert_map(value, *key, *entry, *flavor, way, session, declaring)
            }
            Mapper::Adapting { inner, adapter } => match way {
                Way::Outward => {
                    let marshaled = adapter
                        .marshal(value)
                        .map_err(|cause| Error::mapping(declaring, cause))?;
                    self.convert(&marshaled, *inner, way, session)
                }
                Way::Inward => {
                    let converted = self.convert(value, *inner, way, session)?;
                    adapter
                        .unmarshal(&converted)
                        .map_err(|cause| Error::mapping(declaring, cause))
                }
            },
            Mapper::Custom(custom) => {
                let converted = match way {
                    Way::Outward => custom.to_external(value),
                    Way::Inward => custom.to_internal(value),
                };
                converted.map_err(|cause| Error::mapping(declaring, cause))
            }
            Mapper::Bean(_) => self.convert_bean(value, &resolved, way, session),
            Mapper::Choice(candidates) => {
                let chosen = self.choose(value, candidates, way, declaring)?;
                self.convert(value, chosen, way, session)
            }
            Mapper::Dynamic => self.convert_dynamic(value, way, session),
        }
    }

    fn convert_bean(
        &self,
        value: &Value,
        resolved: &ResolvedMapper,
        way: Way,
        session: &mut ConversionSession,
    ) -> Result<Value> {
        let Some(bean) = resolved.as_bean() else {
            return Err(Error::mapping(resolved.descriptor.raw(), "not a bean mapper"));
        };
        let Some(source) = value.as_object() else {
            return Err(Error::mapping(
                &bean.internal_type,
                format!("expected object, found {}", value.shape()),
            ));
        };

        let runtime = self.runtime_type(value, way)?;
        if runtime != bean.internal_type {
            if !self.resolver.model().is_assignable(&runtime, &bean.internal_type) {
                return Err(Error::mapping(
                    &bean.internal_type,
                    format!("{} is not assignable to {}", runtime, bean.internal_type),
                ));
            }
            let subtype = self.resolve_runtime(&runtime)?;
            return self.convert(value, subtype, way, session);
        }

        let target_type = match way {
            Way::Outward => bean.external_type.to_string(),
            Way::Inward => bean.internal_type.clone(),
        };
        let target = Value::object(&target_type, Vec::new());
        session.register(way, value, &target);

        for property in &bean.properties {
            let (from, to) = match way {
                Way::Outward => (&property.name, &property.wire_name),
                Way::Inward => (&property.wire_name, &property.name),
            };
            let current = source.borrow().get(from).cloned();
            let Some(current) = current.filter(|v| !v.is_null()) else {
                continue;
            };
            let converted = self
                .convert(&current, property.mapper, way, session)
                .map_err(|e| e.in_property(&property.declared_in, &property.name))?;
            if let Some(object) = target.as_object() {
                object.borrow_mut().set(to, converted);
            }
        }
        Ok(target)
    }

    fn convert_sequence(
        &self,
        value: &Value,
        element: MapperId,
        flavor: CollectionFlavor,
        way: Way,
        session: &mut ConversionSession,
        declaring: &str,
    ) -> Result<Value> {
        let Some(source) = value.as_seq() else {
            return Err(Error::mapping(declaring, format!("expected sequence, found {}", value.shape())));
        };
        let target = Value::seq(flavor, Vec::new());
        session.register(way, value, &target);

        let items = source.borrow().items.clone();
        let mut converted = Vec::with_capacity(items.len());
        for item in &items {
            converted.push(self.convert(item, element, way, session)?);
        }
        match flavor {
            CollectionFlavor::BTreeSet => {
                converted.sort_by(Value::element_cmp);
                converted.dedup_by(|a, b| a.element_cmp(b).is_eq());
            }
            CollectionFlavor::HashSet => converted = first_occurrences(converted),
            _ => {}
        }
        if let Some(sequence) = target.as_seq() {
            sequence.borrow_mut().items = converted;
        }
        Ok(target)
    }

    #[allow(clippy::too_many_arguments)]
    fn convert_map(
        &self,
        value: &Value,
        key: MapperId,
        entry: MapperId,
        flavor: MapFlavor,
        way: Way,
        session: &mut ConversionSession,
        declaring: &str,
    ) -> Result<Value> {
        let Some(source) = value.as_map() else {
            return Err(Error::mapping(declaring, format!("expected map, found {}", value.shape())));
        };
        let target = Value::map(flavor, Vec::new());
        session.register(way, value, &target);

        let entries = source.borrow().entries.clone();
        let mut converted = Vec::with_capacity(entries.len());
        for (k, v) in &entries {
            let k = self.convert(k, key, way, session)?;
            let v = self.convert(v, entry, way, session)?;
            converted.push((k, v));
        }
        if let Some(map) = target.as_map() {
            map.borrow_mut().entries = converted;
        }
        Ok(target)
    }

    /// Opaque values: primitives pass through, containers and objects dispatch at runtime
    fn convert_dynamic(&self, value: &Value, way: Way, session: &mut ConversionSession) -> Result<Value> {
        match value {
            Value::Object(_) => {
                let runtime = self.runtime_type(value, way)?;
                let mapper = self.resolve_runtime(&runtime)?;
                self.convert(value, mapper, way, session)
            }
            Value::Seq(seq) => {
                let flavor = seq.borrow().flavor;
                let dynamic = self.dynamic_mapper()?;
                self.convert_sequence(value, dynamic, flavor, way, session, "Object")
            }
            Value::Map(map) => {
                let flavor = map.borrow().flavor;
                let dynamic = self.dynamic_mapper()?;
                self.convert_map(value, dynamic, dynamic, flavor, way, session, "Object")
            }
            other => Ok(other.clone()),
        }
    }

    fn choose(&self, value: &Value, candidates: &[ChoiceCandidate], way: Way, declaring: &str) -> Result<MapperId> {
        let runtime = match value {
            Value::Object(_) => self.runtime_type(value, way)?,
            other => {
                return Err(Error::mapping(
                    declaring,
                    format!("no candidate accepts a {}", other.shape()),
                ))
            }
        };
        let model = self.resolver.model();
        candidates
            .iter()
            .find(|c| c.declaration.type_name == runtime)
            .or_else(|| {
                candidates
                    .iter()
                    .find(|c| model.is_assignable(&runtime, &c.declaration.type_name))
            })
            .map(|c| c.mapper)
            .ok_or_else(|| Error::mapping(declaring, format!("no candidate accepts {}", runtime)))
    }

    /// Self-supplied mapper of an object's runtime type, looked up once per session
    fn self_mapped(&self, value: &Value, way: Way, session: &mut ConversionSession) -> Result<Option<MapperId>> {
        let Some(name) = value.type_name() else {
            return Ok(None);
        };
        let runtime = match way {
            Way::Inward => self.resolver.internal_type(&name).map(str::to_string).unwrap_or(name),
            Way::Outward => name,
        };
        if let Some(cached) = session.self_mapped.get(&runtime) {
            return Ok(*cached);
        }
        let own = match self.resolver.model().type_def(&runtime) {
            Some(def) if def.self_mapper.is_some() => Some(self.resolve_runtime(&runtime)?),
            _ => None,
        };
        session.self_mapped.insert(runtime, own);
        Ok(own)
    }

    /// Internal type name of an object value
    fn runtime_type(&self, value: &Value, way: Way) -> Result<String> {
        let name = value.type_name().unwrap_or_default();
        if way == Way::Inward {
            if let Some(internal) = self.resolver.internal_type(&name) {
                return Ok(internal.to_string());
            }
        }
        if self.resolver.model().type_def(&name).is_some() {
            Ok(name)
        } else {
            Err(Error::mapping(&name, "runtime type is not part of the model"))
        }
    }

    fn resolve_runtime(&self, type_name: &str) -> Result<MapperId> {
        self.resolver
            .resolve_named(type_name)
            .map_err(|e| Error::mapping(type_name, e.to_string()))
    }

    fn dynamic_mapper(&self) -> Result<MapperId> {
        self.resolver
            .resolve(&TypeRef::object(), &GenericContext::new(), None)
            .map_err(|e| Error::mapping("Object", e.to_string()))
    }
}

fn convert_primitive(primitive: PrimitiveType, value: &Value, way: Way) -> Result<Value> {
    let name = format!("{:?}", primitive).to_lowercase();
    let mismatch = || Error::mapping(&name, format!("expected {}, found {}", name, value.shape()));

    match (primitive, value) {
        (PrimitiveType::String, Value::Str(text)) => Ok(Value::Str(text.clone())),
        (PrimitiveType::Bool, Value::Bool(flag)) => Ok(Value::Bool(*flag)),
        (PrimitiveType::F32 | PrimitiveType::F64, Value::Float(number)) => Ok(Value::Float(*number)),
        (PrimitiveType::F32 | PrimitiveType::F64, Value::Int(number)) => Ok(Value::Float(*number as f64)),
        (PrimitiveType::Char, Value::Char(c)) if way == Way::Outward => {
            let code = *c as u32;
            if code > 0xFFFF {
                return Err(Error::mapping(
                    "char",
                    format!("U+{:X} is outside the Basic Multilingual Plane", code),
                ));
            }
            Ok(Value::Int(code as i128))
        }
        (PrimitiveType::Char, Value::Int(code)) if way == Way::Inward => u32::try_from(*code)
            .ok()
            .filter(|code| *code <= 0xFFFF)
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or_else(|| Error::mapping("char", format!("{} is not a UTF-16 code unit of a character", code))),
        (p, Value::Int(number)) if p.is_integer() => {
            let in_range = match p.integer_range() {
                Some((min, max)) => (min..=max).contains(number),
                None => p != PrimitiveType::U128 || *number >= 0,
            };
            if in_range {
                Ok(Value::Int(*number))
            } else {
                Err(Error::mapping(&name, format!("value {} out of range", number)))
            }
        }
        _ => Err(mismatch()),
    }
}

/// Drop repeated elements, keeping the first of each in source order
fn first_occurrences(items: Vec<Value>) -> Vec<Value> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| items[a].element_cmp(&items[b]).then(a.cmp(&b)));
    let mut keep = vec![true; items.len()];
    for pair in order.windows(2) {
        if items[pair[0]].element_cmp(&items[pair[1]]).is_eq() {
            keep[pair[1]] = false;
        }
    }
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}
