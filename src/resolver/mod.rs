//! Resolution cache.
//!
//! The [`Resolver`] owns an arena of mapper slots and a cache from
//! (canonical type, adapter) to slot. On a miss the slot is reserved and the
//! key inserted *before* the mapper is built, so a cyclic type graph finds
//! the reserved slot on its way back round and refers to it by [`MapperId`].
//! The slot is backfilled once the build finishes.
//!
//! All state sits behind one [`RwLock`]: a top-level resolution holds the
//! write lock from lookup to backfill, mapper reads share the read lock.

mod dispatch;

use crate::config::Direction;
use crate::descriptor::{classify, TypeDescriptor};
use crate::error::{Error, MappingSite, Result, SourceLocation};
use crate::mapper::{builtin, CustomMapper, ExternalType, Mapper, MapperId, ResolvedMapper, TypeAdapter};
use crate::model::{GenericContext, GlobalDeclaration, TypeModel, TypeRef};
use crate::reference;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type CacheKey = (TypeRef, Option<String>);

#[derive(Default)]
struct ResolverState {
    /// `None` marks a placeholder whose mapper is still being built
    slots: Vec<Option<Arc<ResolvedMapper>>>,
    cache: HashMap<CacheKey, MapperId>,
    /// Custom mappers by the raw type they handle
    custom: HashMap<String, Arc<dyn CustomMapper>>,
    /// Custom mappers by their own name, for self-mapping types
    named: HashMap<String, Arc<dyn CustomMapper>>,
    adapters: HashMap<String, Arc<dyn TypeAdapter>>,
    references: HashMap<String, Vec<GlobalDeclaration>>,
}

/// Resolves and caches mappers for the types of one model
pub struct Resolver {
    model: Arc<TypeModel>,
    direction: Direction,
    /// External qualified name to internal type name
    external_index: HashMap<String, String>,
    state: RwLock<ResolverState>,
}

impl Resolver {
    /// Create a resolver building mappers for both directions
    pub fn new(model: Arc<TypeModel>) -> Self {
        Self::with_direction(model, Direction::Both)
    }

    pub fn with_direction(model: Arc<TypeModel>, direction: Direction) -> Self {
        let external_index = model
            .types()
            .map(|def| (def.qname().to_string(), def.name.clone()))
            .collect();

        let resolver = Self {
            model,
            direction,
            external_index,
            state: RwLock::new(ResolverState::default()),
        };
        for (raw_type, mapper) in builtin::defaults() {
            resolver.register_custom_mapper(raw_type, mapper);
        }
        resolver
    }

    pub fn model(&self) -> &Arc<TypeModel> {
        &self.model
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Register a custom mapper for an exact raw type, replacing any previous one
    pub fn register_custom_mapper(&self, raw_type: &str, mapper: Arc<dyn CustomMapper>) {
        debug!("Registering custom mapper '{}' for {}", mapper.name(), raw_type);
        let mut state = self.state.write();
        state.named.insert(mapper.name().to_string(), Arc::clone(&mapper));
        state.custom.insert(raw_type.to_string(), mapper);
    }

    /// Register an adapter implementation, taking precedence over its declaration
    pub fn register_adapter(&self, adapter: Arc<dyn TypeAdapter>) {
        debug!("Registering adapter '{}'", adapter.name());
        self.state.write().adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Resolve the mapper of a type in a generic context, with an optional adapter override
    pub fn resolve(&self, type_ref: &TypeRef, context: &GenericContext, adapter: Option<&str>) -> Result<MapperId> {
        let descriptor = classify(&self.model, type_ref, context)?.with_adapter(adapter);
        self.resolve_descriptor(descriptor, &MappingSite::default())
    }

    /// Resolve a model type by name, with its generic parameters at their bounds
    pub fn resolve_named(&self, type_name: &str) -> Result<MapperId> {
        self.resolve(&TypeRef::named(type_name), &GenericContext::new(), None)
    }

    /// Resolve a classified descriptor; its adapter is part of the request
    pub fn resolve_descriptor(&self, descriptor: TypeDescriptor, site: &MappingSite) -> Result<MapperId> {
        let mut state = self.state.write();
        let mut build = Build::new(self, &mut state);
        match build.resolve(descriptor, site) {
            Ok(id) => {
                build.finish();
                Ok(id)
            }
            Err(err) => {
                build.rollback();
                Err(err)
            }
        }
    }

    /// Candidate declarations of a reference to `base`, cached per base type
    pub fn resolve_reference(&self, base: &TypeRef, location: &SourceLocation) -> Result<Vec<GlobalDeclaration>> {
        let descriptor = classify(&self.model, base, &GenericContext::new())?;
        let mut state = self.state.write();
        Build::new(self, &mut state).reference(&descriptor, location)
    }

    /// A finished mapper
    pub fn mapper(&self, id: MapperId) -> Result<Arc<ResolvedMapper>> {
        let state = self.state.read();
        match state.slots.get(id.0) {
            Some(Some(mapper)) => Ok(Arc::clone(mapper)),
            Some(None) => Err(Error::InvalidArgument(format!("mapper {} is still being built", id))),
            None => Err(Error::InvalidArgument(format!("unknown mapper {}", id))),
        }
    }

    /// Internal type name of an external qualified name
    pub fn internal_type(&self, external: &str) -> Option<&str> {
        self.external_index.get(external).map(String::as_str)
    }

    /// Number of mapper slots allocated so far
    pub fn len(&self) -> usize {
        self.state.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One top-level resolution holding the write lock
struct Build<'a> {
    model: &'a TypeModel,
    direction: Direction,
    state: &'a mut ResolverState,
    /// Slots below this index were committed by earlier resolutions
    start: usize,
}

impl<'a> Build<'a> {
    fn new(resolver: &'a Resolver, state: &'a mut ResolverState) -> Self {
        let start = state.slots.len();
        Self {
            model: &resolver.model,
            direction: resolver.direction,
            state,
            start,
        }
    }

    fn resolve(&mut self, descriptor: TypeDescriptor, site: &MappingSite) -> Result<MapperId> {
        let key: CacheKey = (descriptor.canonical(), descriptor.adapter().map(str::to_string));
        if let Some(id) = self.state.cache.get(&key) {
            debug!("Mapper cache hit for {} -> {}", key.0, id);
            return Ok(*id);
        }

        let id = self.reserve();
        self.state.cache.insert(key, id);
        debug!("Building mapper {} for {}", id, descriptor.canonical());

        let (mapper, external) = self.build(&descriptor, site)?;
        self.backfill(id, descriptor, external, mapper);
        Ok(id)
    }

    /// A fresh placeholder slot
    fn reserve(&mut self) -> MapperId {
        self.state.slots.push(None);
        MapperId(self.state.slots.len() - 1)
    }

    /// A slot outside the cache, filled immediately
    fn push_uncached(&mut self, descriptor: TypeDescriptor, external: ExternalType, mapper: Mapper) -> MapperId {
        let id = self.reserve();
        self.backfill(id, descriptor, external, mapper);
        id
    }

    fn backfill(&mut self, id: MapperId, descriptor: TypeDescriptor, external: ExternalType, mapper: Mapper) {
        self.state.slots[id.0] = Some(Arc::new(ResolvedMapper {
            id,
            descriptor,
            external,
            mapper,
        }));
    }

    /// External type of a slot, if it is already filled
    fn external_of(&self, id: MapperId) -> Option<ExternalType> {
        self.state
            .slots
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .map(|mapper| mapper.external.clone())
    }

    fn reference(&mut self, base: &TypeDescriptor, location: &SourceLocation) -> Result<Vec<GlobalDeclaration>> {
        let key = base.canonical().to_string();
        if let Some(found) = self.state.references.get(&key) {
            return Ok(found.clone());
        }
        let found = reference::resolve_reference(self.model, base, self.model.globals(), location)?;
        self.state.references.insert(key, found.clone());
        Ok(found)
    }

    fn finish(self) {
        let built = self.state.slots.len() - self.start;
        if built > 0 {
            debug!("Resolved {} new mappers ({} total)", built, self.state.slots.len());
        }
    }

    /// Drop every slot and cache key reserved by this resolution
    fn rollback(self) {
        let start = self.start;
        self.state.slots.truncate(start);
        self.state.cache.retain(|_, id| id.0 < start);
        debug!("Rolled back failed resolution to {} slots", start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CollectionFlavor, PrimitiveType};
    use crate::model::{AdapterDecl, DefKind, GenericParam, ModelBuilder, PropertyDef, TypeDef};
    use crate::value::Value;
    use std::thread;

    #[derive(Debug)]
    struct NamedMapper(&'static str);

    impl CustomMapper for NamedMapper {
        fn name(&self) -> &str {
            self.0
        }

        fn to_external(&self, value: &Value) -> std::result::Result<Value, String> {
            Ok(value.clone())
        }

        fn to_internal(&self, value: &Value) -> std::result::Result<Value, String> {
            Ok(value.clone())
        }
    }

    fn prop(name: &str, type_ref: TypeRef) -> PropertyDef {
        PropertyDef::new(name, type_ref)
    }

    fn list_of(name: &str) -> TypeRef {
        TypeRef::generic("List", vec![TypeRef::named(name)])
    }

    fn shop_model() -> Arc<TypeModel> {
        let mut builder = ModelBuilder::new();
        builder
            .add_type(
                TypeDef::bean("Order")
                    .with_property(prop("id", TypeRef::named("i32")))
                    .with_property(prop("customer", TypeRef::named("Customer")))
                    .with_root("order"),
            )
            .add_type(
                TypeDef::bean("Customer")
                    .with_property(prop("name", TypeRef::named("String")))
                    .with_property(prop("orders", list_of("Order"))),
            )
            .add_type(
                TypeDef::bean("Node").with_property(prop(
                    "next",
                    TypeRef::generic("Option", vec![TypeRef::generic("Box", vec![TypeRef::named("Node")])]),
                )),
            )
            .add_type(TypeDef::new("Shape", DefKind::Trait))
            .add_type(TypeDef::bean("Broken").with_property(prop("shape", TypeRef::named("Shape"))));
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = Resolver::new(shop_model());
        let first = resolver.resolve_named("Order").unwrap();
        let slots = resolver.len();
        let second = resolver.resolve_named("Order").unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.len(), slots);
        assert!(Arc::ptr_eq(&resolver.mapper(first).unwrap(), &resolver.mapper(second).unwrap()));
    }

    #[test]
    fn test_cyclic_beans_backfill_placeholder() {
        let resolver = Resolver::new(shop_model());
        let order = resolver.resolve_named("Order").unwrap();

        let customer = resolver.mapper(order).unwrap().property("customer").unwrap();
        let orders = resolver.mapper(customer).unwrap().property("orders").unwrap();
        let element = match resolver.mapper(orders).unwrap().mapper {
            Mapper::Collection { element, .. } => element,
            ref other => panic!("Expected collection mapper, got {:?}", other),
        };
        assert_eq!(element, order);
        assert!(resolver.mapper(element).unwrap().as_bean().is_some());
    }

    #[test]
    fn test_self_referential_bean() {
        let resolver = Resolver::new(shop_model());
        let node = resolver.resolve_named("Node").unwrap();
        assert_eq!(resolver.mapper(node).unwrap().property("next"), Some(node));
    }

    #[test]
    fn test_polymorphic_recursion_names_the_growing_bean() {
        let mut tree = TypeDef::bean("Tree").with_property(prop(
            "child",
            TypeRef::generic(
                "Option",
                vec![TypeRef::generic(
                    "Tree",
                    vec![TypeRef::generic("Vec", vec![TypeRef::Var("T".to_string())])],
                )],
            ),
        ));
        tree.generics.push(GenericParam {
            name: "T".to_string(),
            bound: None,
        });
        let mut builder = ModelBuilder::new();
        builder.add_type(tree);
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        let tree_of_int = TypeRef::generic("Tree", vec![TypeRef::named("i32")]);
        match resolver.resolve(&tree_of_int, &GenericContext::new(), None) {
            Err(Error::Classification { type_name, reason }) => {
                assert_eq!(type_name, "Tree");
                assert!(reason.starts_with("generic arguments nest without bound"));
            }
            other => panic!("Expected classification error, got {:?}", other),
        }
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_abstract_list_substitutes_vec() {
        let resolver = Resolver::new(shop_model());
        let cases = vec![
            ("List", CollectionFlavor::Vec),
            ("Collection", CollectionFlavor::Vec),
            ("Set", CollectionFlavor::HashSet),
            ("SortedSet", CollectionFlavor::BTreeSet),
            ("LinkedList", CollectionFlavor::LinkedList),
        ];
        for (raw, expected) in cases {
            let type_ref = TypeRef::generic(raw, vec![TypeRef::named("String")]);
            let id = resolver.resolve(&type_ref, &GenericContext::new(), None).unwrap();
            match resolver.mapper(id).unwrap().mapper {
                Mapper::Collection { flavor, element } => {
                    assert_eq!(flavor, expected, "{}", raw);
                    assert!(matches!(
                        resolver.mapper(element).unwrap().mapper,
                        Mapper::Primitive(PrimitiveType::String)
                    ));
                }
                ref other => panic!("Expected collection mapper, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_generic_context_is_part_of_the_key() {
        let mut builder = ModelBuilder::new();
        let mut page = TypeDef::bean("Page").with_property(prop(
            "items",
            TypeRef::generic("Vec", vec![TypeRef::Var("T".to_string())]),
        ));
        page.generics.push(crate::model::GenericParam {
            name: "T".to_string(),
            bound: None,
        });
        builder
            .add_type(page)
            .add_type(TypeDef::bean("User").with_property(prop("name", TypeRef::named("String"))));
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        let users = TypeRef::generic("Page", vec![TypeRef::Var("T".to_string())]);
        let mut context = GenericContext::new();
        context.insert("T".to_string(), TypeRef::named("User"));
        let page_of_users = resolver.resolve(&users, &context, None).unwrap();
        let page_of_anything = resolver.resolve_named("Page").unwrap();
        assert_ne!(page_of_users, page_of_anything);

        let items = resolver.mapper(page_of_users).unwrap().property("items").unwrap();
        let Mapper::Collection { element, .. } = resolver.mapper(items).unwrap().mapper else {
            panic!("Expected collection mapper");
        };
        assert_eq!(resolver.mapper(element).unwrap().descriptor.raw(), "User");

        let same = resolver
            .resolve(&TypeRef::generic("Page", vec![TypeRef::named("User")]), &GenericContext::new(), None)
            .unwrap();
        assert_eq!(same, page_of_users);
    }

    #[test]
    fn test_trait_without_mapper_reports_site() {
        let resolver = Resolver::new(shop_model());
        match resolver.resolve_named("Broken").unwrap_err() {
            Error::NoMapperAvailable { type_name, site } => {
                assert_eq!(type_name, "Shape");
                assert_eq!(site, MappingSite::property("Broken", "shape"));
            }
            other => panic!("Expected no mapper error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_resolution_rolls_back() {
        let mut builder = ModelBuilder::new();
        builder
            .add_type(TypeDef::new("Shape", DefKind::Trait))
            .add_type(TypeDef::bean("Leaf").with_property(prop("size", TypeRef::named("u32"))))
            .add_type(
                TypeDef::bean("Holder")
                    .with_property(prop("leaf", TypeRef::named("Leaf")))
                    .with_property(prop("shape", TypeRef::named("Shape"))),
            );
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        assert!(resolver.resolve_named("Holder").is_err());
        assert_eq!(resolver.len(), 0);

        let leaf = resolver.resolve_named("Leaf").unwrap();
        assert!(resolver.mapper(leaf).unwrap().as_bean().is_some());
        assert!(resolver.resolve_named("Holder").is_err());
        assert!(resolver.mapper(leaf).is_ok());
    }

    #[test]
    fn test_custom_mapper_for_trait() {
        let resolver = Resolver::new(shop_model());
        resolver.register_custom_mapper("Shape", Arc::new(NamedMapper("shape")));
        let broken = resolver.resolve_named("Broken").unwrap();
        let shape = resolver.mapper(broken).unwrap().property("shape").unwrap();
        assert!(matches!(resolver.mapper(shape).unwrap().mapper, Mapper::Custom(_)));
    }

    #[test]
    fn test_builtin_scalars_use_custom_mappers() {
        let resolver = Resolver::new(shop_model());
        let id = resolver.resolve_named("Uuid").unwrap();
        let mapper = resolver.mapper(id).unwrap();
        match &mapper.mapper {
            Mapper::Custom(custom) => assert_eq!(custom.name(), "uuid"),
            other => panic!("Expected custom mapper, got {:?}", other),
        }
        assert_eq!(mapper.external.xml_type.local, "string");
    }

    fn adapter_model() -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        let mut money = TypeDef::bean("Money").with_property(prop("cents", TypeRef::named("i64")));
        money.adapter = Some("MoneyAdapter".to_string());
        money.package = "shop".to_string();
        builder.add_type(money).add_adapter(AdapterDecl {
            name: "MoneyAdapter".to_string(),
            bound_type: TypeRef::named("Money"),
            value_type: TypeRef::named("String"),
            package: "shop".to_string(),
            package_default: false,
        });
        builder
    }

    #[test]
    fn test_type_level_adapter_and_collections() {
        let mut builder = adapter_model();
        let mut invoice = TypeDef::bean("Invoice")
            .with_property(prop("total", TypeRef::named("Money")))
            .with_property(prop("lines", TypeRef::generic("Vec", vec![TypeRef::named("Money")])));
        invoice.package = "shop".to_string();
        builder.add_type(invoice);
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        let invoice = resolver.resolve_named("Invoice").unwrap();
        let bean = resolver.mapper(invoice).unwrap();
        let total = resolver.mapper(bean.property("total").unwrap()).unwrap();
        let Mapper::Adapting { inner, adapter } = &total.mapper else {
            panic!("Expected adapting mapper, got {:?}", total.mapper);
        };
        assert_eq!(adapter.name(), "MoneyAdapter");
        assert!(matches!(
            resolver.mapper(*inner).unwrap().mapper,
            Mapper::Primitive(PrimitiveType::String)
        ));
        assert_eq!(total.external.xml_type.local, "string");

        let lines = resolver.mapper(bean.property("lines").unwrap()).unwrap();
        let Mapper::Collection { element, .. } = lines.mapper else {
            panic!("Expected collection mapper");
        };
        assert_eq!(element, total.id);
    }

    #[test]
    fn test_adapter_override_applies_to_elements() {
        let mut builder = ModelBuilder::new();
        builder.add_adapter(AdapterDecl {
            name: "Upper".to_string(),
            bound_type: TypeRef::named("String"),
            value_type: TypeRef::named("char"),
            package: String::new(),
            package_default: false,
        });
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));
        let list = TypeRef::generic("Vec", vec![TypeRef::named("String")]);
        let id = resolver.resolve(&list, &GenericContext::new(), Some("Upper")).unwrap();
        let Mapper::Collection { element, .. } = resolver.mapper(id).unwrap().mapper else {
            panic!("Expected collection mapper");
        };
        assert!(matches!(resolver.mapper(element).unwrap().mapper, Mapper::Adapting { .. }));

        let plain = resolver.resolve(&list, &GenericContext::new(), None).unwrap();
        assert_ne!(plain, id);
    }

    #[test]
    fn test_adapter_precedence_property_then_type_then_package() {
        let mut builder = ModelBuilder::new();
        for (name, value) in [("PropertyLevel", "i64"), ("PackageLevel", "i32")] {
            builder.add_adapter(AdapterDecl {
                name: name.to_string(),
                bound_type: TypeRef::named("String"),
                value_type: TypeRef::named(value),
                package: "billing".to_string(),
                package_default: name == "PackageLevel",
            });
        }
        let mut account = TypeDef::bean("Account")
            .with_property(PropertyDef {
                adapter: Some("PropertyLevel".to_string()),
                ..prop("number", TypeRef::named("String"))
            })
            .with_property(prop("label", TypeRef::named("String")));
        account.package = "billing".to_string();
        let mut other = TypeDef::bean("Other").with_property(prop("label", TypeRef::named("String")));
        other.package = "elsewhere".to_string();
        builder.add_type(account).add_type(other);
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        let adapter_of = |type_name: &str, property: &str| -> Option<String> {
            let bean = resolver.mapper(resolver.resolve_named(type_name).unwrap()).unwrap();
            match &resolver.mapper(bean.property(property).unwrap()).unwrap().mapper {
                Mapper::Adapting { adapter, .. } => Some(adapter.name().to_string()),
                _ => None,
            }
        };
        assert_eq!(adapter_of("Account", "number").as_deref(), Some("PropertyLevel"));
        assert_eq!(adapter_of("Account", "label").as_deref(), Some("PackageLevel"));
        assert_eq!(adapter_of("Other", "label"), None);
    }

    #[test]
    fn test_self_mapper_wins_over_adapter() {
        let mut builder = adapter_model();
        let mut tagged = TypeDef::bean("Tagged");
        tagged.self_mapper = Some("tagged".to_string());
        tagged.adapter = Some("MoneyAdapter".to_string());
        builder.add_type(tagged);
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        assert!(matches!(
            resolver.resolve_named("Tagged"),
            Err(Error::NoMapperAvailable { .. })
        ));
        resolver.register_custom_mapper("Unrelated", Arc::new(NamedMapper("tagged")));
        let id = resolver.resolve_named("Tagged").unwrap();
        assert!(matches!(resolver.mapper(id).unwrap().mapper, Mapper::Custom(_)));
    }

    #[test]
    fn test_registered_adapter_replaces_declaration() {
        #[derive(Debug)]
        struct Cents;
        impl TypeAdapter for Cents {
            fn name(&self) -> &str {
                "MoneyAdapter"
            }
            fn value_type(&self) -> TypeRef {
                TypeRef::named("i64")
            }
            fn marshal(&self, value: &Value) -> std::result::Result<Value, String> {
                Ok(value.get("cents"))
            }
            fn unmarshal(&self, value: &Value) -> std::result::Result<Value, String> {
                Ok(Value::object("Money", vec![("cents", value.clone())]))
            }
        }

        let resolver = Resolver::new(Arc::new(adapter_model().build().unwrap()));
        resolver.register_adapter(Arc::new(Cents));
        let id = resolver.resolve_named("Money").unwrap();
        assert_eq!(resolver.mapper(id).unwrap().external.xml_type.local, "long");
    }

    #[test]
    fn test_accessor_requirements_follow_direction() {
        let mut builder = ModelBuilder::new();
        builder.add_type(TypeDef::bean("Report").with_property(PropertyDef {
            writable: false,
            ..prop("total", TypeRef::named("i64"))
        }));
        let mut sealed = TypeDef::bean("Sealed").with_property(prop("id", TypeRef::named("i64")));
        sealed.constructible = false;
        builder.add_type(sealed);
        let model = Arc::new(builder.build().unwrap());

        let both = Resolver::new(Arc::clone(&model));
        match both.resolve_named("Report").unwrap_err() {
            Error::ConstructionFailure { type_name, reason } => {
                assert_eq!(type_name, "Report");
                assert!(reason.contains("writable"));
            }
            other => panic!("Expected construction failure, got {:?}", other),
        }
        assert!(matches!(
            both.resolve_named("Sealed"),
            Err(Error::ConstructionFailure { .. })
        ));

        let outward = Resolver::with_direction(Arc::clone(&model), Direction::Outward);
        assert!(outward.resolve_named("Report").is_ok());
        assert!(outward.resolve_named("Sealed").is_ok());

        let inward = Resolver::with_direction(model, Direction::Inward);
        assert!(inward.resolve_named("Report").is_err());
    }

    #[test]
    fn test_prop_order_and_skip() {
        let mut builder = ModelBuilder::new();
        let mut point = TypeDef::bean("Point")
            .with_property(prop("x", TypeRef::named("f64")))
            .with_property(prop("y", TypeRef::named("f64")))
            .with_property(PropertyDef {
                skip: true,
                ..prop("cache", TypeRef::Unsupported("(f64, f64)".to_string()))
            })
            .with_property(PropertyDef {
                external_name: Some("label-text".to_string()),
                ..prop("label", TypeRef::named("String"))
            });
        point.prop_order = Some(vec!["label".to_string(), "y".to_string()]);
        builder.add_type(point);
        let resolver = Resolver::new(Arc::new(builder.build().unwrap()));

        let mapper = resolver.mapper(resolver.resolve_named("Point").unwrap()).unwrap();
        let bean = mapper.as_bean().unwrap();
        let names: Vec<_> = bean.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["label", "y", "x"]);
        assert_eq!(bean.properties[0].wire_name, "label-text");
        assert_eq!(mapper.external.qname.local, "point");
    }

    fn drawing_model(shapes_registered: bool) -> Arc<TypeModel> {
        let mut builder = ModelBuilder::new();
        builder.add_type(TypeDef::new("Shape", DefKind::Trait));
        if shapes_registered {
            for (name, root) in [("Square", "square"), ("Circle", "circle")] {
                let mut def = TypeDef::bean(name)
                    .with_property(prop("size", TypeRef::named("f64")))
                    .with_root(root);
                def.implements.push("Shape".to_string());
                builder.add_type(def);
            }
        }
        builder.add_type(TypeDef::bean("Drawing").with_property(PropertyDef {
            element_ref: true,
            ..prop("shapes", TypeRef::generic("Vec", vec![TypeRef::named("Shape")]))
        }));
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_element_ref_builds_ordered_choice() {
        let resolver = Resolver::new(drawing_model(true));
        let drawing = resolver.mapper(resolver.resolve_named("Drawing").unwrap()).unwrap();
        let shapes = resolver.mapper(drawing.property("shapes").unwrap()).unwrap();
        let Mapper::Collection { element, .. } = shapes.mapper else {
            panic!("Expected collection mapper, got {:?}", shapes.mapper);
        };
        let Mapper::Choice(candidates) = &resolver.mapper(element).unwrap().mapper else {
            panic!("Expected choice mapper");
        };
        let names: Vec<_> = candidates.iter().map(|c| c.declaration.type_name.as_str()).collect();
        assert_eq!(names, vec!["Square", "Circle"]);
        assert_eq!(candidates[0].mapper, resolver.resolve_named("Square").unwrap());

        let again = resolver
            .resolve_reference(&TypeRef::named("Shape"), &SourceLocation::default())
            .unwrap();
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn test_element_ref_without_candidates() {
        let resolver = Resolver::new(drawing_model(false));
        match resolver.resolve_named("Drawing").unwrap_err() {
            Error::CrossReferenceUnresolved { base_type, location } => {
                assert_eq!(base_type, "Shape");
                assert_eq!(location.type_name, "Drawing");
                assert_eq!(location.property.as_deref(), Some("shapes"));
            }
            other => panic!("Expected unresolved reference, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_resolution_returns_one_mapper() {
        let resolver = Arc::new(Resolver::new(shop_model()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                thread::spawn(move || resolver.resolve_named("Customer").unwrap())
            })
            .collect();
        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(resolver.internal_type("customer"), Some("Customer"));
    }
}
