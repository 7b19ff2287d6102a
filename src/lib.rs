//! Type Graph Mapper - cached, cycle-safe mappers between an internal object
//! model and its external (wire) representation.
//!
//! A [`model::TypeModel`] describes beans, enums and traits together with
//! their mapping annotations. The [`resolver::Resolver`] classifies a type
//! into a [`descriptor::TypeDescriptor`], picks a mapping strategy for it and
//! caches the resulting mapper. Recursive types resolve to a graph of mapper
//! ids: a type's cache entry exists before its properties are resolved, so a
//! self-reference finds the entry being built instead of recursing forever.
//! The [`convert::ObjectGraphMapper`] then walks value graphs through those
//! mappers in either direction, preserving shared references and cycles.
//!
//! # Architecture
//!
//! 1. [`scanner`] and [`parser`] - find and parse model source files
//! 2. [`model`] - the described type system and its annotation loader
//! 3. [`descriptor`] - type classification
//! 4. [`resolver`] and [`mapper`] - the resolution cache and strategy dispatch
//! 5. [`reference`] - element references resolved against global declarations
//! 6. [`convert`] and [`value`] - runtime object graph conversion
//! 7. [`client`] and [`report`] - client type names and the mapping report
//! 8. [`serializer`] - writes the report as YAML or JSON
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use typegraph_mapper::convert::ObjectGraphMapper;
//! use typegraph_mapper::model::{ModelBuilder, PropertyDef, TypeDef, TypeRef};
//! use typegraph_mapper::resolver::Resolver;
//! use typegraph_mapper::value::Value;
//!
//! let mut builder = ModelBuilder::new();
//! builder.add_type(
//!     TypeDef::bean("Node")
//!         .with_property(PropertyDef::new("label", TypeRef::named("String")))
//!         .with_property(PropertyDef::new(
//!             "next",
//!             TypeRef::generic("Option", vec![TypeRef::named("Node")]),
//!         )),
//! );
//! let resolver = Resolver::new(Arc::new(builder.build().unwrap()));
//! let id = resolver.resolve_named("Node").unwrap();
//!
//! let node = Value::object("Node", vec![("label", Value::str("a"))]);
//! let external = ObjectGraphMapper::new(&resolver).to_external(&node, id).unwrap();
//! assert!(matches!(external.get("label"), Value::Str(label) if label == "a"));
//! assert!(external.get("next").is_null());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod client;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod mapper;
pub mod model;
pub mod parser;
pub mod reference;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod serializer;
pub mod value;
