//! Mapping report: a serializable summary of every resolved model type.

use crate::client::{ClientNamer, ClientTarget};
use crate::config::MapperConfig;
use crate::error::Result;
use crate::mapper::{Mapper, ResolvedMapper};
use crate::model::DefKind;
use crate::resolver::Resolver;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Report over the mapped model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingReport {
    pub types: Vec<TypeReport>,
    /// Global root declarations in registration order
    pub roots: Vec<RootReport>,
    /// Types skipped because they failed to resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<Vec<SkippedType>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeReport {
    pub name: String,
    /// Mapper variant
    pub kind: String,
    pub qname: String,
    #[serde(rename = "xmlType")]
    pub xml_type: String,
    #[serde(rename = "clientNames")]
    pub client_names: BTreeMap<ClientTarget, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<PropertyReport>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<EnumValueReport>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyReport {
    pub name: String,
    #[serde(rename = "wireName")]
    pub wire_name: String,
    /// `attribute` or `element`
    pub node: String,
    pub kind: String,
    #[serde(rename = "xmlType")]
    pub xml_type: String,
    pub required: bool,
    #[serde(rename = "clientNames")]
    pub client_names: BTreeMap<ClientTarget, String>,
    /// Qualified names accepted by an element reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnumValueReport {
    pub literal: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootReport {
    pub qname: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedType {
    pub name: String,
    pub reason: String,
}

/// Resolves the model's concrete types and collects them into a report
pub struct ReportBuilder<'r> {
    resolver: &'r Resolver,
    namers: Vec<ClientNamer<'r>>,
    keep_going: bool,
}

impl<'r> ReportBuilder<'r> {
    pub fn new(resolver: &'r Resolver, config: &MapperConfig) -> Self {
        let model = resolver.model().as_ref();
        let namers = config
            .targets
            .iter()
            .map(|target| ClientNamer::new(model, *target, &config.package_conversions))
            .collect();
        Self {
            resolver,
            namers,
            keep_going: config.keep_going,
        }
    }

    /// Resolve every non-generic bean and enum of the model
    pub fn build(&self) -> Result<MappingReport> {
        let model = self.resolver.model();
        let mut types = Vec::new();
        let mut skipped = Vec::new();

        for def in model.types() {
            if def.kind == DefKind::Trait || !def.generics.is_empty() {
                debug!("Not reporting {}: no concrete mapping", def.name);
                continue;
            }
            match self.type_report(&def.name) {
                Ok(report) => types.push(report),
                Err(e) if self.keep_going => {
                    warn!("Skipping {}: {}", def.name, e);
                    skipped.push(SkippedType {
                        name: def.name.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let roots = model
            .globals()
            .iter()
            .filter(|g| g.root)
            .map(|g| RootReport {
                qname: g.qname.to_string(),
                type_name: g.type_name.clone(),
            })
            .collect();

        info!(
            "Reported {} types ({} skipped), {} mappers resolved",
            types.len(),
            skipped.len(),
            self.resolver.len()
        );
        Ok(MappingReport {
            types,
            roots,
            skipped: if skipped.is_empty() { None } else { Some(skipped) },
        })
    }

    fn type_report(&self, type_name: &str) -> Result<TypeReport> {
        let id = self.resolver.resolve_named(type_name)?;
        let resolved = self.resolver.mapper(id)?;

        let properties = match &resolved.mapper {
            Mapper::Bean(bean) => {
                let mut properties = Vec::with_capacity(bean.properties.len());
                for property in &bean.properties {
                    let mapper = self.resolver.mapper(property.mapper)?;
                    properties.push(PropertyReport {
                        name: property.name.clone(),
                        wire_name: property.wire_name.clone(),
                        node: if property.attribute { "attribute" } else { "element" }.to_string(),
                        kind: mapper.mapper.variant().to_string(),
                        xml_type: mapper.external.xml_type.to_string(),
                        required: property.required,
                        client_names: self.client_names(&mapper)?,
                        choices: self.choices(&mapper)?,
                    });
                }
                Some(properties)
            }
            _ => None,
        };

        let values = match &resolved.mapper {
            Mapper::Enum(enum_mapper) => Some(
                enum_mapper
                    .table
                    .iter()
                    .map(|(literal, value)| EnumValueReport {
                        literal: literal.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            ),
            _ => None,
        };

        Ok(TypeReport {
            name: type_name.to_string(),
            kind: resolved.mapper.variant().to_string(),
            qname: resolved.external.qname.to_string(),
            xml_type: resolved.external.xml_type.to_string(),
            client_names: self.client_names(&resolved)?,
            properties,
            values,
        })
    }

    /// Client names of what the client sees: the value side of an adapter
    fn client_names(&self, resolved: &ResolvedMapper) -> Result<BTreeMap<ClientTarget, String>> {
        let inner;
        let shown = match &resolved.mapper {
            Mapper::Adapting { inner: id, .. } => {
                inner = self.resolver.mapper(*id)?;
                inner.as_ref()
            }
            _ => resolved,
        };
        Ok(self
            .namers
            .iter()
            .map(|namer| (namer.target(), namer.type_name(&shown.descriptor)))
            .collect())
    }

    fn choices(&self, resolved: &ResolvedMapper) -> Result<Option<Vec<String>>> {
        let element;
        let choice = match &resolved.mapper {
            Mapper::Collection { element: id, .. } | Mapper::Array { element: id } => {
                element = self.resolver.mapper(*id)?;
                element.as_ref()
            }
            _ => resolved,
        };
        Ok(match &choice.mapper {
            Mapper::Choice(candidates) => Some(
                candidates
                    .iter()
                    .map(|c| c.declaration.qname.to_string())
                    .collect(),
            ),
            _ => None,
        })
    }
}
