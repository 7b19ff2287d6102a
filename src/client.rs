//! Client type naming.
//!
//! Each target language gets an explicit table of primitive, container and
//! well-known type names. Model types are named by their package (after any
//! configured package conversion) and type name.

use crate::config::PackageConversion;
use crate::descriptor::{CollectionFlavor, PrimitiveType, TypeDescriptor, TypeKind};
use crate::model::TypeModel;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client languages type names are derived for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientTarget {
    Java,
    #[value(name = "csharp")]
    CSharp,
    Php,
    #[value(name = "actionscript")]
    ActionScript,
}

impl fmt::Display for ClientTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientTarget::Java => "java",
            ClientTarget::CSharp => "csharp",
            ClientTarget::Php => "php",
            ClientTarget::ActionScript => "actionscript",
        };
        write!(f, "{}", name)
    }
}

impl ClientTarget {
    fn primitive(&self, primitive: PrimitiveType, nullable: bool) -> &'static str {
        use PrimitiveType::*;
        match self {
            ClientTarget::Java => match (primitive, nullable) {
                (String, _) => "java.lang.String",
                (Bool, false) => "boolean",
                (Bool, true) => "java.lang.Boolean",
                (I8, false) => "byte",
                (I8, true) => "java.lang.Byte",
                (I16 | U8, false) => "short",
                (I16 | U8, true) => "java.lang.Short",
                (I32 | U16, false) => "int",
                (I32 | U16, true) => "java.lang.Integer",
                (I64 | U32, false) => "long",
                (I64 | U32, true) => "java.lang.Long",
                (U64 | I128 | U128, _) => "java.math.BigInteger",
                (F32, false) => "float",
                (F32, true) => "java.lang.Float",
                (F64, false) => "double",
                (F64, true) => "java.lang.Double",
                (Char, false) => "char",
                (Char, true) => "java.lang.Character",
            },
            ClientTarget::CSharp => match (primitive, nullable) {
                (String, _) => "string",
                (Bool, false) => "bool",
                (Bool, true) => "bool?",
                (I8, false) => "sbyte",
                (I8, true) => "sbyte?",
                (I16, false) => "short",
                (I16, true) => "short?",
                (I32, false) => "int",
                (I32, true) => "int?",
                (I64, false) => "long",
                (I64, true) => "long?",
                (U8, false) => "byte",
                (U8, true) => "byte?",
                (U16 | Char, false) => "ushort",
                (U16 | Char, true) => "ushort?",
                (U32, false) => "uint",
                (U32, true) => "uint?",
                (U64, false) => "ulong",
                (U64, true) => "ulong?",
                (I128 | U128, false) => "decimal",
                (I128 | U128, true) => "decimal?",
                (F32, false) => "float",
                (F32, true) => "float?",
                (F64, false) => "double",
                (F64, true) => "double?",
            },
            ClientTarget::Php => match primitive {
                String => "String",
                Bool => "Boolean",
                _ => "Integer",
            },
            ClientTarget::ActionScript => match primitive {
                String => "String",
                Bool => "Boolean",
                I8 | I16 | I32 | Char => "int",
                U8 | U16 | U32 => "uint",
                _ => "Number",
            },
        }
    }

    fn bytes(&self) -> &'static str {
        match self {
            ClientTarget::Java | ClientTarget::CSharp => "byte[]",
            ClientTarget::Php => "String",
            ClientTarget::ActionScript => "flash.utils.ByteArray",
        }
    }

    fn opaque(&self) -> &'static str {
        match self {
            ClientTarget::Java => "java.lang.Object",
            ClientTarget::CSharp => "object",
            ClientTarget::Php | ClientTarget::ActionScript => "Object",
        }
    }

    /// Names of the well-known scalar types
    fn scalar(&self, raw: &str) -> Option<&'static str> {
        let name = match (self, raw) {
            (ClientTarget::Java, "Uuid") => "java.util.UUID",
            (ClientTarget::Java, "QName") => "javax.xml.namespace.QName",
            (ClientTarget::CSharp, "Uuid") => "string",
            (ClientTarget::CSharp, "QName") => "global::System.Xml.XmlQualifiedName",
            (ClientTarget::Java, "Url") => "java.net.URI",
            (ClientTarget::Java, "DateTime") => "java.util.Date",
            (ClientTarget::CSharp, "Url") => "string",
            (ClientTarget::CSharp, "DateTime") => "global::System.DateTime",
            (ClientTarget::ActionScript, "QName") => "QName",
            (ClientTarget::ActionScript, "DateTime") => "Date",
            (_, "Uuid" | "QName" | "Url" | "DateTime") => "String",
            _ => return None,
        };
        Some(name)
    }

    fn package_separator(&self) -> &'static str {
        match self {
            ClientTarget::Php => "\\",
            _ => ".",
        }
    }

    fn renders_generics(&self) -> bool {
        matches!(self, ClientTarget::Java | ClientTarget::CSharp)
    }
}

/// Derives client type names for one target
pub struct ClientNamer<'m> {
    model: &'m TypeModel,
    target: ClientTarget,
    /// Sorted longest source package first
    conversions: Vec<PackageConversion>,
}

impl<'m> ClientNamer<'m> {
    pub fn new(model: &'m TypeModel, target: ClientTarget, conversions: &[PackageConversion]) -> Self {
        let mut conversions = conversions.to_vec();
        conversions.sort_by(|a, b| b.from.len().cmp(&a.from.len()));
        Self {
            model,
            target,
            conversions,
        }
    }

    pub fn target(&self) -> ClientTarget {
        self.target
    }

    /// Client type name of a classified type
    pub fn type_name(&self, descriptor: &TypeDescriptor) -> String {
        let target = self.target;
        match descriptor.kind() {
            TypeKind::Primitive(primitive) => target.primitive(primitive, descriptor.nullable()).to_string(),
            TypeKind::Bytes => target.bytes().to_string(),
            TypeKind::Collection(flavor) => self.collection(flavor, descriptor.element()),
            TypeKind::Array => match (target, descriptor.element()) {
                (ClientTarget::Java | ClientTarget::CSharp, Some(element)) => {
                    format!("{}[]", self.type_name(element))
                }
                _ => "Array".to_string(),
            },
            TypeKind::Map(_) => {
                let args: Vec<String> = descriptor
                    .args()
                    .iter()
                    .map(|a| match target {
                        ClientTarget::Java => self.type_name(&boxed(a)),
                        _ => self.type_name(a),
                    })
                    .collect();
                match target {
                    ClientTarget::Java => format!("java.util.Map<{}>", args.join(", ")),
                    ClientTarget::CSharp => format!(
                        "global::System.Collections.Generic.Dictionary<{}>",
                        args.join(", ")
                    ),
                    ClientTarget::Php => "Array".to_string(),
                    ClientTarget::ActionScript => "Object".to_string(),
                }
            }
            TypeKind::Reference if descriptor.is_opaque() => target.opaque().to_string(),
            TypeKind::Reference if self.model.type_def(descriptor.raw()).is_none() => target
                .scalar(descriptor.raw())
                .unwrap_or_else(|| target.opaque())
                .to_string(),
            TypeKind::Enum | TypeKind::Bean | TypeKind::Reference => {
                let mut name = self.qualified(descriptor.raw());
                if target.renders_generics() && !descriptor.args().is_empty() {
                    let args: Vec<String> = descriptor.args().iter().map(|a| self.type_name(a)).collect();
                    name = format!("{}<{}>", name, args.join(", "));
                }
                if target == ClientTarget::CSharp
                    && descriptor.kind() == TypeKind::Enum
                    && descriptor.nullable()
                {
                    name.push('?');
                }
                name
            }
        }
    }

    fn collection(&self, flavor: CollectionFlavor, element: Option<&TypeDescriptor>) -> String {
        let element = element.filter(|e| !e.is_opaque());
        match self.target {
            ClientTarget::Java => {
                let container = if flavor.is_set() { "java.util.Set" } else { "java.util.List" };
                let element = element
                    .map(|e| self.type_name(&boxed(e)))
                    .unwrap_or_else(|| ClientTarget::Java.opaque().to_string());
                format!("{}<{}>", container, element)
            }
            ClientTarget::CSharp => match element {
                Some(element) => format!(
                    "global::System.Collections.Generic.List<{}>",
                    self.type_name(element)
                ),
                None => "global::System.Collections.ArrayList".to_string(),
            },
            ClientTarget::Php => "Array".to_string(),
            ClientTarget::ActionScript => "mx.collections.ArrayCollection".to_string(),
        }
    }

    /// Package-qualified name of a model type
    fn qualified(&self, type_name: &str) -> String {
        let package = self
            .model
            .type_def(type_name)
            .map(|def| self.convert_package(&def.package))
            .unwrap_or_default();
        if package.is_empty() {
            type_name.to_string()
        } else {
            let separator = self.target.package_separator();
            format!("{}{}{}", package.replace('.', separator), separator, type_name)
        }
    }

    fn convert_package(&self, package: &str) -> String {
        for conversion in &self.conversions {
            if let Some(rest) = package.strip_prefix(conversion.from.as_str()) {
                if rest.is_empty() || rest.starts_with('.') {
                    return format!("{}{}", conversion.to, rest);
                }
            }
        }
        package.to_string()
    }
}

/// Java generics take boxed element types
fn boxed(descriptor: &TypeDescriptor) -> TypeDescriptor {
    match descriptor.kind() {
        TypeKind::Primitive(_) => descriptor.clone().into_nullable(),
        _ => descriptor.clone(),
    }
}
