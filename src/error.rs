use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Where a resolution was requested from, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSite {
    /// Type declaring the property being resolved
    pub declaring_type: Option<String>,
    /// Property being resolved
    pub property: Option<String>,
}

impl MappingSite {
    pub fn property(declaring_type: &str, property: &str) -> Self {
        Self {
            declaring_type: Some(declaring_type.to_string()),
            property: Some(property.to_string()),
        }
    }
}

impl fmt::Display for MappingSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.declaring_type, &self.property) {
            (Some(owner), Some(property)) => write!(f, "property '{}' of {}", property, owner),
            (Some(owner), None) => write!(f, "{}", owner),
            (None, Some(property)) => write!(f, "property '{}'", property),
            (None, None) => write!(f, "top-level request"),
        }
    }
}

/// Source location of a declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<PathBuf>,
    pub type_name: String,
    pub property: Option<String>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file.display())?;
        }
        write!(f, "{}", self.type_name)?;
        if let Some(property) = &self.property {
            write!(f, ".{}", property)?;
        }
        Ok(())
    }
}

/// Error types for the library
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot classify type {type_name}: {reason}")]
    Classification { type_name: String, reason: String },

    #[error("no mapper available for type {type_name} ({site})")]
    NoMapperAvailable { type_name: String, site: MappingSite },

    #[error("{location}: no global declaration is assignable to {base_type}")]
    CrossReferenceUnresolved {
        base_type: String,
        location: SourceLocation,
    },

    #[error("{}", mapping_failure_message(.property, .declaring_type, .cause))]
    MappingFailure {
        property: Option<String>,
        declaring_type: String,
        cause: String,
    },

    #[error("cannot construct mapper for {type_name}: {reason}")]
    ConstructionFailure { type_name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error {}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn mapping_failure_message(property: &Option<String>, declaring_type: &str, cause: &str) -> String {
    match property {
        Some(property) => format!(
            "unable to map property '{}' of {}: {}",
            property, declaring_type, cause
        ),
        None => format!("unable to map value of {}: {}", declaring_type, cause),
    }
}

impl Error {
    pub(crate) fn mapping(declaring_type: &str, cause: impl Into<String>) -> Self {
        Error::MappingFailure {
            property: None,
            declaring_type: declaring_type.to_string(),
            cause: cause.into(),
        }
    }

    /// Attach property context to a mapping failure that has none yet
    pub(crate) fn in_property(self, declaring_type: &str, property: &str) -> Self {
        match self {
            Error::MappingFailure {
                property: None,
                cause,
                declaring_type: inner,
            } => Error::MappingFailure {
                property: Some(property.to_string()),
                declaring_type: declaring_type.to_string(),
                cause: format!("{} ({})", cause, inner),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::Parse {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}
