//! Custom mappers registered with every resolver for well-known scalar types.

use super::{CustomMapper, ExternalType};
use crate::model::QName;
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// All built-in custom mappers, keyed by the raw type they handle
pub fn defaults() -> Vec<(&'static str, Arc<dyn CustomMapper>)> {
    vec![
        ("Uuid", Arc::new(UuidMapper) as Arc<dyn CustomMapper>),
        ("QName", Arc::new(QNameMapper) as Arc<dyn CustomMapper>),
        ("Url", Arc::new(UrlMapper) as Arc<dyn CustomMapper>),
        ("DateTime", Arc::new(DateTimeMapper) as Arc<dyn CustomMapper>),
    ]
}

/// Maps a 16-byte UUID to its hyphenated string form
#[derive(Debug, Default)]
pub struct UuidMapper;

impl CustomMapper for UuidMapper {
    fn name(&self) -> &str {
        "uuid"
    }

    fn external_type(&self) -> ExternalType {
        ExternalType::schema("string")
    }

    fn to_external(&self, value: &Value) -> Result<Value, String> {
        let uuid = match value {
            Value::Bytes(bytes) => Uuid::from_slice(bytes).map_err(|e| e.to_string())?,
            Value::Str(text) => Uuid::parse_str(text).map_err(|e| e.to_string())?,
            other => return Err(format!("expected uuid bytes, found {}", other.shape())),
        };
        Ok(Value::Str(uuid.hyphenated().to_string()))
    }

    fn to_internal(&self, value: &Value) -> Result<Value, String> {
        match value {
            Value::Str(text) => {
                let uuid = Uuid::parse_str(text).map_err(|e| e.to_string())?;
                Ok(Value::Bytes(uuid.as_bytes().to_vec()))
            }
            other => Err(format!("expected uuid string, found {}", other.shape())),
        }
    }
}

/// Maps a qualified name object to its `{namespace}local` string form
#[derive(Debug, Default)]
pub struct QNameMapper;

impl QNameMapper {
    fn parse(text: &str) -> Result<QName, String> {
        match text.strip_prefix('{') {
            Some(rest) => {
                let (namespace, local) = rest
                    .split_once('}')
                    .ok_or_else(|| format!("unterminated namespace in '{}'", text))?;
                Ok(QName::new(Some(namespace), local))
            }
            None => Ok(QName::new(None, text)),
        }
    }
}

impl CustomMapper for QNameMapper {
    fn name(&self) -> &str {
        "qname"
    }

    fn external_type(&self) -> ExternalType {
        ExternalType::schema("QName")
    }

    fn to_external(&self, value: &Value) -> Result<Value, String> {
        let Some(object) = value.as_object() else {
            return Err(format!("expected qname object, found {}", value.shape()));
        };
        let object = object.borrow();
        let local = match object.get("local") {
            Some(Value::Str(local)) => local.clone(),
            _ => return Err("qname has no local part".to_string()),
        };
        let namespace = match object.get("namespace") {
            Some(Value::Str(namespace)) => Some(namespace.as_str()),
            _ => None,
        };
        Ok(Value::Str(QName::new(namespace, &local).to_string()))
    }

    fn to_internal(&self, value: &Value) -> Result<Value, String> {
        let Value::Str(text) = value else {
            return Err(format!("expected qname string, found {}", value.shape()));
        };
        let qname = Self::parse(text)?;
        let namespace = qname.namespace.map(Value::Str).unwrap_or(Value::Null);
        Ok(Value::object(
            "QName",
            vec![("namespace", namespace), ("local", Value::Str(qname.local))],
        ))
    }
}

/// Maps an absolute URL string to its normalized serialization
#[derive(Debug, Default)]
pub struct UrlMapper;

impl UrlMapper {
    fn normalize(value: &Value) -> Result<Value, String> {
        let Value::Str(text) = value else {
            return Err(format!("expected url string, found {}", value.shape()));
        };
        let url = Url::parse(text).map_err(|e| format!("invalid url '{}': {}", text, e))?;
        Ok(Value::Str(url.into()))
    }
}

impl CustomMapper for UrlMapper {
    fn name(&self) -> &str {
        "url"
    }

    fn external_type(&self) -> ExternalType {
        ExternalType::schema("anyURI")
    }

    fn to_external(&self, value: &Value) -> Result<Value, String> {
        Self::normalize(value)
    }

    fn to_internal(&self, value: &Value) -> Result<Value, String> {
        Self::normalize(value)
    }
}

/// Maps UTC epoch milliseconds to an RFC 3339 timestamp
#[derive(Debug, Default)]
pub struct DateTimeMapper;

impl CustomMapper for DateTimeMapper {
    fn name(&self) -> &str {
        "datetime"
    }

    fn external_type(&self) -> ExternalType {
        ExternalType::schema("dateTime")
    }

    fn to_external(&self, value: &Value) -> Result<Value, String> {
        let instant = match value {
            Value::Int(millis) => i64::try_from(*millis)
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .ok_or_else(|| format!("timestamp {} out of range", millis))?,
            Value::Str(text) => DateTime::parse_from_rfc3339(text)
                .map_err(|e| format!("invalid timestamp '{}': {}", text, e))?
                .with_timezone(&Utc),
            other => return Err(format!("expected epoch millis, found {}", other.shape())),
        };
        Ok(Value::Str(instant.to_rfc3339_opts(SecondsFormat::Millis, true)))
    }

    fn to_internal(&self, value: &Value) -> Result<Value, String> {
        let Value::Str(text) = value else {
            return Err(format!("expected timestamp string, found {}", value.shape()));
        };
        let instant = DateTime::parse_from_rfc3339(text)
            .map_err(|e| format!("invalid timestamp '{}': {}", text, e))?;
        Ok(Value::Int(instant.timestamp_millis() as i128))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_bytes_to_string_and_back() {
        let uuid = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let external = UuidMapper
            .to_external(&Value::Bytes(uuid.as_bytes().to_vec()))
            .unwrap();
        match &external {
            Value::Str(text) => assert_eq!(text, "67e55044-10b1-426f-9247-bb680e5fe0c8"),
            other => panic!("Expected string, got {:?}", other),
        }

        match UuidMapper.to_internal(&external).unwrap() {
            Value::Bytes(bytes) => assert_eq!(bytes, uuid.as_bytes().to_vec()),
            other => panic!("Expected bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_uuid_rejects_wrong_length() {
        let err = UuidMapper.to_external(&Value::Bytes(vec![1, 2, 3])).unwrap_err();
        assert!(!err.is_empty());
        assert!(UuidMapper.to_internal(&Value::Int(5)).is_err());
    }

    #[test]
    fn test_qname_round_trip() {
        let internal = Value::object(
            "QName",
            vec![
                ("namespace", Value::str("urn:shop")),
                ("local", Value::str("order")),
            ],
        );
        let external = QNameMapper.to_external(&internal).unwrap();
        assert!(matches!(&external, Value::Str(s) if s == "{urn:shop}order"));

        let back = QNameMapper.to_internal(&external).unwrap();
        assert!(matches!(back.get("local"), Value::Str(s) if s == "order"));
        assert!(matches!(back.get("namespace"), Value::Str(s) if s == "urn:shop"));

        let plain = QNameMapper.to_internal(&Value::str("order")).unwrap();
        assert!(plain.get("namespace").is_null());
    }

    #[test]
    fn test_qname_unterminated_namespace() {
        assert!(QNameMapper.to_internal(&Value::str("{urn:shop")).is_err());
    }

    #[test]
    fn test_url_is_normalized_both_ways() {
        let external = UrlMapper.to_external(&Value::str("HTTPS://Example.com/a b")).unwrap();
        assert!(matches!(&external, Value::Str(s) if s == "https://example.com/a%20b"));
        assert!(UrlMapper.to_internal(&external).is_ok());

        assert!(UrlMapper.to_external(&Value::str("not a url")).is_err());
        assert!(UrlMapper.to_internal(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_datetime_round_trip() {
        let external = DateTimeMapper.to_external(&Value::Int(1_700_000_000_123)).unwrap();
        assert!(matches!(&external, Value::Str(s) if s == "2023-11-14T22:13:20.123Z"));
        assert!(matches!(DateTimeMapper.to_internal(&external).unwrap(), Value::Int(1_700_000_000_123)));

        let offset = DateTimeMapper.to_internal(&Value::str("2023-11-15T00:13:20.123+02:00")).unwrap();
        assert!(matches!(offset, Value::Int(1_700_000_000_123)));
    }

    #[test]
    fn test_datetime_rejects_bad_input() {
        assert!(DateTimeMapper.to_external(&Value::Int(i128::MAX)).is_err());
        assert!(DateTimeMapper.to_internal(&Value::str("yesterday")).is_err());
        assert!(DateTimeMapper.to_external(&Value::Bool(true)).is_err());
    }
}
