//! Runtime values converted by the object graph mapper.
//!
//! Sequences, maps and objects are shared, mutable instances (`Rc<RefCell>`)
//! so that a graph can hold the same instance in several places, or itself.
//! Identity of those instances is what a conversion session tracks.

use crate::descriptor::{CollectionFlavor, MapFlavor};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type SeqRef = Rc<RefCell<Sequence>>;
pub type MapRef = Rc<RefCell<MapValue>>;
pub type ObjectRef = Rc<RefCell<Object>>;

/// A runtime value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    /// An enum constant
    Enum(String),
    Seq(SeqRef),
    Map(MapRef),
    Object(ObjectRef),
}

/// An ordered sequence tagged with its concrete container flavor
#[derive(Debug, Clone)]
pub struct Sequence {
    pub flavor: CollectionFlavor,
    pub items: Vec<Value>,
}

/// Map entries in insertion order, tagged with the concrete map flavor
#[derive(Debug, Clone)]
pub struct MapValue {
    pub flavor: MapFlavor,
    pub entries: Vec<(Value, Value)>,
}

/// A bean instance: runtime type name and property values
#[derive(Debug, Clone)]
pub struct Object {
    pub type_name: String,
    properties: HashMap<String, Value>,
}

impl Object {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            properties: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.properties.insert(name.to_string(), value);
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

impl Value {
    /// A new object instance with the given properties
    pub fn object(type_name: &str, properties: Vec<(&str, Value)>) -> Value {
        let mut object = Object::new(type_name);
        for (name, value) in properties {
            object.set(name, value);
        }
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn seq(flavor: CollectionFlavor, items: Vec<Value>) -> Value {
        Value::Seq(Rc::new(RefCell::new(Sequence { flavor, items })))
    }

    pub fn map(flavor: MapFlavor, entries: Vec<(Value, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(MapValue { flavor, entries })))
    }

    pub fn str(value: &str) -> Value {
        Value::Str(value.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Instance identity of shared values; `None` for plain values
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Seq(seq) => Some(Rc::as_ptr(seq) as *const () as usize),
            Value::Map(map) => Some(Rc::as_ptr(map) as *const () as usize),
            Value::Object(object) => Some(Rc::as_ptr(object) as *const () as usize),
            _ => None,
        }
    }

    /// Whether both values are the same shared instance
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqRef> {
        match self {
            Value::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Runtime type name of an object value
    pub fn type_name(&self) -> Option<String> {
        self.as_object().map(|o| o.borrow().type_name.clone())
    }

    /// Property of an object value; `Null` when absent or not an object
    pub fn get(&self, name: &str) -> Value {
        self.as_object()
            .and_then(|o| o.borrow().get(name).cloned())
            .unwrap_or(Value::Null)
    }

    /// Element of a sequence value; `Null` when out of range or not a sequence
    pub fn item(&self, index: usize) -> Value {
        self.as_seq()
            .and_then(|s| s.borrow().items.get(index).cloned())
            .unwrap_or(Value::Null)
    }

    /// Total order used for set elements: plain values by content, shared
    /// instances by identity
    pub fn element_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) | (Value::Enum(a), Value::Enum(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => (self.rank(), self.identity()).cmp(&(other.rank(), other.identity())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Char(_) => 4,
            Value::Str(_) => 5,
            Value::Bytes(_) => 6,
            Value::Enum(_) => 7,
            Value::Seq(_) => 8,
            Value::Map(_) => 9,
            Value::Object(_) => 10,
        }
    }

    /// Short shape name for diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }
}

// Debug must not recurse into shared instances: graphs may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::Str(v) => write!(f, "Str({:?})", v),
            Value::Bytes(v) => write!(f, "Bytes(len={})", v.len()),
            Value::Enum(v) => write!(f, "Enum({})", v),
            Value::Seq(seq) => match seq.try_borrow() {
                Ok(seq) => write!(f, "Seq({:?}, len={})", seq.flavor, seq.items.len()),
                Err(_) => write!(f, "Seq(<borrowed>)"),
            },
            Value::Map(map) => match map.try_borrow() {
                Ok(map) => write!(f, "Map({:?}, len={})", map.flavor, map.entries.len()),
                Err(_) => write!(f, "Map(<borrowed>)"),
            },
            Value::Object(object) => match object.try_borrow() {
                Ok(object) => write!(f, "Object({})", object.type_name),
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
        }
    }
}
