//! Typed metadata attached to each message.

use std::collections::HashMap;
use std::net::SocketAddr;

/// Well-known property keys set by the session on every request.
pub mod keys {
    pub const CONNECTION_ID: &str = "connection.id";
    pub const REQUEST_ID: &str = "request.id";
    pub const LISTENER_ID: &str = "listener.id";
    pub const LISTENER_PORT: &str = "listener.port";
    pub const LOCAL_ADDRESS: &str = "local.address";
    pub const REMOTE_ADDRESS: &str = "remote.address";
    pub const SECURED: &str = "connection.secured";
    pub const HTTP_VERSION: &str = "http.version";
    pub const HTTP_METHOD: &str = "http.method";
    pub const REQUEST_URL: &str = "request.url";
    pub const TO: &str = "to";
    pub const PROTOCOL: &str = "protocol";
    pub const PROCESSOR_ID: &str = "processor.id";
}

/// Protocol name recorded under [`keys::PROTOCOL`].
pub const PROTOCOL_NAME: &str = "http";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Addr(SocketAddr),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_addr(&self) -> Option<SocketAddr> {
        match self {
            PropertyValue::Addr(a) => Some(*a),
            _ => None,
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<SocketAddr> for PropertyValue {
    fn from(value: SocketAddr) -> Self {
        PropertyValue::Addr(value)
    }
}

/// String-keyed property map.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    map: HashMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        self.map.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.map.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropertyValue::as_int)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropertyValue::as_bool)
    }

    pub fn get_addr(&self, key: &str) -> Option<SocketAddr> {
        self.get(key).and_then(PropertyValue::as_addr)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }
}
