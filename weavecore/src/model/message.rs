use std::collections::BTreeMap;
use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::model::name::Name;

/// An immutable value exchanged over port channels. Messages are value-copied
/// when a sender fans out to multiple receivers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Message {
    /// A boolean value
    Bool(bool),
    /// A signed integer value
    Int(i64),
    /// A floating point value
    Float(f64),
    /// A string value
    Str(String),
    /// An ordered list of values
    List(Vec<Message>),
    /// A dictionary with arbitrary string keys
    Dict(BTreeMap<Name, Message>),
    /// A structure with a fixed, typed set of fields
    Struct(BTreeMap<Name, Message>),
    /// A value of an enumeration, with an optional payload
    Variant {
        /// The enumeration label
        tag: Name,
        /// The optional payload carried with the label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Box<Message>>,
    },
}

impl Message {
    /// Return the integer carried by the message, if it is an [Message::Int]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Message::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Return the string carried by the message, if it is a [Message::Str]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Message::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Return the boolean carried by the message, if it is a [Message::Bool]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Message::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

fn write_fields(f: &mut fmt::Formatter, fields: &BTreeMap<Name, Message>) -> fmt::Result {
    write!(f, "{{")?;
    for (index, (name, value)) in fields.iter().enumerate() {
        if index > 0 {
            write!(f, ",")?;
        }
        write!(f, " {name}: {value}")?;
    }
    write!(f, " }}")
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::Bool(b) => write!(f, "{b}"),
            Message::Int(i) => write!(f, "{i}"),
            Message::Float(v) => write!(f, "{v}"),
            Message::Str(s) => write!(f, "{s}"),
            Message::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Message::Dict(entries) => write_fields(f, entries),
            Message::Struct(fields) => write_fields(f, fields),
            Message::Variant { tag, payload } => match payload {
                Some(payload) => write!(f, "{tag}({payload})"),
                None => write!(f, "{tag}"),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::Message;

    #[test]
    fn display_scalars() {
        assert_eq!(Message::Bool(true).to_string(), "true");
        assert_eq!(Message::Int(-3).to_string(), "-3");
        assert_eq!(Message::Str("hello".into()).to_string(), "hello");
    }

    #[test]
    fn display_list() {
        let list = Message::List(vec![Message::Int(1), Message::Int(2)]);
        assert_eq!(list.to_string(), "[1, 2]");
    }

    #[test]
    fn display_struct() {
        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), Message::Int(1));
        fields.insert("y".to_string(), Message::Int(2));
        assert_eq!(Message::Struct(fields).to_string(), "{ x: 1, y: 2 }");
    }

    #[test]
    fn display_variant() {
        let variant = Message::Variant {
            tag: "red".into(),
            payload: None,
        };
        assert_eq!(variant.to_string(), "red");
    }

    #[test]
    fn serde_int() {
        let json = serde_json::to_string(&Message::Int(42)).expect("Could not serialize");
        assert_eq!(json, "{\"int\":42}");
    }
}
