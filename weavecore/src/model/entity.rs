use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_derive::{Deserialize as DeriveDeserialize, Serialize as DeriveSerialize};

use crate::errors::Error;
use crate::model::component::Component;
use crate::model::constant::Const;
use crate::model::interface::Interface;
use crate::model::name::Name;
use crate::model::types::TypeDef;

/// The kinds of named definitions a source file can contain
#[derive(Clone, Debug, PartialEq, DeriveSerialize, DeriveDeserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    /// A type definition
    Type(TypeDef),
    /// A constant definition
    Const(Const),
    /// An interface definition
    Interface(Interface),
    /// A component definition
    Component(Component),
}

impl Entity {
    /// Return the kind of the entity as a displayable string
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Type(_) => "type",
            Entity::Const(_) => "const",
            Entity::Interface(_) => "interface",
            Entity::Component(_) => "component",
        }
    }
}

/// A reference to a named entity, optionally qualified with the package it comes from.
/// Serialized as `"name"` or `"package.name"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef {
    /// The package the entity is referenced from, `None` for local and builtin references
    pub pkg: Option<Name>,
    /// The name of the entity within its package
    pub name: Name,
}

impl EntityRef {
    /// Create a reference to an entity in the local package (or a builtin)
    pub fn local(name: &str) -> Self {
        EntityRef {
            pkg: None,
            name: name.to_string(),
        }
    }

    /// Create a reference to an entity in another package
    pub fn qualified(pkg: &str, name: &str) -> Self {
        EntityRef {
            pkg: Some(pkg.to_string()),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.pkg {
            Some(pkg) => write!(f, "{}.{}", pkg, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for EntityRef {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("Entity reference cannot be empty".into());
        }
        match s.split_once('.') {
            Some((pkg, name)) => Ok(EntityRef::qualified(pkg, name)),
            None => Ok(EntityRef::local(s)),
        }
    }
}

impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct EntityRefVisitor;

impl Visitor<'_> for EntityRefVisitor {
    type Value = EntityRef;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an entity reference such as 'name' or 'package.name'")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Self::Value, E> {
        EntityRef::from_str(value).map_err(|e| de::Error::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_str(EntityRefVisitor)
    }
}
