use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::model::entity::EntityRef;
use crate::model::meta::SourceRange;
use crate::model::name::Name;
use crate::model::types::TypeExpr;

/// A constant definition: a type expression and a value.
/// The value must be exactly one of a literal or a reference to another constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Const {
    /// The declared type of the constant
    #[serde(rename = "type")]
    pub type_expr: TypeExpr,
    /// The value of the constant
    pub value: ConstValue,
    /// Where the constant was defined
    #[serde(default, skip_serializing_if = "source_range_is_default")]
    pub meta: SourceRange,
}

fn source_range_is_default(range: &SourceRange) -> bool {
    *range == SourceRange::default()
}

/// The value of a constant. The grammar allows any combination of fields to be
/// present, so this is a bag of optionals; the analyzer enforces that exactly
/// one is set and that it matches the constant's resolved type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstValue {
    /// A boolean literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool: Option<bool>,
    /// An integer literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int: Option<i64>,
    /// A floating point literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float: Option<f64>,
    /// A string literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub str: Option<String>,
    /// A list literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<ConstValue>>,
    /// A record literal, for constants of record, struct or dictionary type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<BTreeMap<Name, ConstValue>>,
    /// An enumeration label, for constants of enum type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<VariantValue>,
    /// A reference to another constant
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<EntityRef>,
}

/// An enumeration label with an optional payload value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantValue {
    /// The enumeration label
    pub tag: Name,
    /// The optional payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<ConstValue>>,
}

impl ConstValue {
    /// Shorthand for an integer literal value
    pub fn of_int(i: i64) -> Self {
        ConstValue {
            int: Some(i),
            ..Default::default()
        }
    }

    /// Shorthand for a string literal value
    pub fn of_str(s: &str) -> Self {
        ConstValue {
            str: Some(s.to_string()),
            ..Default::default()
        }
    }

    /// Shorthand for a reference to another constant
    pub fn of_ref(reference: EntityRef) -> Self {
        ConstValue {
            reference: Some(reference),
            ..Default::default()
        }
    }

    /// The names of all the literal fields that are set, used by the analyzer
    /// to detect constants with several values at once
    pub fn set_fields(&self) -> Vec<&'static str> {
        let mut fields = vec![];
        if self.bool.is_some() {
            fields.push("bool");
        }
        if self.int.is_some() {
            fields.push("int");
        }
        if self.float.is_some() {
            fields.push("float");
        }
        if self.str.is_some() {
            fields.push("str");
        }
        if self.list.is_some() {
            fields.push("list");
        }
        if self.record.is_some() {
            fields.push("record");
        }
        if self.variant.is_some() {
            fields.push("variant");
        }
        fields
    }
}
