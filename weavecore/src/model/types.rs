use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::model::entity::EntityRef;
use crate::model::name::Name;

/// A type definition: parameters, an optional body expression and a recursion flag.
/// An absent body means the definition is an opaque base type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Type parameters the body can refer to, replaced with arguments while resolving
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<TypeParam>,
    /// The body expression, absent for base types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<TypeExpr>,
    /// Whether references may recurse through this definition. Only base types can have true.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub can_recurse: bool,
}

/// A type parameter of a [TypeDef] or an interface. Names must be unique within one definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    /// Name the definition's body refers to the parameter by
    pub name: Name,
    /// Optional constraint: a resolved supertype bound every argument must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constr: Option<TypeExpr>,
}

/// A type expression: either an instantiation of a named type or a type literal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeExpr {
    /// Reference to a named type plus zero or more type arguments
    Inst(InstExpr),
    /// A structural type literal
    Lit(LitExpr),
}

/// An instantiation expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstExpr {
    /// The referenced type definition. Must be in scope.
    #[serde(rename = "ref")]
    pub reference: EntityRef,
    /// Every parameter of the referenced definition must have a subtype argument
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TypeExpr>,
}

/// A type literal expression
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LitExpr {
    /// Fixed-size array of one element type
    Arr {
        /// Number of elements
        size: usize,
        /// Element type
        elem: Box<TypeExpr>,
    },
    /// Record: ordered fields, each with its own type
    Rec(Vec<RecField>),
    /// Enumeration of unique labels
    Enum(Vec<Name>),
    /// Union of member types, semantically a set with at least two members
    Union(Vec<TypeExpr>),
}

/// One field of a record type literal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecField {
    /// The field name
    pub name: Name,
    /// The field's type
    #[serde(rename = "type")]
    pub type_expr: TypeExpr,
}

impl TypeExpr {
    /// Shorthand for an instantiation of a named type with no arguments
    pub fn named(name: &str) -> Self {
        TypeExpr::Inst(InstExpr {
            reference: EntityRef::local(name),
            args: vec![],
        })
    }

    /// Return the instantiation if this expression is one
    pub fn inst(&self) -> Option<&InstExpr> {
        match self {
            TypeExpr::Inst(inst) => Some(inst),
            TypeExpr::Lit(_) => None,
        }
    }

    /// Return the literal if this expression is one
    pub fn lit(&self) -> Option<&LitExpr> {
        match self {
            TypeExpr::Inst(_) => None,
            TypeExpr::Lit(lit) => Some(lit),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeExpr::Inst(inst) => write!(f, "{inst}"),
            TypeExpr::Lit(lit) => write!(f, "{lit}"),
        }
    }
}

impl fmt::Display for InstExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.reference)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (index, arg) in self.args.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl fmt::Display for LitExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LitExpr::Arr { size, elem } => write!(f, "[{size}]{elem}"),
            LitExpr::Rec(fields) => {
                write!(f, "{{")?;
                for (index, field) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} {}", field.name, field.type_expr)?;
                }
                write!(f, " }}")
            }
            LitExpr::Enum(labels) => {
                write!(f, "{{")?;
                for (index, label) in labels.iter().enumerate() {
                    if index > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {label}")?;
                }
                write!(f, " }}")
            }
            LitExpr::Union(members) => {
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}
