use std::collections::BTreeMap;

use weavecore::model::constant::{Const, ConstValue};
use weavecore::model::entity::Entity;
use weavecore::model::message::Message;
use weavecore::model::module::Scope;
use weavecore::model::types::{LitExpr, TypeExpr};

use crate::errors::*;

/// Evaluate a resolved constant into the runtime message it denotes,
/// recursively unfolding references and literals
pub fn eval_const(constant: &Const, scope: &Scope) -> Result<Message> {
    eval_value(&constant.value, &constant.type_expr, scope)
}

fn eval_value(value: &ConstValue, type_expr: &TypeExpr, scope: &Scope) -> Result<Message> {
    if let Some(reference) = &value.reference {
        let (entity, location) = scope
            .entity(reference)
            .chain_err(|| format!("Cannot resolve constant reference '{reference}'"))?;
        let target = match entity {
            Entity::Const(target) => target,
            other => bail!(
                "Constant reference '{reference}' resolves to a {}, not a constant",
                other.kind()
            ),
        };
        let target_scope = scope.relocate(&location)?;
        return eval_const(target, &target_scope);
    }

    match type_expr {
        TypeExpr::Inst(inst) => match inst.reference.to_string().as_str() {
            "bool" => value
                .bool
                .map(Message::Bool)
                .ok_or_else(|| "Boolean value is missing".into()),
            "int" => value
                .int
                .map(Message::Int)
                .ok_or_else(|| "Integer value is missing".into()),
            "float" => {
                // integer literals for float constants are widened here
                match (value.float, value.int) {
                    (Some(f), _) => Ok(Message::Float(f)),
                    (None, Some(i)) => Ok(Message::Float(i as f64)),
                    (None, None) => bail!("Float value is missing"),
                }
            }
            "str" => value
                .str
                .clone()
                .map(Message::Str)
                .ok_or_else(|| "String value is missing".into()),
            "list" => {
                let items = value
                    .list
                    .as_ref()
                    .ok_or("List value is missing")?;
                let elem_type = inst
                    .args
                    .first()
                    .ok_or("List type has no element type")?;
                let mut messages = Vec::with_capacity(items.len());
                for item in items {
                    messages.push(eval_value(item, elem_type, scope)?);
                }
                Ok(Message::List(messages))
            }
            "map" => {
                let entries = value
                    .record
                    .as_ref()
                    .ok_or("Map value is missing")?;
                let value_type = inst.args.first().ok_or("Map type has no value type")?;
                let mut messages = BTreeMap::new();
                for (name, entry) in entries {
                    messages.insert(name.clone(), eval_value(entry, value_type, scope)?);
                }
                Ok(Message::Dict(messages))
            }
            other => bail!("Cannot evaluate a constant of type '{other}'"),
        },
        TypeExpr::Lit(LitExpr::Rec(fields)) => {
            let entries = value
                .record
                .as_ref()
                .ok_or("Record value is missing")?;
            let mut messages = BTreeMap::new();
            for field in fields {
                let entry = entries
                    .get(&field.name)
                    .ok_or_else(|| format!("Record value is missing field '{}'", field.name))?;
                messages.insert(
                    field.name.clone(),
                    eval_value(entry, &field.type_expr, scope)
                        .chain_err(|| format!("in record field '{}'", field.name))?,
                );
            }
            Ok(Message::Struct(messages))
        }
        TypeExpr::Lit(LitExpr::Enum(labels)) => {
            let variant = value
                .variant
                .as_ref()
                .ok_or("Enum value is missing")?;
            if !labels.contains(&variant.tag) {
                bail!("Label '{}' is not a member of '{type_expr}'", variant.tag);
            }
            if variant.payload.is_some() {
                bail!("An enum constant cannot carry a payload");
            }
            Ok(Message::Variant {
                tag: variant.tag.clone(),
                payload: None,
            })
        }
        TypeExpr::Lit(LitExpr::Arr { size, elem }) => {
            let items = value.list.as_ref().ok_or("List value is missing")?;
            if items.len() != *size {
                bail!(
                    "Array constant has {} element(s) but its type wants {size}",
                    items.len()
                );
            }
            let mut messages = Vec::with_capacity(items.len());
            for item in items {
                messages.push(eval_value(item, elem, scope)?);
            }
            Ok(Message::List(messages))
        }
        TypeExpr::Lit(LitExpr::Union(_)) => bail!("Constant cannot have a union type"),
    }
}
