use std::collections::BTreeMap;

use weavecore::model::entity::{Entity, EntityRef};
use weavecore::model::meta::Location;
use weavecore::model::module::Scope;
use weavecore::model::name::Name;
use weavecore::model::types::{InstExpr, LitExpr, RecField, TypeDef, TypeExpr, TypeParam};

use crate::analyzer::subtype;
use crate::errors::*;

/// Bindings from type parameter names to the expressions substituted for them
pub type Frame = BTreeMap<Name, TypeExpr>;

/// A frame mapping each parameter to itself, so that unapplied parameters pass
/// through resolution unchanged. Used when resolving a definition's body
/// before any arguments are known.
pub fn param_frame(params: &[TypeParam]) -> Frame {
    params
        .iter()
        .map(|param| (param.name.clone(), TypeExpr::named(&param.name)))
        .collect()
}

/// Resolve a type definition: its parameter constraints and its body, with the
/// parameters themselves in scope
pub fn resolve_def(def: &TypeDef, scope: &Scope) -> Result<TypeDef> {
    for (index, param) in def.params.iter().enumerate() {
        if def.params[..index].iter().any(|other| other.name == param.name) {
            bail!("Duplicate type parameter name '{}'", param.name);
        }
    }

    if def.can_recurse && def.body.is_some() {
        bail!("Only base types can be used for recursive definitions");
    }

    let frame = param_frame(&def.params);

    let mut params = Vec::with_capacity(def.params.len());
    for param in &def.params {
        let constr = match &param.constr {
            Some(constr) => Some(
                resolve_expr(constr, scope, &frame)
                    .chain_err(|| format!("in constraint of type parameter '{}'", param.name))?,
            ),
            None => None,
        };
        params.push(TypeParam {
            name: param.name.clone(),
            constr,
        });
    }

    let body = match &def.body {
        Some(body) => Some(resolve_expr(body, scope, &frame)?),
        None => None,
    };

    Ok(TypeDef {
        params,
        body,
        can_recurse: def.can_recurse,
    })
}

/// Resolve a type expression: named references are replaced by their
/// definitions with parameters substituted by arguments, enforcing arity and
/// constraint bounds along the way
pub fn resolve_expr(expr: &TypeExpr, scope: &Scope, frame: &Frame) -> Result<TypeExpr> {
    resolve_with_trace(expr, scope, frame, &mut vec![])
}

fn resolve_with_trace(
    expr: &TypeExpr,
    scope: &Scope,
    frame: &Frame,
    trace: &mut Vec<String>,
) -> Result<TypeExpr> {
    match expr {
        TypeExpr::Lit(lit) => resolve_lit(lit, scope, frame, trace),
        TypeExpr::Inst(inst) => resolve_inst(inst, scope, frame, trace),
    }
}

fn resolve_lit(
    lit: &LitExpr,
    scope: &Scope,
    frame: &Frame,
    trace: &mut Vec<String>,
) -> Result<TypeExpr> {
    match lit {
        LitExpr::Arr { size, elem } => Ok(TypeExpr::Lit(LitExpr::Arr {
            size: *size,
            elem: Box::new(resolve_with_trace(elem, scope, frame, trace)?),
        })),
        LitExpr::Rec(fields) => {
            let mut resolved = Vec::with_capacity(fields.len());
            for (index, field) in fields.iter().enumerate() {
                if fields[..index].iter().any(|other| other.name == field.name) {
                    bail!("Duplicate record field '{}'", field.name);
                }
                resolved.push(RecField {
                    name: field.name.clone(),
                    type_expr: resolve_with_trace(&field.type_expr, scope, frame, trace)
                        .chain_err(|| format!("in record field '{}'", field.name))?,
                });
            }
            Ok(TypeExpr::Lit(LitExpr::Rec(resolved)))
        }
        LitExpr::Enum(labels) => {
            for (index, label) in labels.iter().enumerate() {
                if labels[..index].contains(label) {
                    bail!("Duplicate enum label '{label}'");
                }
            }
            Ok(TypeExpr::Lit(LitExpr::Enum(labels.clone())))
        }
        LitExpr::Union(members) => {
            let mut resolved: Vec<TypeExpr> = vec![];
            for member in members {
                let member = resolve_with_trace(member, scope, frame, trace)?;
                if !resolved.contains(&member) {
                    resolved.push(member);
                }
            }
            if resolved.len() < 2 {
                bail!("Union must have at least two distinct members");
            }
            Ok(TypeExpr::Lit(LitExpr::Union(resolved)))
        }
    }
}

fn resolve_inst(
    inst: &InstExpr,
    scope: &Scope,
    frame: &Frame,
    trace: &mut Vec<String>,
) -> Result<TypeExpr> {
    // a bare name bound in the frame is a type parameter, not an entity
    if inst.reference.pkg.is_none() {
        if let Some(bound) = frame.get(&inst.reference.name) {
            if !inst.args.is_empty() {
                bail!(
                    "Type parameter '{}' cannot take type arguments",
                    inst.reference.name
                );
            }
            return Ok(bound.clone());
        }
    }

    let (entity, location) = scope
        .entity(&inst.reference)
        .chain_err(|| format!("Cannot resolve type reference '{}'", inst.reference))?;

    let def = match entity {
        Entity::Type(def) => def,
        other => bail!(
            "Type reference '{}' resolves to a {}, not a type",
            inst.reference,
            other.kind()
        ),
    };

    let canonical = canonical_ref(&inst.reference.name, &location);
    let key = canonical.to_string();

    if trace.contains(&key) {
        if def.can_recurse {
            // recursion bottoms out at the base type reference
            return Ok(TypeExpr::Inst(inst.clone()));
        }
        bail!(
            "Recursive reference to type '{}' (via {})",
            inst.reference,
            trace.join(" -> ")
        );
    }

    if inst.args.len() != def.params.len() {
        bail!(
            "Type '{}' takes {} type argument(s) but {} were given",
            inst.reference,
            def.params.len(),
            inst.args.len()
        );
    }

    let mut args = Vec::with_capacity(inst.args.len());
    for arg in &inst.args {
        args.push(resolve_with_trace(arg, scope, frame, trace)?);
    }

    let target_scope = scope.relocate(&location)?;

    // each argument must be a subtype of its parameter's constraint
    let target_frame: Frame = def
        .params
        .iter()
        .zip(args.iter())
        .map(|(param, arg)| (param.name.clone(), arg.clone()))
        .collect();
    for (param, arg) in def.params.iter().zip(args.iter()) {
        if let Some(constr) = &param.constr {
            trace.push(key.clone());
            let constr = resolve_with_trace(constr, &target_scope, &target_frame, trace);
            trace.pop();
            let constr = constr
                .chain_err(|| format!("in constraint of type parameter '{}'", param.name))?;
            subtype::check(arg, &constr).chain_err(|| {
                format!(
                    "Type argument '{arg}' does not satisfy the constraint of parameter '{}' of '{}'",
                    param.name, inst.reference
                )
            })?;
        }
    }

    match &def.body {
        None => Ok(TypeExpr::Inst(InstExpr {
            reference: canonical,
            args,
        })),
        Some(body) => {
            trace.push(key);
            let resolved = resolve_with_trace(body, &target_scope, &target_frame, trace);
            trace.pop();
            resolved.chain_err(|| format!("in body of type '{}'", inst.reference))
        }
    }
}

/// The canonical form of a resolved base type reference: builtins lose any
/// qualification, user types gain the package they were found in. Two
/// instantiations are comparable only if their canonical references are equal.
fn canonical_ref(name: &str, location: &Location) -> EntityRef {
    if location.package == "builtin" {
        EntityRef::local(name)
    } else {
        EntityRef::qualified(&location.package, name)
    }
}
