use weavecore::model::types::{InstExpr, LitExpr, TypeExpr};

use crate::errors::*;

/// Check that `sub` is a structural subtype of `sup`, i.e. a message of type
/// `sub` can flow wherever a `sup` is expected
pub fn check(sub: &TypeExpr, sup: &TypeExpr) -> Result<()> {
    match (sub, sup) {
        (TypeExpr::Inst(sub_inst), TypeExpr::Inst(sup_inst)) => check_inst(sub_inst, sup_inst),

        (TypeExpr::Lit(LitExpr::Union(sub_members)), TypeExpr::Lit(LitExpr::Union(_))) => {
            for member in sub_members {
                check(member, sup)
                    .chain_err(|| format!("Union member '{member}' does not fit '{sup}'"))?;
            }
            Ok(())
        }

        // a non-union subtype fits a union if it fits any member
        (_, TypeExpr::Lit(LitExpr::Union(sup_members))) => {
            if sup_members.iter().any(|member| check(sub, member).is_ok()) {
                Ok(())
            } else {
                bail!("Type '{sub}' is not a subtype of any member of '{sup}'")
            }
        }

        (
            TypeExpr::Lit(LitExpr::Arr {
                size: sub_size,
                elem: sub_elem,
            }),
            TypeExpr::Lit(LitExpr::Arr {
                size: sup_size,
                elem: sup_elem,
            }),
        ) => {
            if sub_size != sup_size {
                bail!("Array sizes differ: {sub_size} vs {sup_size}");
            }
            check(sub_elem, sup_elem).chain_err(|| "Array element types are incompatible")
        }

        (TypeExpr::Lit(LitExpr::Rec(sub_fields)), TypeExpr::Lit(LitExpr::Rec(sup_fields))) => {
            // the supertype's fields must be a subset of the subtype's
            for sup_field in sup_fields {
                let sub_field = sub_fields
                    .iter()
                    .find(|field| field.name == sup_field.name)
                    .ok_or_else(|| format!("Record is missing field '{}'", sup_field.name))?;
                check(&sub_field.type_expr, &sup_field.type_expr)
                    .chain_err(|| format!("in record field '{}'", sup_field.name))?;
            }
            Ok(())
        }

        (TypeExpr::Lit(LitExpr::Enum(sub_labels)), TypeExpr::Lit(LitExpr::Enum(sup_labels))) => {
            for label in sub_labels {
                if !sup_labels.contains(label) {
                    bail!("Enum label '{label}' is not present in '{sup}'");
                }
            }
            Ok(())
        }

        _ => bail!("Type '{sub}' is not a subtype of '{sup}'"),
    }
}

fn check_inst(sub: &InstExpr, sup: &InstExpr) -> Result<()> {
    if sub.reference != sup.reference {
        bail!(
            "Type '{}' is not a subtype of '{}'",
            sub.reference,
            sup.reference
        );
    }
    if sub.args.len() != sup.args.len() {
        bail!(
            "Type '{}' instantiated with differing argument counts",
            sub.reference
        );
    }
    for (sub_arg, sup_arg) in sub.args.iter().zip(sup.args.iter()) {
        check(sub_arg, sup_arg)
            .chain_err(|| format!("in type argument of '{}'", sub.reference))?;
    }
    Ok(())
}
