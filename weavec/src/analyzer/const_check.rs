use weavecore::model::constant::Const;
use weavecore::model::entity::Entity;
use weavecore::model::module::Scope;
use weavecore::model::types::{LitExpr, TypeExpr};

use crate::analyzer::subtype;
use crate::analyzer::type_resolver::{self, Frame};
use crate::errors::*;

/// Analyze a constant: its value must be exactly one of a literal or a
/// reference, reference chains must be acyclic and terminate in a literal,
/// and a literal must match the constant's resolved type
pub fn analyze_const(constant: &Const, scope: &Scope) -> Result<Const> {
    analyze_with_trace(constant, scope, &mut vec![])
}

fn analyze_with_trace(constant: &Const, scope: &Scope, trace: &mut Vec<String>) -> Result<Const> {
    let literal_fields = constant.value.set_fields();

    let resolved_type = type_resolver::resolve_expr(&constant.type_expr, scope, &Frame::new())
        .chain_err(|| "Cannot resolve constant type")?;

    if matches!(resolved_type.lit(), Some(LitExpr::Union(_))) {
        bail!("Constant cannot have a union type");
    }

    match (&constant.value.reference, literal_fields.is_empty()) {
        (None, true) => {
            bail!("Constant must either have a value or reference another constant")
        }
        (Some(_), false) => {
            bail!(
                "Constant cannot have several values at once: reference and {}",
                literal_fields.join(", ")
            )
        }
        (Some(reference), true) => {
            let key = reference.to_string();
            if trace.contains(&key) {
                bail!(
                    "Cyclic constant reference: {} -> {}",
                    trace.join(" -> "),
                    key
                );
            }

            let (entity, location) = scope
                .entity(reference)
                .chain_err(|| format!("Cannot resolve constant reference '{reference}'"))?;
            let target = match entity {
                Entity::Const(target) => target,
                other => bail!(
                    "Constant refers to an entity that is not a constant: {}",
                    other.kind()
                ),
            };

            trace.push(key);
            let target_scope = scope.relocate(&location)?;
            let resolved_target = analyze_with_trace(target, &target_scope, trace);
            trace.pop();
            let resolved_target =
                resolved_target.chain_err(|| format!("in referenced constant '{reference}'"))?;

            subtype::check(&resolved_target.type_expr, &resolved_type).chain_err(|| {
                format!("Referenced constant '{reference}' does not fit the declared type")
            })?;

            Ok(Const {
                type_expr: resolved_type,
                value: constant.value.clone(),
                meta: constant.meta,
            })
        }
        (None, false) => {
            check_literal(constant, &literal_fields, &resolved_type)?;
            Ok(Const {
                type_expr: resolved_type,
                value: constant.value.clone(),
                meta: constant.meta,
            })
        }
    }
}

/// Check that exactly the literal field(s) matching the resolved type are set
fn check_literal(constant: &Const, set_fields: &[&str], resolved_type: &TypeExpr) -> Result<()> {
    let expected: &[&str] = match resolved_type {
        TypeExpr::Inst(inst) => match inst.reference.to_string().as_str() {
            "bool" => &["bool"],
            "int" => &["int"],
            // integer literals are permissible for float type, widened later
            "float" => &["float", "int"],
            "str" => &["str"],
            "list" => &["list"],
            "map" => &["record"],
            other => bail!("Cannot declare a constant of type '{other}'"),
        },
        TypeExpr::Lit(LitExpr::Rec(_)) => &["record"],
        TypeExpr::Lit(LitExpr::Enum(labels)) => {
            check_exactly(set_fields, &["variant"], "enum")?;
            if let Some(variant) = &constant.value.variant {
                if !labels.contains(&variant.tag) {
                    bail!("Label '{}' is not a member of '{resolved_type}'", variant.tag);
                }
            }
            return Ok(());
        }
        TypeExpr::Lit(LitExpr::Arr { .. }) => &["list"],
        TypeExpr::Lit(LitExpr::Union(_)) => bail!("Constant cannot have a union type"),
    };

    check_exactly(set_fields, expected, &resolved_type.to_string())
}

fn check_exactly(set_fields: &[&str], expected: &[&str], type_name: &str) -> Result<()> {
    if set_fields.is_empty() {
        bail!("Value is missing in constant of type '{type_name}'");
    }
    if set_fields.len() > 1 {
        bail!(
            "Constant cannot have several values at once: {}",
            set_fields.join(", ")
        );
    }
    if !expected.contains(&set_fields[0]) {
        bail!(
            "Constant of type '{type_name}' cannot have a '{}' value",
            set_fields[0]
        );
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use weavecore::model::constant::{Const, ConstValue, VariantValue};
    use weavecore::model::entity::{Entity, EntityRef};
    use weavecore::model::meta::SourceRange;
    use weavecore::model::module::{Module, Scope, SourceFile};
    use weavecore::model::types::{LitExpr, TypeExpr};

    use super::analyze_const;

    fn constant(type_expr: TypeExpr, value: ConstValue) -> Const {
        Const {
            type_expr,
            value,
            meta: SourceRange::default(),
        }
    }

    fn scope_module(entities: Vec<(&str, Const)>) -> Module {
        let mut file = SourceFile {
            name: "test.wv".into(),
            ..Default::default()
        };
        for (name, c) in entities {
            file.entities.insert(name.to_string(), Entity::Const(c));
        }
        Module::single_file(file)
    }

    #[test]
    fn int_constant_accepted() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let c = constant(TypeExpr::named("int"), ConstValue::of_int(42));
        assert!(analyze_const(&c, &scope).is_ok());
    }

    #[test]
    fn missing_value_rejected() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let c = constant(TypeExpr::named("int"), ConstValue::default());
        assert!(analyze_const(&c, &scope).is_err());
    }

    #[test]
    fn several_values_rejected() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let value = ConstValue {
            int: Some(1),
            str: Some("one".into()),
            ..Default::default()
        };
        let c = constant(TypeExpr::named("int"), value);
        assert!(analyze_const(&c, &scope).is_err());
    }

    #[test]
    fn wrong_kind_rejected() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let c = constant(TypeExpr::named("int"), ConstValue::of_str("nope"));
        assert!(analyze_const(&c, &scope).is_err());
    }

    #[test]
    fn float_accepts_integer_literal() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let c = constant(TypeExpr::named("float"), ConstValue::of_int(3));
        assert!(analyze_const(&c, &scope).is_ok());
    }

    #[test]
    fn float_with_both_literals_rejected() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let value = ConstValue {
            int: Some(3),
            float: Some(3.0),
            ..Default::default()
        };
        let c = constant(TypeExpr::named("float"), value);
        assert!(analyze_const(&c, &scope).is_err());
    }

    #[test]
    fn union_type_rejected() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let union = TypeExpr::Lit(LitExpr::Union(vec![
            TypeExpr::named("int"),
            TypeExpr::named("str"),
        ]));
        let c = constant(union, ConstValue::of_int(1));
        assert!(analyze_const(&c, &scope).is_err());
    }

    #[test]
    fn enum_constant_takes_variant() {
        let module = scope_module(vec![]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let colors = TypeExpr::Lit(LitExpr::Enum(vec!["red".into(), "green".into()]));
        let value = ConstValue {
            variant: Some(VariantValue {
                tag: "red".into(),
                payload: None,
            }),
            ..Default::default()
        };
        assert!(analyze_const(&constant(colors, value), &scope).is_ok());
    }

    #[test]
    fn reference_chain_resolves() {
        let terminal = constant(TypeExpr::named("int"), ConstValue::of_int(7));
        let middle = constant(
            TypeExpr::named("int"),
            ConstValue::of_ref(EntityRef::local("terminal")),
        );
        let module = scope_module(vec![("terminal", terminal), ("middle", middle)]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let head = constant(
            TypeExpr::named("int"),
            ConstValue::of_ref(EntityRef::local("middle")),
        );
        assert!(analyze_const(&head, &scope).is_ok());
    }

    #[test]
    fn cyclic_reference_rejected() {
        let a = constant(
            TypeExpr::named("int"),
            ConstValue::of_ref(EntityRef::local("b")),
        );
        let b = constant(
            TypeExpr::named("int"),
            ConstValue::of_ref(EntityRef::local("a")),
        );
        let module = scope_module(vec![("a", a.clone()), ("b", b)]);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let err = analyze_const(&a, &scope).expect_err("Cycle should be rejected");
        assert!(format!("{err}").contains("Cyclic") || {
            let chain: Vec<String> = err.iter().map(|e| e.to_string()).collect();
            chain.iter().any(|msg| msg.contains("Cyclic"))
        });
    }

    #[test]
    fn reference_to_non_constant_rejected() {
        let mut file = SourceFile {
            name: "test.wv".into(),
            ..Default::default()
        };
        file.entities.insert(
            "thing".to_string(),
            Entity::Type(weavecore::model::types::TypeDef::default()),
        );
        let module = Module::single_file(file);
        let scope = Scope::new(&module, "main", 0).expect("Could not create scope");
        let c = constant(
            TypeExpr::named("int"),
            ConstValue::of_ref(EntityRef::local("thing")),
        );
        assert!(analyze_const(&c, &scope).is_err());
    }
}
