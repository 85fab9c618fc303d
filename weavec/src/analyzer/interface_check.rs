use weavecore::model::interface::{duplicate_port_name, Interface, Io, Port};
use weavecore::model::module::Scope;
use weavecore::model::types::TypeParam;

use crate::analyzer::type_resolver::{self, Frame};
use crate::errors::*;

/// Controls whether an interface may have empty port lists. Only the program
/// root component is allowed to.
#[derive(Clone, Copy, Default)]
pub struct InterfaceParams {
    /// Allow the interface to declare no inports
    pub allow_empty_inputs: bool,
    /// Allow the interface to declare no outports
    pub allow_empty_outputs: bool,
}

impl InterfaceParams {
    /// Parameters for the program root, which may leave either side empty
    pub fn for_root() -> Self {
        InterfaceParams {
            allow_empty_inputs: true,
            allow_empty_outputs: true,
        }
    }
}

/// Analyze an interface: resolve its type parameters and every port type,
/// with the parameters in scope
pub fn analyze_interface(
    interface: &Interface,
    scope: &Scope,
    params: InterfaceParams,
) -> Result<Interface> {
    let type_params = analyze_type_params(&interface.type_params, scope)
        .chain_err(|| "Cannot resolve interface type parameters")?;

    let io = analyze_io(&type_params, &interface.io, scope, params)?;

    Ok(Interface { type_params, io })
}

/// Resolve a list of type parameters: unique names, constraints resolved with
/// the parameters themselves in scope
pub fn analyze_type_params(params: &[TypeParam], scope: &Scope) -> Result<Vec<TypeParam>> {
    for (index, param) in params.iter().enumerate() {
        if params[..index].iter().any(|other| other.name == param.name) {
            bail!("Duplicate type parameter name '{}'", param.name);
        }
    }

    let frame = type_resolver::param_frame(params);
    let mut resolved = Vec::with_capacity(params.len());
    for param in params {
        let constr = match &param.constr {
            Some(constr) => Some(
                type_resolver::resolve_expr(constr, scope, &frame)
                    .chain_err(|| format!("in constraint of type parameter '{}'", param.name))?,
            ),
            None => None,
        };
        resolved.push(TypeParam {
            name: param.name.clone(),
            constr,
        });
    }
    Ok(resolved)
}

fn analyze_io(
    type_params: &[TypeParam],
    io: &Io,
    scope: &Scope,
    params: InterfaceParams,
) -> Result<Io> {
    if !params.allow_empty_inputs && io.inputs.is_empty() {
        bail!("Interface must have inports");
    }
    if !params.allow_empty_outputs && io.outputs.is_empty() {
        bail!("Interface must have outports");
    }

    let inputs = analyze_ports(type_params, &io.inputs, scope).chain_err(|| "Inports are invalid")?;
    let outputs =
        analyze_ports(type_params, &io.outputs, scope).chain_err(|| "Outports are invalid")?;

    Ok(Io { inputs, outputs })
}

fn analyze_ports(type_params: &[TypeParam], ports: &[Port], scope: &Scope) -> Result<Vec<Port>> {
    if let Some(name) = duplicate_port_name(ports) {
        bail!("Duplicate port name '{name}'");
    }

    let frame: Frame = type_resolver::param_frame(type_params);
    let mut resolved = Vec::with_capacity(ports.len());
    for port in ports {
        let type_expr = type_resolver::resolve_expr(&port.type_expr, scope, &frame)
            .chain_err(|| format!("in port '{}'", port.name))?;
        resolved.push(Port {
            name: port.name.clone(),
            type_expr,
            is_array: port.is_array,
        });
    }
    Ok(resolved)
}
