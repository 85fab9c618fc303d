use std::collections::BTreeMap;

use weavecore::model::component::{Component, Node};
use weavecore::model::connection::{Connection, PortAddr, ReceiverSide, SenderSide};
use weavecore::model::entity::Entity;
use weavecore::model::interface::{Interface, Io, Port};
use weavecore::model::module::Scope;
use weavecore::model::name::Name;
use weavecore::model::types::{LitExpr, TypeExpr};

use crate::analyzer::interface_check::{self, InterfaceParams};
use crate::analyzer::subtype;
use crate::analyzer::type_resolver::{self, Frame};
use crate::errors::*;

/// Analyze a component: its interface, every node and every connection.
/// "Then" chains in the network are expanded into flat connections here, so
/// later passes only see explicit senders and receiver port sets.
pub fn analyze_component(component: &Component, scope: &Scope, is_root: bool) -> Result<Component> {
    // primitives such as Void legitimately have one-sided interfaces
    let params = if is_root || component.extern_args().is_some() {
        InterfaceParams::for_root()
    } else {
        InterfaceParams::default()
    };
    let interface = interface_check::analyze_interface(&component.interface, scope, params)?;

    if component.extern_args().is_some() {
        if !component.nodes.is_empty() || !component.net.is_empty() {
            bail!("A component bound to a runtime function cannot have nodes or connections");
        }
        return Ok(Component {
            interface,
            directives: component.directives.clone(),
            nodes: BTreeMap::new(),
            net: vec![],
            meta: component.meta,
        });
    }

    let frame = type_resolver::param_frame(&interface.type_params);

    let mut nodes = BTreeMap::new();
    for (name, node) in &component.nodes {
        let analyzed =
            analyze_node(node, scope, &frame).chain_err(|| format!("in node '{name}'"))?;
        nodes.insert(name.clone(), analyzed);
    }

    let tables = PortTables::build(&interface, &nodes, scope, &frame)?;

    let mut net = vec![];
    for connection in &component.net {
        let expanded = analyze_connection(connection, &tables, scope)
            .chain_err(|| connection_context(connection))?;
        net.extend(expanded);
    }

    Ok(Component {
        interface,
        directives: component.directives.clone(),
        nodes,
        net,
        meta: component.meta,
    })
}

/// The context a failing connection is reported with. Desugared connections
/// keep the range of the source line they came from.
fn connection_context(connection: &Connection) -> String {
    use weavecore::model::meta::SourceRange;

    if connection.meta == SourceRange::default() {
        format!("in connection from '{}'", connection.sender)
    } else {
        format!(
            "in connection from '{}' at {}",
            connection.sender, connection.meta
        )
    }
}

/// Analyze a node: its entity must resolve to a component or interface, its
/// type arguments must satisfy the target's parameters, and its dependency
/// nodes must implement the interfaces they substitute for
fn analyze_node(node: &Node, scope: &Scope, frame: &Frame) -> Result<Node> {
    let (entity, location) = scope
        .entity(&node.component)
        .chain_err(|| format!("Cannot resolve node entity '{}'", node.component))?;

    let target_iface = match entity {
        Entity::Component(target) => &target.interface,
        Entity::Interface(target) => target,
        other => bail!(
            "Node must refer to a component or interface, not a {}",
            other.kind()
        ),
    };

    let mut type_args = Vec::with_capacity(node.type_args.len());
    for arg in &node.type_args {
        type_args.push(type_resolver::resolve_expr(arg, scope, frame)?);
    }

    if type_args.len() != target_iface.type_params.len() {
        bail!(
            "'{}' takes {} type argument(s) but {} were given",
            node.component,
            target_iface.type_params.len(),
            type_args.len()
        );
    }

    let target_scope = scope.relocate(&location)?;
    let target_frame: Frame = target_iface
        .type_params
        .iter()
        .zip(type_args.iter())
        .map(|(param, arg)| (param.name.clone(), arg.clone()))
        .collect();
    for (param, arg) in target_iface.type_params.iter().zip(type_args.iter()) {
        if let Some(constr) = &param.constr {
            let constr = type_resolver::resolve_expr(constr, &target_scope, &target_frame)
                .chain_err(|| format!("in constraint of type parameter '{}'", param.name))?;
            subtype::check(arg, &constr).chain_err(|| {
                format!(
                    "Type argument '{arg}' does not satisfy the constraint of parameter '{}'",
                    param.name
                )
            })?;
        }
    }

    let mut deps = BTreeMap::new();
    for (dep_name, dep_node) in &node.deps {
        let analyzed_dep = analyze_node(dep_node, scope, frame)
            .chain_err(|| format!("in dependency '{dep_name}'"))?;
        check_dependency(entity, dep_name, &analyzed_dep, scope, &target_scope, frame)
            .chain_err(|| format!("in dependency '{dep_name}'"))?;
        deps.insert(dep_name.clone(), analyzed_dep);
    }

    Ok(Node {
        component: node.component.clone(),
        type_args,
        deps,
        directives: node.directives.clone(),
        meta: node.meta,
    })
}

/// A dependency node substitutes for an interface-typed child of the target
/// component. It must exist there, and the dependency must implement the
/// interface: same port names, inputs at least as general, outputs at most.
fn check_dependency(
    target: &Entity,
    dep_name: &Name,
    dep_node: &Node,
    scope: &Scope,
    target_scope: &Scope,
    frame: &Frame,
) -> Result<()> {
    let target_component = match target {
        Entity::Component(component) => component,
        _ => bail!("Only component nodes can take dependencies"),
    };

    let child = target_component
        .nodes
        .get(dep_name)
        .ok_or_else(|| format!("Target component has no node '{dep_name}'"))?;

    let (child_entity, child_location) = target_scope.entity(&child.component)?;
    let iface = match child_entity {
        Entity::Interface(iface) => iface,
        other => bail!(
            "Dependency target '{}' is a {}, not an interface",
            child.component,
            other.kind()
        ),
    };
    let iface_scope = target_scope.relocate(&child_location)?;
    let iface_io = resolve_io(&iface.io, &iface_scope, &Frame::new())?;

    let dep_io = node_io(dep_node, scope, frame)?;

    for iface_port in &iface_io.inputs {
        let dep_port = dep_io.input(&iface_port.name).ok_or_else(|| {
            format!("Dependency is missing inport '{}'", iface_port.name)
        })?;
        if dep_port.is_array != iface_port.is_array {
            bail!("Inport '{}' differs in arrayness", iface_port.name);
        }
        subtype::check(&iface_port.type_expr, &dep_port.type_expr)
            .chain_err(|| format!("in inport '{}'", iface_port.name))?;
    }
    for iface_port in &iface_io.outputs {
        let dep_port = dep_io.output(&iface_port.name).ok_or_else(|| {
            format!("Dependency is missing outport '{}'", iface_port.name)
        })?;
        if dep_port.is_array != iface_port.is_array {
            bail!("Outport '{}' differs in arrayness", iface_port.name);
        }
        subtype::check(&dep_port.type_expr, &iface_port.type_expr)
            .chain_err(|| format!("in outport '{}'", iface_port.name))?;
    }

    Ok(())
}

/// The ports a node exposes to the enclosing network: the target's interface
/// with the node's type arguments substituted in
pub fn node_io(node: &Node, scope: &Scope, frame: &Frame) -> Result<Io> {
    let (entity, location) = scope.entity(&node.component)?;
    let iface = match entity {
        Entity::Component(target) => &target.interface,
        Entity::Interface(target) => target,
        other => bail!(
            "Node must refer to a component or interface, not a {}",
            other.kind()
        ),
    };

    let mut args = Vec::with_capacity(node.type_args.len());
    for arg in &node.type_args {
        args.push(type_resolver::resolve_expr(arg, scope, frame)?);
    }
    if args.len() != iface.type_params.len() {
        bail!(
            "'{}' takes {} type argument(s) but {} were given",
            node.component,
            iface.type_params.len(),
            args.len()
        );
    }

    let target_scope = scope.relocate(&location)?;
    let target_frame: Frame = iface
        .type_params
        .iter()
        .zip(args.iter())
        .map(|(param, arg)| (param.name.clone(), arg.clone()))
        .collect();

    resolve_io(&iface.io, &target_scope, &target_frame)
}

fn resolve_io(io: &Io, scope: &Scope, frame: &Frame) -> Result<Io> {
    let resolve_ports = |ports: &[Port]| -> Result<Vec<Port>> {
        ports
            .iter()
            .map(|port| {
                Ok(Port {
                    name: port.name.clone(),
                    type_expr: type_resolver::resolve_expr(&port.type_expr, scope, frame)
                        .chain_err(|| format!("in port '{}'", port.name))?,
                    is_array: port.is_array,
                })
            })
            .collect()
    };
    Ok(Io {
        inputs: resolve_ports(&io.inputs)?,
        outputs: resolve_ports(&io.outputs)?,
    })
}

/// Lookup tables for connection checking: the component's own ports and each
/// node's substituted ports
struct PortTables {
    own: Io,
    nodes: BTreeMap<Name, Io>,
}

impl PortTables {
    fn build(
        interface: &Interface,
        nodes: &BTreeMap<Name, Node>,
        scope: &Scope,
        frame: &Frame,
    ) -> Result<Self> {
        let mut node_ios = BTreeMap::new();
        for (name, node) in nodes {
            let io = node_io(node, scope, frame).chain_err(|| format!("in node '{name}'"))?;
            node_ios.insert(name.clone(), io);
        }
        Ok(PortTables {
            own: interface.io.clone(),
            nodes: node_ios,
        })
    }

    fn node(&self, name: &Name) -> Result<&Io> {
        self.nodes
            .get(name)
            .ok_or_else(|| format!("Node '{name}' does not exist").into())
    }

    /// The port a sender address refers to: a node's outport, or one of the
    /// component's own inports via the synthetic `in` node
    fn sender_port(&self, addr: &PortAddr) -> Result<&Port> {
        let port = if addr.node == "in" {
            self.own.input(&addr.port)
        } else {
            self.node(&addr.node)?.output(&addr.port)
        };
        port.ok_or_else(|| format!("Outport '{addr}' does not exist").into())
    }

    /// The port a receiver address refers to: a node's inport, or one of the
    /// component's own outports via the synthetic `out` node
    fn receiver_port(&self, addr: &PortAddr) -> Result<&Port> {
        let port = if addr.node == "out" {
            self.own.output(&addr.port)
        } else {
            self.node(&addr.node)?.input(&addr.port)
        };
        port.ok_or_else(|| format!("Inport '{addr}' does not exist").into())
    }
}

fn check_idx(port: &Port, addr: &PortAddr) -> Result<()> {
    match (port.is_array, addr.idx) {
        (true, None) => bail!("Array port '{addr}' must be used with a slot index"),
        (false, Some(_)) => bail!("Port '{addr}' is not an array port and cannot take a slot index"),
        _ => Ok(()),
    }
}

/// Check one connection and expand any "then" chain it carries, returning the
/// flat connections it stands for
fn analyze_connection(
    connection: &Connection,
    tables: &PortTables,
    scope: &Scope,
) -> Result<Vec<Connection>> {
    let sender_type = sender_type(&connection.sender, tables, scope)?;
    expand(
        connection.sender.clone(),
        &connection.receiver,
        sender_type,
        connection,
        tables,
    )
}

fn sender_type(sender: &SenderSide, tables: &PortTables, scope: &Scope) -> Result<TypeExpr> {
    let base = match (&sender.addr, &sender.const_ref) {
        (Some(_), Some(_)) => {
            bail!("Connection sender cannot be both a port and a constant")
        }
        (None, None) => bail!("Connection sender must be a port or a constant"),
        (Some(addr), None) => {
            let port = tables.sender_port(addr)?;
            check_idx(port, addr)?;
            port.type_expr.clone()
        }
        (None, Some(const_ref)) => {
            let (entity, location) = scope
                .entity(const_ref)
                .chain_err(|| format!("Cannot resolve constant sender '{const_ref}'"))?;
            let constant = match entity {
                Entity::Const(constant) => constant,
                other => bail!(
                    "Connection sender '{const_ref}' is a {}, not a constant",
                    other.kind()
                ),
            };
            let const_scope = scope.relocate(&location)?;
            type_resolver::resolve_expr(&constant.type_expr, &const_scope, &Frame::new())?
        }
    };

    project_selectors(base, &sender.selectors)
}

/// Narrow a sender's type through its struct field selectors
fn project_selectors(expr: TypeExpr, selectors: &[Name]) -> Result<TypeExpr> {
    let mut current = expr;
    for selector in selectors {
        current = match &current {
            TypeExpr::Lit(LitExpr::Rec(fields)) => fields
                .iter()
                .find(|field| &field.name == selector)
                .map(|field| field.type_expr.clone())
                .ok_or_else(|| format!("Field '{selector}' not found in '{current}'"))?,
            TypeExpr::Inst(inst)
                if inst.reference.pkg.is_none() && inst.reference.name == "map" =>
            {
                inst.args
                    .first()
                    .cloned()
                    .ok_or_else(|| format!("Map type '{current}' has no value type"))?
            }
            other => bail!("Cannot select field '{selector}' from non-record type '{other}'"),
        };
    }
    Ok(current)
}

fn expand(
    sender: SenderSide,
    receiver: &ReceiverSide,
    sender_type: TypeExpr,
    origin: &Connection,
    tables: &PortTables,
) -> Result<Vec<Connection>> {
    match receiver {
        ReceiverSide::Addrs(addrs) => {
            if addrs.is_empty() {
                bail!("Connection must have at least one receiver");
            }
            for addr in addrs {
                check_receiver(&sender, &sender_type, addr, tables)?;
            }
            Ok(vec![Connection {
                sender,
                receiver: ReceiverSide::Addrs(addrs.clone()),
                meta: origin.meta,
            }])
        }
        ReceiverSide::Then(link) => {
            check_receiver(&sender, &sender_type, &link.first, tables)?;

            let mut connections = vec![Connection {
                sender,
                receiver: ReceiverSide::to_addr(link.first.clone()),
                meta: origin.meta,
            }];

            // the implicit follow-on sender is the receiving node's outport of
            // the same name, or its sole outport
            if link.first.node == "out" {
                bail!("A chain cannot continue after the component's own outport");
            }
            let io = tables.node(&link.first.node)?;
            let out_port = io
                .output(&link.first.port)
                .or_else(|| match io.outputs.as_slice() {
                    [only] => Some(only),
                    _ => None,
                })
                .ok_or_else(|| {
                    format!(
                        "Cannot determine the implicit sender after '{}': node '{}' has no \
                         outport '{}' and several outports",
                        link.first, link.first.node, link.first.port
                    )
                })?;
            if out_port.is_array {
                bail!(
                    "Cannot chain a connection through array outport '{}:{}'",
                    link.first.node,
                    out_port.name
                );
            }

            let implicit = SenderSide::from_addr(PortAddr::new(&link.first.node, &out_port.name));
            let implicit_type = out_port.type_expr.clone();
            connections.extend(expand(implicit, &link.rest, implicit_type, origin, tables)?);
            Ok(connections)
        }
    }
}

fn check_receiver(
    sender: &SenderSide,
    sender_type: &TypeExpr,
    addr: &PortAddr,
    tables: &PortTables,
) -> Result<()> {
    let port = tables.receiver_port(addr)?;
    check_idx(port, addr)?;
    subtype::check(sender_type, &port.type_expr)
        .chain_err(|| format!("Cannot connect '{sender}' to '{addr}'"))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use weavecore::model::component::{Component, Node, EXTERN_DIRECTIVE};
    use weavecore::model::connection::{
        Connection, PortAddr, ReceiverSide, SenderSide, ThenLink,
    };
    use weavecore::model::constant::{Const, ConstValue};
    use weavecore::model::entity::{Entity, EntityRef};
    use weavecore::model::interface::{Interface, Io, Port};
    use weavecore::model::meta::SourceRange;
    use weavecore::model::module::{Module, Scope, SourceFile};
    use weavecore::model::types::TypeExpr;

    use super::analyze_component;

    fn extern_component(name: &str, inputs: Vec<Port>, outputs: Vec<Port>) -> (String, Entity) {
        let mut component = Component {
            interface: Interface {
                type_params: vec![],
                io: Io { inputs, outputs },
            },
            ..Default::default()
        };
        component
            .directives
            .insert(EXTERN_DIRECTIVE.into(), vec![name.to_string()]);
        (name.to_string(), Entity::Component(component))
    }

    fn printer() -> (String, Entity) {
        extern_component(
            "Print",
            vec![Port::new("v", TypeExpr::named("str"))],
            vec![Port::new("v", TypeExpr::named("str"))],
        )
    }

    fn test_module(extra: Vec<(String, Entity)>, main: Component) -> Module {
        let mut file = SourceFile {
            name: "test.wv".into(),
            ..Default::default()
        };
        for (name, entity) in extra {
            file.entities.insert(name, entity);
        }
        file.entities
            .insert("Main".to_string(), Entity::Component(main));
        Module::single_file(file)
    }

    fn main_with_net(net: Vec<Connection>) -> Component {
        let mut nodes = BTreeMap::new();
        nodes.insert("print".to_string(), Node::new(EntityRef::local("Print")));
        Component {
            interface: Interface::default(),
            directives: BTreeMap::new(),
            nodes,
            net,
            meta: SourceRange::default(),
        }
    }

    fn greeting() -> (String, Entity) {
        (
            "greeting".to_string(),
            Entity::Const(Const {
                type_expr: TypeExpr::named("str"),
                value: ConstValue::of_str("hello"),
                meta: SourceRange::default(),
            }),
        )
    }

    fn analyze_main(module: &Module) -> crate::errors::Result<Component> {
        let scope = Scope::new(module, "main", 0).expect("Could not create scope");
        let main = match module.packages["main"].files[0].entities.get("Main") {
            Some(Entity::Component(component)) => component.clone(),
            _ => panic!("No Main component"),
        };
        analyze_component(&main, &scope, true)
    }

    #[test]
    fn then_chain_expands_to_flat_connections() {
        // $greeting -> print:v -> out:v
        let connection = Connection {
            sender: SenderSide::from_const(EntityRef::local("greeting")),
            receiver: ReceiverSide::Then(ThenLink {
                first: PortAddr::new("print", "v"),
                rest: Box::new(ReceiverSide::to_addr(PortAddr::new("out", "v"))),
            }),
            meta: SourceRange::default(),
        };
        let mut main = main_with_net(vec![connection]);
        main.interface.io.outputs = vec![Port::new("v", TypeExpr::named("str"))];

        let module = test_module(vec![printer(), greeting()], main);
        let analyzed = analyze_main(&module).expect("Could not analyze");

        assert_eq!(analyzed.net.len(), 2);
        // first: constant into print:v
        assert!(analyzed.net[0].sender.const_ref.is_some());
        // second: implicit sender print:v into out:v
        assert_eq!(
            analyzed.net[1].sender.addr,
            Some(PortAddr::new("print", "v"))
        );
        assert_eq!(
            analyzed.net[1].receiver,
            ReceiverSide::to_addr(PortAddr::new("out", "v"))
        );
    }

    #[test]
    fn missing_node_rejected() {
        let connection = Connection {
            sender: SenderSide::from_addr(PortAddr::new("ghost", "v")),
            receiver: ReceiverSide::to_addr(PortAddr::new("print", "v")),
            meta: SourceRange::default(),
        };
        let module = test_module(vec![printer()], main_with_net(vec![connection]));
        assert!(analyze_main(&module).is_err());
    }

    #[test]
    fn missing_port_rejected() {
        let connection = Connection {
            sender: SenderSide::from_addr(PortAddr::new("print", "nope")),
            receiver: ReceiverSide::to_addr(PortAddr::new("print", "v")),
            meta: SourceRange::default(),
        };
        let module = test_module(vec![printer()], main_with_net(vec![connection]));
        assert!(analyze_main(&module).is_err());
    }

    #[test]
    fn type_mismatch_rejected() {
        // an int constant cannot flow into a str inport
        let number = (
            "number".to_string(),
            Entity::Const(Const {
                type_expr: TypeExpr::named("int"),
                value: ConstValue::of_int(1),
                meta: SourceRange::default(),
            }),
        );
        let connection = Connection {
            sender: SenderSide::from_const(EntityRef::local("number")),
            receiver: ReceiverSide::to_addr(PortAddr::new("print", "v")),
            meta: SourceRange::default(),
        };
        let module = test_module(vec![printer(), number], main_with_net(vec![connection]));
        assert!(analyze_main(&module).is_err());
    }

    #[test]
    fn slot_index_on_scalar_port_rejected() {
        let connection = Connection {
            sender: SenderSide::from_const(EntityRef::local("greeting")),
            receiver: ReceiverSide::to_addr(PortAddr::slot("print", "v", 0)),
            meta: SourceRange::default(),
        };
        let module = test_module(vec![printer(), greeting()], main_with_net(vec![connection]));
        assert!(analyze_main(&module).is_err());
    }

    #[test]
    fn array_port_requires_slot_index() {
        let merger = extern_component(
            "Merge",
            vec![Port {
                name: "v".into(),
                type_expr: TypeExpr::named("str"),
                is_array: true,
            }],
            vec![Port::new("v", TypeExpr::named("str"))],
        );
        let mut nodes = BTreeMap::new();
        nodes.insert("merge".to_string(), Node::new(EntityRef::local("Merge")));
        let main = Component {
            nodes,
            net: vec![Connection {
                sender: SenderSide::from_const(EntityRef::local("greeting")),
                receiver: ReceiverSide::to_addr(PortAddr::new("merge", "v")),
                meta: SourceRange::default(),
            }],
            ..Default::default()
        };
        let module = test_module(vec![merger, greeting()], main);
        assert!(analyze_main(&module).is_err());
    }

    #[test]
    fn extern_component_with_nodes_rejected() {
        let mut main = main_with_net(vec![]);
        main.directives
            .insert(EXTERN_DIRECTIVE.into(), vec!["Main".into()]);
        let module = test_module(vec![printer()], main);
        assert!(analyze_main(&module).is_err());
    }
}
