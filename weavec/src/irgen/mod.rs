//! The IR generator flattens a resolved component hierarchy, starting at the
//! root component, into a flat set of primitive function calls and a flat
//! receiver-to-senders connection table. Workers are keyed by their
//! hierarchical path, e.g. `root/reader`; the synthetic `in` and `out` nodes
//! of each component are renamed to the path of their enclosing worker, so
//! nested networks join up without any forwarding workers.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use log::debug;

use weavecore::model::component::{Component, Node};
use weavecore::model::connection::{Connection, PortAddr as SrcPortAddr, ReceiverSide};
use weavecore::model::entity::{Entity, EntityRef};
use weavecore::model::interface::Port;
use weavecore::model::ir;
use weavecore::model::message::Message;
use weavecore::model::module::{Module, Scope};
use weavecore::model::name::Name;
use weavecore::model::types::TypeExpr;

use crate::errors::*;
use crate::root_package;

/// evaluation of constants into runtime messages
pub mod bind;

/// The path of the root worker every other path is nested under
pub const ROOT_PATH: &str = "root";

/// Flatten an analyzed module into the runtime IR, instantiating the
/// component named by `root`
pub fn generate(module: &Module, root: &EntityRef) -> Result<ir::Program> {
    Generator::new(module).generate(root)
}

/// Dependency nodes passed down one level of the component tree, with the
/// scope their entity references resolve in
type Deps<'a> = BTreeMap<Name, (Node, Scope<'a>)>;

struct Generator<'a> {
    module: &'a Module,
    /// receiver to senders, accumulated across the whole tree
    connections: BTreeMap<ir::PortAddr, Vec<ir::PortAddr>>,
    funcs: Vec<ir::FuncCall>,
    /// constant workers already materialized, by their output address
    created_consts: BTreeSet<ir::PortAddr>,
    /// counter for synthetic field-selector workers
    synth_count: usize,
}

impl<'a> Generator<'a> {
    fn new(module: &'a Module) -> Self {
        Generator {
            module,
            connections: BTreeMap::new(),
            funcs: vec![],
            created_consts: BTreeSet::new(),
            synth_count: 0,
        }
    }

    fn generate(mut self, root: &EntityRef) -> Result<ir::Program> {
        let package = root_package(root);
        let (component, scope) = self.find_component(&package, &root.name)?;

        let mut stack = vec![format!("{package}.{}", root.name)];
        self.gen_component(ROOT_PATH, &component, &scope, &Deps::new(), &mut stack)?;

        let connections = self
            .connections
            .into_iter()
            .map(|(receiver, senders)| ir::Connection { receiver, senders })
            .collect();

        Ok(ir::Program {
            connections,
            funcs: self.funcs,
        })
    }

    fn find_component(&self, package: &str, name: &str) -> Result<(Component, Scope<'a>)> {
        let pkg = self
            .module
            .packages
            .get(package)
            .ok_or_else(|| format!("Package '{package}' not found"))?;
        for (file_index, file) in pkg.files.iter().enumerate() {
            if let Some(Entity::Component(component)) = file.entities.get(name) {
                return Ok((
                    component.clone(),
                    Scope::new(self.module, package, file_index)?,
                ));
            }
        }
        bail!("Component '{name}' not found in package '{package}'")
    }

    fn gen_component(
        &mut self,
        path: &str,
        component: &Component,
        scope: &Scope<'a>,
        deps: &Deps<'a>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        for (node_name, node) in &component.nodes {
            self.gen_node(path, node_name, node, component, scope, deps, stack)
                .chain_err(|| format!("in node '{node_name}'"))?;
        }

        for connection in &component.net {
            self.gen_connection(path, connection, scope)
                .chain_err(|| format!("in connection from '{}'", connection.sender))?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn gen_node(
        &mut self,
        path: &str,
        node_name: &Name,
        node: &Node,
        component: &Component,
        scope: &Scope<'a>,
        deps: &Deps<'a>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        let (entity, _) = scope.entity(&node.component)?;

        // interface nodes are substituted by the dependency the parent provided
        let (eff_node, eff_scope): (&Node, Scope<'a>) = match entity {
            Entity::Interface(_) => {
                let (dep_node, dep_scope) = deps.get(node_name).ok_or_else(|| {
                    format!("No dependency provided for interface node '{node_name}'")
                })?;
                (dep_node, dep_scope.clone())
            }
            Entity::Component(_) => (node, scope.clone()),
            other => bail!(
                "Node must refer to a component or interface, not a {}",
                other.kind()
            ),
        };

        let (eff_entity, eff_location) = eff_scope.entity(&eff_node.component)?;
        let target = match eff_entity {
            Entity::Component(target) => target,
            other => bail!(
                "Node resolves to a {}, expected a component after substitution",
                other.kind()
            ),
        };

        let child_path = format!("{path}/{node_name}");

        if target.extern_args().is_some() {
            let func = func_ref(target, &eff_node.type_args)?;
            let inputs = ports_for(
                &component.net,
                node_name,
                &target.interface.io.inputs,
                &child_path,
                Side::In,
            )?;
            let outputs = ports_for(
                &component.net,
                node_name,
                &target.interface.io.outputs,
                &child_path,
                Side::Out,
            )?;
            let msg = self.bind_msg(eff_node, &eff_scope)?;
            debug!("Worker '{child_path}' bound to function '{func}'");
            self.funcs.push(ir::FuncCall {
                func,
                io: ir::FuncPorts { inputs, outputs },
                msg,
            });
            return Ok(());
        }

        let key = format!("{}.{}", eff_location.package, eff_node.component.name);
        if stack.contains(&key) {
            bail!(
                "Cyclic component reference: {} -> {key}",
                stack.join(" -> ")
            );
        }

        let target_scope = eff_scope.relocate(&eff_location)?;
        let child_deps: Deps<'a> = eff_node
            .deps
            .iter()
            .map(|(name, dep)| (name.clone(), (dep.clone(), eff_scope.clone())))
            .collect();

        stack.push(key);
        let result = self.gen_component(&child_path, target, &target_scope, &child_deps, stack);
        stack.pop();
        result
    }

    fn gen_connection(
        &mut self,
        path: &str,
        connection: &Connection,
        scope: &Scope<'a>,
    ) -> Result<()> {
        let receivers = match &connection.receiver {
            ReceiverSide::Addrs(addrs) => addrs,
            ReceiverSide::Then(_) => {
                bail!("Connection chains must be expanded before IR generation")
            }
        };

        let mut sender = match (&connection.sender.addr, &connection.sender.const_ref) {
            (Some(addr), None) => sender_addr(path, addr),
            (None, Some(const_ref)) => self.const_worker(path, const_ref, scope)?,
            _ => bail!("Connection sender must be a port or a constant"),
        };

        if !connection.sender.selectors.is_empty() {
            sender = self.selector_worker(path, sender, &connection.sender.selectors);
        }

        for addr in receivers {
            let receiver = receiver_addr(path, addr);
            self.connections
                .entry(receiver)
                .or_default()
                .push(sender.clone());
        }

        Ok(())
    }

    /// Materialize a constant sender as a `Const` worker under the enclosing
    /// component's synthetic `const` node, once per constant
    fn const_worker(
        &mut self,
        path: &str,
        const_ref: &EntityRef,
        scope: &Scope<'a>,
    ) -> Result<ir::PortAddr> {
        let port = const_ref.to_string().replace('.', "_");
        let out = ir::PortAddr::new(&format!("{path}/const/out"), &port);

        if !self.created_consts.contains(&out) {
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
            let msg = bind::eval_const(constant, &const_scope)
                .chain_err(|| format!("Cannot evaluate constant '{const_ref}'"))?;

            self.funcs.push(ir::FuncCall {
                func: "Const".to_string(),
                io: ir::FuncPorts {
                    inputs: vec![],
                    outputs: vec![out.clone()],
                },
                msg: Some(msg),
            });
            self.created_consts.insert(out.clone());
        }

        Ok(out)
    }

    /// Route a sender through a synthetic `Field` worker that projects the
    /// configured struct fields out of every message
    fn selector_worker(
        &mut self,
        path: &str,
        sender: ir::PortAddr,
        selectors: &[Name],
    ) -> ir::PortAddr {
        let base = format!("{path}/field{}", self.synth_count);
        self.synth_count += 1;

        let input = ir::PortAddr::new(&format!("{base}/in"), "v");
        let output = ir::PortAddr::new(&format!("{base}/out"), "v");
        let msg = Message::List(
            selectors
                .iter()
                .map(|selector| Message::Str(selector.clone()))
                .collect(),
        );

        self.funcs.push(ir::FuncCall {
            func: "Field".to_string(),
            io: ir::FuncPorts {
                inputs: vec![input.clone()],
                outputs: vec![output.clone()],
            },
            msg: Some(msg),
        });
        self.connections.entry(input).or_default().push(sender);

        output
    }

    fn bind_msg(&self, node: &Node, scope: &Scope<'a>) -> Result<Option<Message>> {
        let arg = match node.bind_arg() {
            Some(arg) => arg,
            None => return Ok(None),
        };
        let reference = EntityRef::from_str(arg)?;
        let (entity, location) = scope
            .entity(&reference)
            .chain_err(|| format!("Cannot resolve bind directive argument '{reference}'"))?;
        let constant = match entity {
            Entity::Const(constant) => constant,
            other => bail!(
                "Bind directive argument '{reference}' is a {}, not a constant",
                other.kind()
            ),
        };
        let const_scope = scope.relocate(&location)?;
        Ok(Some(bind::eval_const(constant, &const_scope).chain_err(
            || format!("Cannot evaluate bound constant '{reference}'"),
        )?))
    }
}

/// Resolve a component's `extern` directive to the primitive function name,
/// dispatching on the stringified first type argument when the directive
/// carries `<typeArg> <funcName>` pairs
fn func_ref(component: &Component, type_args: &[TypeExpr]) -> Result<Name> {
    let args = component
        .extern_args()
        .ok_or("Component has no extern directive")?;

    if args.is_empty() {
        bail!("The extern directive must carry at least one argument");
    }
    if args.len() == 1 {
        return Ok(args[0].clone());
    }

    let first = type_args
        .first()
        .and_then(TypeExpr::inst)
        .map(|inst| inst.reference.to_string())
        .ok_or("A polymorphic extern component needs a named first type argument")?;

    for arg in args {
        let mut parts = arg.split(' ');
        if parts.next() == Some(first.as_str()) {
            if let Some(func) = parts.next() {
                return Ok(func.to_string());
            }
        }
    }

    bail!("Type argument '{first}' mismatches the extern directive")
}

enum Side {
    In,
    Out,
}

/// The IR addresses of one side of a leaf worker. Scalar ports get one
/// address; array ports get one per slot used by the enclosing network, which
/// must be used contiguously from 0.
fn ports_for(
    net: &[Connection],
    node_name: &str,
    ports: &[Port],
    child_path: &str,
    side: Side,
) -> Result<Vec<ir::PortAddr>> {
    let path = match side {
        Side::In => format!("{child_path}/in"),
        Side::Out => format!("{child_path}/out"),
    };

    let mut result = vec![];
    for port in ports {
        if !port.is_array {
            result.push(ir::PortAddr::new(&path, &port.name));
            continue;
        }

        let mut used: Vec<u8> = vec![];
        for connection in net {
            match side {
                Side::Out => {
                    if let Some(addr) = &connection.sender.addr {
                        collect_slot(addr, node_name, &port.name, &mut used);
                    }
                }
                Side::In => {
                    if let ReceiverSide::Addrs(addrs) = &connection.receiver {
                        for addr in addrs {
                            collect_slot(addr, node_name, &port.name, &mut used);
                        }
                    }
                }
            }
        }
        used.sort_unstable();
        used.dedup();

        for (expected, idx) in used.iter().enumerate() {
            if *idx as usize != expected {
                bail!(
                    "Array port '{node_name}:{}' slots must be used contiguously from 0, \
                     slot {expected} is missing",
                    port.name
                );
            }
        }

        for idx in used {
            result.push(ir::PortAddr::slot(&path, &port.name, idx));
        }
    }

    Ok(result)
}

fn collect_slot(addr: &SrcPortAddr, node_name: &str, port_name: &str, used: &mut Vec<u8>) {
    if addr.node == node_name && addr.port == port_name {
        if let Some(idx) = addr.idx {
            used.push(idx);
        }
    }
}

/// Translate a source sender address into the flat namespace: a node's
/// outport, or the enclosing component's own inport for the synthetic `in`
fn sender_addr(path: &str, addr: &SrcPortAddr) -> ir::PortAddr {
    let flat_path = if addr.node == "in" {
        format!("{path}/in")
    } else {
        format!("{path}/{}/out", addr.node)
    };
    flat_addr(&flat_path, addr)
}

/// Translate a source receiver address into the flat namespace: a node's
/// inport, or the enclosing component's own outport for the synthetic `out`
fn receiver_addr(path: &str, addr: &SrcPortAddr) -> ir::PortAddr {
    let flat_path = if addr.node == "out" {
        format!("{path}/out")
    } else {
        format!("{path}/{}/in", addr.node)
    };
    flat_addr(&flat_path, addr)
}

fn flat_addr(flat_path: &str, addr: &SrcPortAddr) -> ir::PortAddr {
    match addr.idx {
        Some(idx) => ir::PortAddr::slot(flat_path, &addr.port, idx),
        None => ir::PortAddr::new(flat_path, &addr.port),
    }
}
