//! The analyzer traverses the source tree top-down and produces a structurally
//! identical tree with every type expression replaced by its fully resolved
//! form. It fails fast: the first violation aborts the traversal with an error
//! whose cause chain records the path taken through the tree.

use std::collections::BTreeMap;

use log::debug;

use weavecore::model::entity::{Entity, EntityRef};
use weavecore::model::module::{Module, Scope};

use crate::errors::*;
use crate::root_package;

/// checks components: their interfaces, nodes and connections
pub mod component_check;
/// checks constants: value shape against resolved type, reference chains
pub mod const_check;
/// checks interfaces: type parameters and ports
pub mod interface_check;
/// the structural subtype relation
pub mod subtype;
/// resolution of type expressions against a scope
pub mod type_resolver;

/// Validates a source tree against the type system and resolves every type
/// expression in it
#[derive(Default)]
pub struct Analyzer {}

impl Analyzer {
    /// Create a new Analyzer
    pub fn new() -> Self {
        Analyzer {}
    }

    /// Analyze `module` with `root` as the program's root component.
    /// The root is the only component allowed to have empty inports or outports.
    pub fn analyze(&self, module: &Module, root: &EntityRef) -> Result<Module> {
        let root_pkg = root_package(root);
        let mut resolved = module.clone();

        for (package_name, package) in &module.packages {
            for (file_index, file) in package.files.iter().enumerate() {
                let scope = Scope::new(module, package_name, file_index)?;
                let mut entities = BTreeMap::new();

                for (name, entity) in &file.entities {
                    debug!("Analyzing {} '{}.{}'", entity.kind(), package_name, name);
                    let is_root = *package_name == root_pkg && *name == root.name;
                    let analyzed = self.analyze_entity(entity, &scope, is_root).chain_err(|| {
                        format!(
                            "in {} '{}' of package '{}'",
                            entity.kind(),
                            name,
                            package_name
                        )
                    })?;
                    entities.insert(name.clone(), analyzed);
                }

                if let Some(target) = resolved.packages.get_mut(package_name) {
                    if let Some(target_file) = target.files.get_mut(file_index) {
                        target_file.entities = entities;
                    }
                }
            }
        }

        Ok(resolved)
    }

    fn analyze_entity(&self, entity: &Entity, scope: &Scope, is_root: bool) -> Result<Entity> {
        match entity {
            Entity::Type(def) => Ok(Entity::Type(type_resolver::resolve_def(def, scope)?)),
            Entity::Const(constant) => Ok(Entity::Const(const_check::analyze_const(
                constant, scope,
            )?)),
            Entity::Interface(interface) => Ok(Entity::Interface(
                interface_check::analyze_interface(
                    interface,
                    scope,
                    interface_check::InterfaceParams::default(),
                )?,
            )),
            Entity::Component(component) => Ok(Entity::Component(
                component_check::analyze_component(component, scope, is_root)?,
            )),
        }
    }
}
