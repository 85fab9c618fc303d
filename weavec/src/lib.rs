#![deny(missing_docs)]
#![warn(clippy::unwrap_used)]

//! `weavec` is the weave compiler library. It takes the source tree produced
//! by the parser, validates and resolves it against the type system
//! ([analyzer]), then flattens the component hierarchy into the intermediate
//! representation executed by the `weaver` runtime ([irgen]).

use weavecore::model::entity::{Entity, EntityRef};
use weavecore::model::ir;
use weavecore::model::module::Module;
use weavecore::model::name::Name;

use errors::*;

/// resolves and type-checks a source tree, producing a fully resolved copy
pub mod analyzer;

/// contains [errors::Error] that other modules in this crate will `use errors::*;`
/// to get access to everything `error_chain` creates.
pub mod errors;

/// flattens a resolved source tree into the runtime IR
pub mod irgen;

/// The name of the package the root component is looked up in when the root
/// reference does not name one
pub const DEFAULT_ROOT_PACKAGE: &str = "main";

/// Compile `module` into a runnable program, with `root` naming the component
/// the program is instantiated from
pub fn compile(module: &Module, root: &EntityRef) -> Result<ir::Program> {
    find_root_component(module, root)?;

    let analyzed = analyzer::Analyzer::new()
        .analyze(module, root)
        .chain_err(|| "Analysis failed")?;

    irgen::generate(&analyzed, root).chain_err(|| "IR generation failed")
}

/// The package a root reference resolves in
pub fn root_package(root: &EntityRef) -> Name {
    root.pkg
        .clone()
        .unwrap_or_else(|| DEFAULT_ROOT_PACKAGE.to_string())
}

fn find_root_component(module: &Module, root: &EntityRef) -> Result<()> {
    let package_name = root_package(root);
    let package = module
        .packages
        .get(&package_name)
        .ok_or_else(|| format!("Root package '{package_name}' not found"))?;

    for file in &package.files {
        match file.entities.get(&root.name) {
            Some(Entity::Component(_)) => return Ok(()),
            Some(other) => bail!(
                "Root entity '{}' is a {}, not a component",
                root.name,
                other.kind()
            ),
            None => {}
        }
    }

    bail!(
        "Root component '{}' not found in package '{package_name}'",
        root.name
    )
}

#[cfg(test)]
mod test {
    use weavecore::model::entity::{Entity, EntityRef};
    use weavecore::model::module::{Module, SourceFile};
    use weavecore::model::types::TypeDef;

    use super::find_root_component;

    #[test]
    fn missing_root_is_an_error() {
        let module = Module::single_file(SourceFile::default());
        assert!(find_root_component(&module, &EntityRef::local("Main")).is_err());
    }

    #[test]
    fn root_must_be_a_component() {
        let mut file = SourceFile::default();
        file.entities
            .insert("Main".to_string(), Entity::Type(TypeDef::default()));
        let module = Module::single_file(file);
        assert!(find_root_component(&module, &EntityRef::local("Main")).is_err());
    }
}
