use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};

use crate::errors::*;
use crate::model::entity::{Entity, EntityRef};
use crate::model::meta::Location;
use crate::model::name::Name;
use crate::model::types::{TypeDef, TypeParam};

/// A module: the unit of compilation, a set of named packages
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// The packages of the module, by name
    pub packages: BTreeMap<Name, Package>,
}

/// A package: a set of source files sharing entities
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// The files of the package
    pub files: Vec<SourceFile>,
}

/// One parsed source file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    /// The file name, for diagnostics
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: Name,
    /// The packages imported by this file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
    /// The entities declared in this file, by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<Name, Entity>,
}

/// An import declaration, making another package's entities referenceable
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// The imported package name
    pub package: Name,
    /// The name the file refers to the package by, defaults to the package name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<Name>,
}

impl Module {
    /// Create a module with a single anonymous file in the `main` package,
    /// the shape a one-file program loads into
    pub fn single_file(file: SourceFile) -> Self {
        let mut packages = BTreeMap::new();
        packages.insert("main".to_string(), Package { files: vec![file] });
        Module { packages }
    }
}

/// The base type definitions every file can reference without importing anything
pub fn builtin_entities() -> BTreeMap<Name, Entity> {
    let base = |params: Vec<TypeParam>| {
        Entity::Type(TypeDef {
            params,
            body: None,
            can_recurse: true,
        })
    };
    let param = |name: &str| TypeParam {
        name: name.to_string(),
        constr: None,
    };

    let mut entities = BTreeMap::new();
    entities.insert("bool".to_string(), base(vec![]));
    entities.insert("int".to_string(), base(vec![]));
    entities.insert("float".to_string(), base(vec![]));
    entities.insert("str".to_string(), base(vec![]));
    entities.insert("list".to_string(), base(vec![param("T")]));
    entities.insert("map".to_string(), base(vec![param("T")]));
    entities
}

/// Resolves entity references against a module: the current file's entities
/// first, then imported packages, then the builtin base types
#[derive(Clone)]
pub struct Scope<'a> {
    module: &'a Module,
    package: Name,
    file_index: usize,
    builtins: BTreeMap<Name, Entity>,
}

impl<'a> Scope<'a> {
    /// Create a scope for one file of one package of `module`
    pub fn new(module: &'a Module, package: &str, file_index: usize) -> Result<Self> {
        let pkg = module
            .packages
            .get(package)
            .ok_or_else(|| format!("Package '{package}' not found in module"))?;
        if file_index >= pkg.files.len() {
            bail!("Package '{package}' has no file #{file_index}");
        }
        Ok(Scope {
            module,
            package: package.to_string(),
            file_index,
            builtins: builtin_entities(),
        })
    }

    /// The location of the file this scope resolves from
    pub fn location(&self) -> Location {
        Location {
            package: self.package.clone(),
            file: self.file().name.clone(),
        }
    }

    /// The file this scope resolves from
    pub fn file(&self) -> &'a SourceFile {
        // both indexes were validated by Scope::new
        &self.module.packages[&self.package].files[self.file_index]
    }

    /// Resolve `reference` to an entity and the location it was found at.
    /// Unqualified references resolve lexically: the current file first, then
    /// the builtin base types. Qualified references resolve through this
    /// file's imports.
    pub fn entity(&self, reference: &EntityRef) -> Result<(&Entity, Location)> {
        match &reference.pkg {
            None => {
                if let Some(entity) = self.file().entities.get(&reference.name) {
                    return Ok((entity, self.location()));
                }
                if let Some(entity) = self.builtins.get(&reference.name) {
                    return Ok((
                        entity,
                        Location {
                            package: "builtin".to_string(),
                            file: String::new(),
                        },
                    ));
                }
                bail!("Entity '{}' not found in scope", reference)
            }
            Some(pkg) => {
                // a package can always name itself, everything else must be imported
                let package_name = if *pkg == self.package {
                    self.package.clone()
                } else {
                    self.file()
                        .imports
                        .iter()
                        .find(|import| import.alias.as_ref().unwrap_or(&import.package) == pkg)
                        .map(|import| import.package.clone())
                        .ok_or_else(|| format!("Package '{pkg}' is not imported"))?
                };

                let target = self
                    .module
                    .packages
                    .get(&package_name)
                    .ok_or_else(|| format!("Imported package '{package_name}' not found"))?;

                for file in &target.files {
                    if let Some(entity) = file.entities.get(&reference.name) {
                        return Ok((
                            entity,
                            Location {
                                package: package_name.clone(),
                                file: file.name.clone(),
                            },
                        ));
                    }
                }
                bail!(
                    "Entity '{}' not found in package '{package_name}'",
                    reference.name
                )
            }
        }
    }

    /// A scope for resolving the internals of an entity found in `location`
    pub fn relocate(&self, location: &Location) -> Result<Scope<'a>> {
        if location.package == "builtin" {
            // builtins have no internals to resolve in a foreign scope
            return Scope::new(self.module, &self.package, self.file_index);
        }
        let pkg = self
            .module
            .packages
            .get(&location.package)
            .ok_or_else(|| format!("Package '{}' not found in module", location.package))?;
        let file_index = pkg
            .files
            .iter()
            .position(|file| file.name == location.file)
            .ok_or_else(|| {
                format!(
                    "File '{}' not found in package '{}'",
                    location.file, location.package
                )
            })?;
        Scope::new(self.module, &location.package, file_index)
    }
}
