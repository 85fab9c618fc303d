use std::path::Path;

use serde::de::DeserializeOwned;

use crate::errors::*;

/// The serialization formats a source tree can be stored in on disk.
/// A program file is a serialized AST, so loading one is deserialization
/// into the model types, keyed off the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Json content, `.json` files
    Json,
    /// Yaml content, `.yaml` and `.yml` files
    Yaml,
    /// Toml content, `.toml` files
    Toml,
}

impl Format {
    /// Determine the format of the file at `path` from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            Some(other) => bail!("Cannot load '.{other}' files as source trees"),
            None => bail!(
                "Cannot determine the format of '{}': it has no file extension",
                path.display()
            ),
        }
    }

    /// The format's name, for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Format::Json => "Json",
            Format::Yaml => "Yaml",
            Format::Toml => "Toml",
        }
    }

    /// Deserialize `contents` in this format into a `T`
    pub fn deserialize<T: DeserializeOwned>(&self, contents: &str) -> Result<T> {
        match self {
            Format::Json => {
                serde_json::from_str(contents).chain_err(|| "Content is not the expected Json")
            }
            Format::Yaml => {
                serde_yaml::from_str(contents).chain_err(|| "Content is not the expected Yaml")
            }
            Format::Toml => {
                toml::from_str(contents).chain_err(|| "Content is not the expected Toml")
            }
        }
    }
}

/// Deserialize `contents` read from the file at `path` into a `T`, picking
/// the format by the file's extension
pub fn load<T: DeserializeOwned>(path: &Path, contents: &str) -> Result<T> {
    let format = Format::from_path(path)?;
    format
        .deserialize(contents)
        .chain_err(|| format!("Error deserializing {} from '{}'", format.name(), path.display()))
}
