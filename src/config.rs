//! Image definition store.
//!
//! Reads and writes the TOML document describing every image the
//! orchestrator manages, and maintains the image-name -> alias index
//! used when rewriting Dockerfile `FROM` lines.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// All image definitions, keyed by alias.
pub type ImageSet = BTreeMap<String, ImageDefinition>;

/// A single `depends_on` entry.
///
/// `true` is a live edge: the dependent tracks the dependency's resolved
/// tag and is rebuilt when it changes. A string is a pinned edge: the
/// literal tag is substituted and no rebuild is triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Follow(bool),
    Pinned(String),
}

impl Dependency {
    /// True for `depends_on.<alias> = true` entries.
    pub fn is_live(&self) -> bool {
        matches!(self, Dependency::Follow(true))
    }

    /// The constant tag of a pinned edge, if this is one.
    pub fn pinned_tag(&self) -> Option<&str> {
        match self {
            Dependency::Pinned(tag) => Some(tag),
            Dependency::Follow(_) => None,
        }
    }
}

/// Post-build hook: a command line plus extra environment variables,
/// both formatted with `{image}`/`{alias}`/`{tag}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// One image definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDefinition {
    /// Fully-qualified image names this alias produces; the first is
    /// canonical.
    #[serde(default)]
    pub images: Vec<String>,

    /// Build context directory. Presence means the alias is buildable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,

    /// Current resolved tag.
    #[serde(default)]
    pub tag: String,

    /// Tag template with `{image.<alias>}` placeholders. Absent means
    /// `tag` is the literal current tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_tmpl: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub depends_on: BTreeMap<String, Dependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Hook>,
}

impl ImageDefinition {
    /// The canonical image name: the first `images` entry, or the alias
    /// itself when none are declared.
    pub fn canonical_image<'a>(&'a self, alias: &'a str) -> &'a str {
        self.images.first().map(String::as_str).unwrap_or(alias)
    }
}

/// The persisted document shape.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    images: ImageSet,
}

/// Loads, indexes and saves the image definition document.
pub struct ConfigStore {
    path: PathBuf,
    doc: Document,
    image_to_alias: BTreeMap<String, String>,
}

impl ConfigStore {
    /// Load the definitions from `path` and rebuild the image index.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("loading image definitions from '{}'", path.display());

        let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let doc: Document = toml::from_str(&text)?;
        let image_to_alias = build_image_index(&doc.images);

        Ok(Self {
            path,
            doc,
            image_to_alias,
        })
    }

    /// Build a store from an in-memory image set. `path` is where
    /// `save` will write it.
    pub fn from_images(path: impl Into<PathBuf>, images: ImageSet) -> Self {
        let image_to_alias = build_image_index(&images);
        Self {
            path: path.into(),
            doc: Document { images },
            image_to_alias,
        }
    }

    /// Write the definitions back to the file they were loaded from.
    pub fn save(&self) -> Result<()> {
        debug!("saving image definitions to '{}'", self.path.display());

        let text = toml::to_string_pretty(&self.doc)?;
        fs::write(&self.path, text).map_err(|e| Error::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn images(&self) -> &ImageSet {
        &self.doc.images
    }

    /// Look up a definition, failing on unknown aliases.
    pub fn definition(&self, alias: &str) -> Result<&ImageDefinition> {
        self.doc.images.get(alias).ok_or_else(|| Error::UnknownAlias {
            alias: alias.to_string(),
        })
    }

    /// Set an alias's literal tag. Only `update` requests and the
    /// end of a successful processing run go through here.
    pub fn set_tag(&mut self, alias: &str, tag: &str) -> Result<()> {
        debug!("updating image alias '{}' to tag '{}'", alias, tag);

        let def = self.doc.images.get_mut(alias).ok_or_else(|| Error::UnknownAlias {
            alias: alias.to_string(),
        })?;
        def.tag = tag.to_string();
        Ok(())
    }

    /// Map a fully-qualified image name back to its owning alias.
    pub fn alias_for_image(&self, image: &str) -> Option<&str> {
        self.image_to_alias.get(image).map(String::as_str)
    }
}

/// Rebuild the image-name -> alias index. An image name maps to at most
/// one alias; duplicate declarations resolve to the later alias.
fn build_image_index(images: &ImageSet) -> BTreeMap<String, String> {
    let mut index = BTreeMap::new();
    for (alias, def) in images {
        for image in &def.images {
            index.insert(image.clone(), alias.clone());
        }
    }
    index
}
