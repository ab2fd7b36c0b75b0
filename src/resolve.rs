//! Tag template resolution.
//!
//! Expands `{image.<alias>}` placeholders in `tag_tmpl` strings by
//! recursively resolving dependency tags, memoizing per run. Each alias
//! moves through a tri-state lifecycle inside the memo: absent (never
//! visited), in progress (expansion started), done (tag known).
//! Re-entering an in-progress alias means the template chain loops back
//! on itself and fails with [`Error::CircularReference`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Dependency, ImageDefinition, ImageSet};
use crate::error::{Error, Result};

/// Matches `{image.<alias>}` placeholders in tag templates.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{image\.([^}]+)\}").expect("invalid placeholder regex"));

/// Per-alias resolution state.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    InProgress,
    Done(String),
}

/// Memoized resolution results for one processing run.
#[derive(Debug, Default)]
pub struct TagMemo {
    entries: BTreeMap<String, Resolution>,
}

impl TagMemo {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve the tag for `alias`, expanding its template if it has one.
pub fn resolve(images: &ImageSet, alias: &str, memo: &mut TagMemo) -> Result<String> {
    match memo.entries.get(alias) {
        Some(Resolution::Done(tag)) => return Ok(tag.clone()),
        Some(Resolution::InProgress) => {
            return Err(Error::CircularReference {
                alias: alias.to_string(),
            })
        }
        None => {}
    }

    let def = images.get(alias).ok_or_else(|| Error::UnknownAlias {
        alias: alias.to_string(),
    })?;

    let tag = match &def.tag_tmpl {
        None => def.tag.clone(),
        Some(tmpl) => {
            // Mark in progress before descending so a chain of templates
            // that leads back here is caught instead of recursing forever.
            memo.entries
                .insert(alias.to_string(), Resolution::InProgress);
            expand(images, def, tmpl, memo)?
        }
    };

    memo.entries
        .insert(alias.to_string(), Resolution::Done(tag.clone()));
    Ok(tag)
}

/// Substitute every placeholder in `tmpl`. A placeholder naming a pinned
/// dependency takes the pin's literal tag without recursion; anything
/// else resolves recursively.
fn expand(
    images: &ImageSet,
    def: &ImageDefinition,
    tmpl: &str,
    memo: &mut TagMemo,
) -> Result<String> {
    let mut out = String::with_capacity(tmpl.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(tmpl) {
        let (whole, name) = match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(name)) => (whole, name),
            _ => continue,
        };

        out.push_str(&tmpl[last..whole.start()]);
        last = whole.end();

        let dep_alias = name.as_str();
        let tag = match def.depends_on.get(dep_alias) {
            Some(Dependency::Pinned(pin)) => pin.clone(),
            _ => resolve(images, dep_alias, memo)?,
        };
        out.push_str(&tag);
    }

    out.push_str(&tmpl[last..]);
    Ok(out)
}
