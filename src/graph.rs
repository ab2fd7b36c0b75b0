//! Dependency graph traversal.
//!
//! Derives a reverse index of live `depends_on` edges ("who depends on
//! me") and produces the ordered affected set for a starting alias:
//! every reachable alias exactly once, each one strictly before all
//! aliases that depend on it.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ImageSet;

/// The ordered set of aliases affected by a change to `start`, paired
/// with their follow flag.
///
/// Only live edges (`depends_on.<alias> = true`) are traversed; pinned
/// edges never trigger a rebuild of the pinning alias. The start alias
/// is always the first element, even when nothing depends on it.
pub fn affected(images: &ImageSet, start: &str) -> Vec<(String, bool)> {
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (alias, def) in images {
        for (parent, dep) in &def.depends_on {
            if dep.is_live() {
                dependents.entry(parent.as_str()).or_default().push(alias.as_str());
            }
        }
    }

    let mut visited = BTreeSet::new();
    let mut order = Vec::new();
    visit(start, &dependents, &mut visited, &mut order);
    order.reverse();

    order.into_iter().map(|alias| (alias, true)).collect()
}

/// Depth-first post-order walk over the reverse edges. Appending after
/// recursion and reversing at the end puts every alias before its
/// dependents.
fn visit(
    alias: &str,
    dependents: &BTreeMap<&str, Vec<&str>>,
    visited: &mut BTreeSet<String>,
    order: &mut Vec<String>,
) {
    visited.insert(alias.to_string());

    if let Some(children) = dependents.get(alias) {
        for child in children {
            if !visited.contains(*child) {
                visit(child, dependents, visited, order);
            }
        }
    }

    order.push(alias.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Dependency, ImageDefinition};

    fn image(tag: &str) -> ImageDefinition {
        ImageDefinition {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    fn depends(tag: &str, parents: &[(&str, Dependency)]) -> ImageDefinition {
        ImageDefinition {
            tag: tag.to_string(),
            depends_on: parents
                .iter()
                .map(|(alias, dep)| (alias.to_string(), dep.clone()))
                .collect(),
            ..Default::default()
        }
    }

    fn aliases(affected: &[(String, bool)]) -> Vec<&str> {
        affected.iter().map(|(alias, _)| alias.as_str()).collect()
    }

    #[test]
    fn test_no_dependents_yields_self() {
        let mut images = ImageSet::new();
        images.insert("base".into(), image("1.0"));

        let result = affected(&images, "base");
        assert_eq!(result, vec![("base".to_string(), true)]);
    }

    #[test]
    fn test_chain_order() {
        let mut images = ImageSet::new();
        images.insert("base".into(), image("1.0"));
        images.insert(
            "mid".into(),
            depends("m1", &[("base", Dependency::Follow(true))]),
        );
        images.insert(
            "app".into(),
            depends("a1", &[("mid", Dependency::Follow(true))]),
        );

        assert_eq!(aliases(&affected(&images, "base")), vec!["base", "mid", "app"]);
        assert_eq!(aliases(&affected(&images, "mid")), vec!["mid", "app"]);
    }

    #[test]
    fn test_diamond_each_alias_once() {
        let mut images = ImageSet::new();
        images.insert("base".into(), image("1.0"));
        images.insert(
            "left".into(),
            depends("l1", &[("base", Dependency::Follow(true))]),
        );
        images.insert(
            "right".into(),
            depends("r1", &[("base", Dependency::Follow(true))]),
        );
        images.insert(
            "top".into(),
            depends(
                "t1",
                &[
                    ("left", Dependency::Follow(true)),
                    ("right", Dependency::Follow(true)),
                ],
            ),
        );

        let affected = affected(&images, "base");
        let result = aliases(&affected);
        assert_eq!(result.len(), 4);
        assert_eq!(result[0], "base");
        assert_eq!(result[3], "top");
        assert!(result.contains(&"left"));
        assert!(result.contains(&"right"));
    }

    #[test]
    fn test_pinned_edges_do_not_traverse() {
        let mut images = ImageSet::new();
        images.insert("base".into(), image("1.0"));
        images.insert(
            "pinned".into(),
            depends("p1", &[("base", Dependency::Pinned("0.5".into()))]),
        );
        images.insert(
            "live".into(),
            depends("l1", &[("base", Dependency::Follow(true))]),
        );

        assert_eq!(aliases(&affected(&images, "base")), vec!["base", "live"]);
    }

    #[test]
    fn test_self_reference_appears_once() {
        let mut images = ImageSet::new();
        images.insert(
            "loop".into(),
            depends("1.0", &[("loop", Dependency::Follow(true))]),
        );

        assert_eq!(aliases(&affected(&images, "loop")), vec!["loop"]);
    }

    #[test]
    fn test_dependency_cycle_terminates() {
        let mut images = ImageSet::new();
        images.insert(
            "a".into(),
            depends("1", &[("b", Dependency::Follow(true))]),
        );
        images.insert(
            "b".into(),
            depends("1", &[("a", Dependency::Follow(true))]),
        );

        let affected = affected(&images, "a");
        let result = aliases(&affected);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&"a"));
        assert!(result.contains(&"b"));
    }
}
