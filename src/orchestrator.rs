//! Orchestration of a processing run.
//!
//! Ties the store, graph, resolver, builder and hooks together: given a
//! starting alias, every dependent image is reprocessed in dependency
//! order, and the store is written back once after the whole pass
//! succeeds. A failure anywhere aborts the remaining aliases, since
//! their tags may depend on the one that failed.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::build::Builder;
use crate::config::ConfigStore;
use crate::error::Result;
use crate::graph;
use crate::hook;
use crate::resolve::{self, TagMemo};

/// The image build orchestrator.
pub struct Orchestrator {
    store: ConfigStore,
    builder: Builder,
}

impl Orchestrator {
    /// Load the definitions at `path` with the default build tool.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            store: ConfigStore::load(path)?,
            builder: Builder::new(),
        })
    }

    /// Use an existing store and a custom builder.
    pub fn with_builder(store: ConfigStore, builder: Builder) -> Self {
        Self { store, builder }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Set an alias's literal tag (a manual re-tag request).
    pub fn update(&mut self, alias: &str, tag: &str) -> Result<()> {
        self.store.set_tag(alias, tag)
    }

    /// The ordered set of aliases to reprocess when `alias` changes.
    pub fn affected(&self, alias: &str) -> Vec<(String, bool)> {
        graph::affected(self.store.images(), alias)
    }

    /// Process one alias: resolve its tag, build it if it has a build
    /// context, run its success hook, and record the resolved tag.
    pub async fn process(&mut self, alias: &str) -> Result<()> {
        let mut memo = TagMemo::new();
        let tag = resolve::resolve(self.store.images(), alias, &mut memo)?;
        info!("processing image '{}:{}'", alias, tag);

        let def = self.store.definition(alias)?.clone();
        let image = def.canonical_image(alias).to_string();

        if def.workdir.is_some() {
            info!("building image '{}:{}'", alias, tag);
            self.builder
                .build(&self.store, alias, &image, &tag, &def, &mut memo)
                .await?;
        }

        if let Some(on_success) = &def.on_success {
            info!("running on_success hook of image '{}:{}'", alias, tag);
            let ctx: BTreeMap<String, String> = [
                ("image".to_string(), image),
                ("alias".to_string(), alias.to_string()),
                ("tag".to_string(), tag.clone()),
            ]
            .into();
            hook::run(&ctx, on_success).await?;
        }

        self.store.set_tag(alias, &tag)
    }

    /// Full `update` run: optionally re-tag the starting alias, process
    /// its affected set in order, then persist the store once.
    pub async fn run(&mut self, alias: &str, new_tag: Option<&str>) -> Result<()> {
        self.store.definition(alias)?;

        if let Some(tag) = new_tag {
            self.update(alias, tag)?;
        }

        for (alias, follow) in self.affected(alias) {
            if follow {
                self.process(&alias).await?;
            }
        }

        self.store.save()
    }
}
