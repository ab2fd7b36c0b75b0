//! Image building.
//!
//! Rewrites the `FROM` lines of a build context's Dockerfile so every
//! known dependency is pinned to its resolved tag, then invokes the
//! build tool on the rewritten file. The original Dockerfile is only
//! replaced after the build succeeds, with the previous content kept as
//! a `.bak` sibling; a failed build leaves the original untouched and
//! keeps the rewritten temp file around for inspection.

use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, info};

use crate::config::{ConfigStore, Dependency, ImageDefinition};
use crate::error::{Error, Result};
use crate::process;
use crate::resolve::{self, TagMemo};

/// Default build tool program.
pub const DEFAULT_TOOL: &str = "docker";

/// Name of the build manifest inside a workdir.
const DOCKERFILE: &str = "Dockerfile";

/// Suffix of the rewritten manifest while a build is in flight.
const TMP_SUFFIX: &str = ".imagebot";

/// Suffix of the pre-rewrite backup kept after a successful build.
const BAK_SUFFIX: &str = ".bak";

/// Matches a Dockerfile base-image line: `FROM <ref>[:<tag>]<ws>`.
static FROM_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^FROM\s+(.+?)(?::.+?)?(\s)").expect("invalid FROM line regex")
});

/// Runs image builds through an external build tool.
pub struct Builder {
    tool: String,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different build tool program (tests use a stub).
    pub fn with_tool(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Build `image:tag` from the definition's workdir.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::BuildFailed`] when the build tool exits
    /// non-zero (after replaying its captured output at error level),
    /// or with an I/O error when the manifest swap cannot be performed.
    pub async fn build(
        &self,
        store: &ConfigStore,
        alias: &str,
        image: &str,
        tag: &str,
        def: &ImageDefinition,
        memo: &mut TagMemo,
    ) -> Result<()> {
        let workdir = def.workdir.as_deref().ok_or_else(|| Error::NoWorkdir {
            alias: alias.to_string(),
        })?;

        let dockerfile_path = workdir.join(DOCKERFILE);
        let tmp_path = workdir.join(format!("{DOCKERFILE}{TMP_SUFFIX}"));
        let bak_path = workdir.join(format!("{DOCKERFILE}{BAK_SUFFIX}"));

        let original = fs::read_to_string(&dockerfile_path)
            .map_err(|e| Error::io(&dockerfile_path, e))?;
        let pinned = pin_base_images(&original, def, store, memo)?;

        fs::write(&tmp_path, &pinned).map_err(|e| Error::io(&tmp_path, e))?;

        let argv = vec![
            self.tool.clone(),
            "build".to_string(),
            "-f".to_string(),
            tmp_path.display().to_string(),
            "-t".to_string(),
            format!("{image}:{tag}"),
            workdir.display().to_string(),
        ];

        let output = process::run(&argv, &BTreeMap::new()).await?;
        if !output.success() {
            error!(
                "build of image '{}:{}' failed with exit code {}",
                alias, tag, output.code
            );
            for (stream, line) in &output.lines {
                error!("{}: {}", stream, line);
            }
            // The temp manifest is deliberately left behind here.
            return Err(Error::BuildFailed {
                alias: alias.to_string(),
                tag: tag.to_string(),
                code: output.code,
            });
        }
        debug!("built image '{}:{}'", alias, tag);

        fs::write(&bak_path, &original).map_err(|e| Error::io(&bak_path, e))?;
        fs::write(&dockerfile_path, &pinned).map_err(|e| Error::io(&dockerfile_path, e))?;
        fs::remove_file(&tmp_path).map_err(|e| Error::io(&tmp_path, e))?;

        info!("pinned base images in {}", dockerfile_path.display());
        Ok(())
    }
}

/// Rewrite every `FROM` line whose base image maps to one of the
/// definition's dependencies, pinning it to the dependency's tag.
/// Lines referencing images outside `depends_on` pass through verbatim.
pub(crate) fn pin_base_images(
    dockerfile: &str,
    def: &ImageDefinition,
    store: &ConfigStore,
    memo: &mut TagMemo,
) -> Result<String> {
    let mut out = String::with_capacity(dockerfile.len());
    let mut last = 0;

    for caps in FROM_LINE_RE.captures_iter(dockerfile) {
        let (whole, base, trailing) = match (caps.get(0), caps.get(1), caps.get(2)) {
            (Some(whole), Some(base), Some(trailing)) => (whole, base, trailing),
            _ => continue,
        };

        out.push_str(&dockerfile[last..whole.start()]);
        last = whole.end();

        let base = base.as_str();
        let dep_alias = store.alias_for_image(base).unwrap_or(base);
        match def.depends_on.get(dep_alias) {
            None => out.push_str(whole.as_str()),
            Some(Dependency::Pinned(pin)) => {
                out.push_str(&format!("FROM {}:{}{}", base, pin, trailing.as_str()));
            }
            Some(Dependency::Follow(_)) => {
                let tag = resolve::resolve(store.images(), dep_alias, memo)?;
                out.push_str(&format!("FROM {}:{}{}", base, tag, trailing.as_str()));
            }
        }
    }

    out.push_str(&dockerfile[last..]);
    Ok(out)
}
