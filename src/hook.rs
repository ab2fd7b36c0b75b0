//! Post-build hook execution.
//!
//! Formats a hook's command line and environment from a context mapping
//! (`{image}`, `{alias}`, `{tag}`) and runs it through the process
//! runner. The formatted environment is an overlay on the inherited
//! environment, not a replacement.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error};

use crate::config::Hook;
use crate::error::{Error, Result};
use crate::process;

/// Matches `{key}`-style placeholders in hook templates.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid hook placeholder regex")
});

/// Run `hook` with every template formatted from `ctx`.
///
/// # Errors
///
/// Fails with [`Error::HookFailed`] when the command exits non-zero
/// (after replaying its captured output at error level), or with
/// [`Error::MissingHookKey`] when a template names a key absent from
/// the context.
pub async fn run(ctx: &BTreeMap<String, String>, hook: &Hook) -> Result<()> {
    let argv = hook
        .cmd
        .iter()
        .map(|tmpl| render(tmpl, ctx))
        .collect::<Result<Vec<_>>>()?;
    let env = hook
        .env
        .iter()
        .map(|(name, tmpl)| Ok((name.clone(), render(tmpl, ctx)?)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let output = process::run(&argv, &env).await?;
    if !output.success() {
        error!("hook failed with exit code {}", output.code);
        for (stream, line) in &output.lines {
            error!("{}: {}", stream, line);
        }
        return Err(Error::HookFailed { code: output.code });
    }

    debug!("hook finished");
    Ok(())
}

/// Substitute `{key}` placeholders from the context. Text that does not
/// match the placeholder shape passes through verbatim.
fn render(template: &str, ctx: &BTreeMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (whole, key) = match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(key)) => (whole, key),
            _ => continue,
        };

        out.push_str(&template[last..whole.start()]);
        last = whole.end();

        let value = ctx.get(key.as_str()).ok_or_else(|| Error::MissingHookKey {
            key: key.as_str().to_string(),
        })?;
        out.push_str(value);
    }

    out.push_str(&template[last..]);
    Ok(out)
}
