//! Dockerfile generation
//!
//! The container recipe comes from a caller-supplied override or the bundled
//! template. Only the default entrypoint line is rewritten so the container
//! starts the project's binary in the run phase.

use crate::error::Result;
use crate::templates::Template;
use std::path::Path;
use tracing::debug;

/// Entrypoint line the templates ship with
pub const DEFAULT_ENTRYPOINT: &str = r#"CMD ["/app/app", "serve"]"#;

/// Entrypoint line starting `entry` in the run phase
pub fn entrypoint_line(entry: &str) -> String {
    format!(r#"CMD ["/app/{}", "serve"]"#, entry)
}

/// Replace the first default entrypoint line in `template`
pub fn render(template: &str, entry: &str) -> String {
    template.replacen(DEFAULT_ENTRYPOINT, &entrypoint_line(entry), 1)
}

/// Render the Dockerfile for `entry` and write it to `output`.
///
/// `template` overrides the bundled recipe when given.
pub async fn write(template: Option<&Path>, entry: &str, output: &Path) -> Result<()> {
    let source = match template {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => Template::Dockerfile.source().to_string(),
    };

    if !source.contains(DEFAULT_ENTRYPOINT) {
        debug!("Dockerfile template has no default entrypoint, writing unchanged");
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, render(&source, entry)).await?;
    Ok(())
}
