//! Saving references to disk and loading them back.

use std::path::Path;

use tracing::debug;

use crate::error::NexusResult;
use crate::models::references::Ref;

/// Write `reference` to `path` as tagged JSON.
///
/// With `mkdir`, missing parent directories are created.
pub async fn save(reference: &Ref, path: impl AsRef<Path>, mkdir: bool) -> NexusResult<()> {
    let path = path.as_ref();
    if mkdir {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(reference)?;
    tokio::fs::write(path, json).await?;
    debug!(path = %path.display(), kind = reference.type_name(), "Saved reference");
    Ok(())
}

/// Read a reference written by [`save`].
pub async fn load(path: impl AsRef<Path>) -> NexusResult<Ref> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    Ref::from_json(serde_json::from_str(&text)?)
}
