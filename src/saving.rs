use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace the file at `path` with `bytes`.
///
/// The content goes to a temporary file next to the target which is then
/// renamed over it, so readers see either the old file or the new one and a
/// failed write leaves the old file untouched.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    Ok(())
}
