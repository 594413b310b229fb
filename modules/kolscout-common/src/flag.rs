use std::fs;
use std::io::Write;
use std::path::Path;

/// Write a flag value and read it back before reporting success. A write
/// that does not read back as the expected value is an error, guarding
/// against partial writes under concurrent access. Callers wrap the error
/// string in their own error variant.
pub(crate) fn write_verified(path: &Path, value: &str) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| format!("create {}: {e}", dir.display()))?;
        }
    }

    let mut file =
        fs::File::create(path).map_err(|e| format!("write {}: {e}", path.display()))?;
    file.write_all(value.as_bytes())
        .map_err(|e| format!("write {}: {e}", path.display()))?;
    file.sync_all()
        .map_err(|e| format!("sync {}: {e}", path.display()))?;
    drop(file);

    let read_back =
        fs::read_to_string(path).map_err(|e| format!("verify {}: {e}", path.display()))?;
    if read_back.trim() != value {
        return Err(format!(
            "flag verification failed for {}: expected {value:?}, found {:?}",
            path.display(),
            read_back.trim()
        ));
    }
    Ok(())
}

/// Read a flag value; a missing or unreadable file reads as None.
pub(crate) fn read(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
