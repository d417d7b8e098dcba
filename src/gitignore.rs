// ABOUTME: Idempotent .gitignore maintenance for the local config scope
// ABOUTME: Ensures mcp.local.json never gets committed without editing the whole file by hand

use std::io::Write;
use std::path::Path;

use crate::errors::AppResult;

/// Append `entry` to `<dir>/.gitignore`, creating the file if needed, unless an
/// identical line is already present. Used to keep `mcp.local.json` out of
/// version control without clobbering any existing `.gitignore` content.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written.
pub fn ensure_ignored(dir: &Path, entry: &str) -> AppResult<()> {
    let path = dir.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();

    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    let mut contents = existing;
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(entry);
    contents.push('\n');

    std::fs::create_dir_all(dir)?;
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_file_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        ensure_ignored(dir.path(), "mcp.local.json").unwrap();
        let contents = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(contents, "mcp.local.json\n");
    }

    #[test]
    fn appends_without_clobbering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "node_modules\n").unwrap();
        ensure_ignored(dir.path(), "mcp.local.json").unwrap();
        let contents = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(contents, "node_modules\nmcp.local.json\n");
    }

    #[test]
    fn idempotent_on_repeat_calls() {
        let dir = tempfile::tempdir().unwrap();
        ensure_ignored(dir.path(), "mcp.local.json").unwrap();
        ensure_ignored(dir.path(), "mcp.local.json").unwrap();
        let contents = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(contents.matches("mcp.local.json").count(), 1);
    }

    #[test]
    fn tolerates_missing_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "node_modules").unwrap();
        ensure_ignored(dir.path(), "mcp.local.json").unwrap();
        let contents = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(contents, "node_modules\nmcp.local.json\n");
    }
}
