//! Filesystem helpers shared by archive creation and extraction.

use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::category::Category;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;

/// Regular files under `root/relative`, as paths relative to `root`, sorted.
///
/// A missing start path yields nothing. Symlinks are not followed and are
/// not returned, including a symlinked start path or ancestor.
pub(crate) fn tree_files(
    root: &Path,
    relative: &Path,
    operation: Operation,
) -> Result<Vec<PathBuf>> {
    if let Some(link) = symlinked_component(root, relative) {
        tracing::warn!(path = %link.display(), "skipping symlinked tree");
        return Ok(Vec::new());
    }
    let start = root.join(relative);
    if fs::symlink_metadata(&start).is_err() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&start)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| walk_error(operation, &start, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| {
                ResetError::invalid_input(
                    operation,
                    format!("{} escaped {}", entry.path().display(), root.display()),
                )
            })?
            .to_path_buf();
        files.push(relative);
    }
    files.sort();
    Ok(files)
}

/// Files a category selects under `source_root`.
pub(crate) fn category_files(
    source_root: &Path,
    category: &Category,
    operation: Operation,
) -> Result<Vec<PathBuf>> {
    let mut files = tree_files(source_root, category.root(), operation)?;
    files.retain(|path| category.selects(path));
    Ok(files)
}

/// First path from `root` down to `root/relative` that is a symbolic link.
/// `root` itself is not checked; a missing component ends the search.
pub(crate) fn symlinked_component(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Some(current),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Copy one file, creating parent directories. Returns the bytes written.
pub(crate) fn copy_file(from: &Path, to: &Path, operation: Operation) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(ResetError::io(operation, parent))?;
    }
    fs::copy(from, to).map_err(ResetError::io(operation, from))
}

/// Write through a temp file in the same directory, fsync, then rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], operation: Operation) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&temp).map_err(ResetError::io(operation, &temp))?;
    file.write_all(contents)
        .map_err(ResetError::io(operation, &temp))?;
    file.sync_all().map_err(ResetError::io(operation, &temp))?;
    drop(file);

    fs::rename(&temp, path).map_err(ResetError::io(operation, path))
}

/// Remove empty directories below `stop`, walking upward from `start`.
/// `stop` itself is never removed.
pub(crate) fn prune_empty_dirs(start: &Path, stop: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        // remove_dir only succeeds on empty directories.
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

/// Whether `dir` is missing or has no entries.
pub(crate) fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(err) => Err(err),
    }
}

fn walk_error(operation: Operation, start: &Path, err: walkdir::Error) -> ResetError {
    let path = err.path().unwrap_or(start).to_path_buf();
    ResetError::Io {
        operation,
        path,
        source: io::Error::from(err),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::category::DestructiveAction;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, relative).unwrap();
    }

    #[test]
    fn tree_files_are_relative_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "docs/plans/b.md");
        touch(dir.path(), "docs/plans/a/z.md");
        touch(dir.path(), "docs/plans/a.md");

        let files = tree_files(dir.path(), Path::new("docs/plans"), Operation::CreateArchive)
            .unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("docs/plans/a/z.md"),
                PathBuf::from("docs/plans/a.md"),
                PathBuf::from("docs/plans/b.md"),
            ]
        );
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let files = tree_files(dir.path(), Path::new("memory"), Operation::CreateArchive).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn single_file_root_is_returned() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.md");
        let files = tree_files(dir.path(), Path::new("notes.md"), Operation::CreateArchive).unwrap();
        assert_eq!(files, vec![PathBuf::from("notes.md")]);
    }

    #[test]
    fn category_files_apply_exclusion() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "docs/plans/x.md");
        touch(dir.path(), "docs/plans/README.md");
        touch(dir.path(), "docs/plans/plan.template.md");
        let category = Category::new("docs/plans", DestructiveAction::Clear).unwrap();
        let files = category_files(dir.path(), &category, Operation::CreateArchive).unwrap();
        assert_eq!(files, vec![PathBuf::from("docs/plans/x.md")]);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, b"{}", Operation::CreateArchive).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!dir.path().join(".out.json.tmp").exists());
    }

    #[test]
    fn pruning_stops_at_the_category_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("docs/plans");
        fs::create_dir_all(root.join("a/b")).unwrap();
        prune_empty_dirs(&root.join("a/b"), &root);
        assert!(root.is_dir());
        assert!(!root.join("a").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_roots_and_ancestors_yield_nothing() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "plans/secret.md");
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("plans"), dir.path().join("docs/plans"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("memory")).unwrap();

        let op = Operation::CreateArchive;
        assert!(tree_files(dir.path(), Path::new("docs/plans"), op).unwrap().is_empty());
        assert!(tree_files(dir.path(), Path::new("memory/plans"), op).unwrap().is_empty());
        assert_eq!(
            symlinked_component(dir.path(), Path::new("memory/plans/secret.md")),
            Some(dir.path().join("memory"))
        );
        assert_eq!(symlinked_component(dir.path(), Path::new("docs/reports")), None);
    }
}
