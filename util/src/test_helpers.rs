use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::paths::StorageLayout;

/// Creates a unique temporary storage root. The directory is removed when
/// the returned `TempDir` is dropped, so keep it in scope.
pub fn setup_test_storage_root() -> (TempDir, StorageLayout) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let abs = tmp
        .path()
        .canonicalize()
        .unwrap_or_else(|_| tmp.path().to_path_buf());
    let layout = StorageLayout::new(abs);
    (tmp, layout)
}

/// Writes `(name, contents)` pairs into `dir`, creating it first.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).expect("failed to create test dir");
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("failed to write test file");
    }
}
