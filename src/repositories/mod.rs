pub mod cachings;
pub mod networks;
pub mod populations;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes `contents` to a sibling temporary file and renames it over `path`,
/// so readers see either the old or the new file, never a partial one.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)
}
