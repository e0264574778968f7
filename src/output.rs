//! Manifest output
//!
//! Files are written through a temp file in the target directory and then
//! renamed, so a failed run never leaves a truncated manifest behind.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use trellis_common::{Error, Result};

/// Write `contents` to `path`, or to stdout when no path is given
pub fn write(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => write_file(path, contents),
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(contents.as_bytes())
                .and_then(|_| handle.flush())
                .map_err(|e| Error::io("writing to stdout", e))
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| Error::io(format!("creating temp file in {}", parent.display()), e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| Error::io(format!("writing {}", tmp.path().display()), e))?;
    tmp.persist(path)
        .map_err(|e| Error::io(format!("persisting {}", path.display()), e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "wrote output file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_file_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chart.yaml");

        write(Some(&path), "---\nkind: A\n").expect("first write");
        write(Some(&path), "---\nkind: B\n").expect("overwrite");

        let written = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(written, "---\nkind: B\n");
        assert_eq!(std::fs::read_dir(dir.path()).expect("list").count(), 1);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("chart.yaml");

        let err = write(Some(&path), "x").expect_err("should fail");
        assert!(matches!(err, Error::Io { .. }));
    }
}
