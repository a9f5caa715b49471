use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;

use crate::error::ApiError;

/// On-disk store for issued certificate PDFs. Files are written durably
/// before the matching database row is committed, and deleted again when
/// that commit fails.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl FileStore {
    pub fn new(dir: PathBuf, max_bytes: usize) -> Self {
        FileStore { dir, max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Creates the upload directory if it does not exist yet.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Path traversal guard: a stored filename must be a bare name made of a
    /// small allowlisted character set. Checked before any filesystem access.
    pub fn validate_filename(name: &str) -> Result<(), ApiError> {
        let bare = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains("..")
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        // Belt and braces: the name must also survive Path::file_name intact.
        let unchanged = Path::new(name)
            .file_name()
            .map(|f| f == std::ffi::OsStr::new(name))
            .unwrap_or(false);

        if bare && unchanged {
            Ok(())
        } else {
            Err(ApiError::Validation("Invalid filename format.".to_string()))
        }
    }

    /// Builds a stored name embedding the sanitized roll number plus a
    /// timestamp-and-random suffix, so concurrent uploads for the same
    /// student never collide.
    pub fn make_cert_filename(roll_no: &str) -> String {
        let safe_roll: String = roll_no
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        format!(
            "cert-{}-{}-{}.pdf",
            safe_roll,
            Utc::now().timestamp_millis(),
            suffix
        )
    }

    pub fn path_for(&self, filename: &str) -> Result<PathBuf, ApiError> {
        Self::validate_filename(filename)?;
        Ok(self.dir.join(filename))
    }

    /// Writes the file and fsyncs it before returning, so a committed
    /// certificate row never points at bytes that only lived in page cache.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, ApiError> {
        if bytes.len() > self.max_bytes {
            return Err(ApiError::Validation(format!(
                "File too large. Maximum size allowed is {} bytes.",
                self.max_bytes
            )));
        }
        let path = self.path_for(filename)?;
        let mut file = File::create(&path).map_err(ApiError::internal)?;
        file.write_all(bytes).map_err(ApiError::internal)?;
        file.sync_all().map_err(ApiError::internal)?;
        Ok(path)
    }

    /// Compensating delete after a failed row insert. Best effort: a failure
    /// here leaves an orphan file that is recoverable by audit, so it is
    /// logged rather than masked.
    pub fn delete(&self, filename: &str) {
        match self.path_for(filename) {
            Ok(path) => {
                if let Err(err) = fs::remove_file(&path) {
                    tracing::warn!(file = filename, error = %err, "failed to delete orphaned certificate file");
                }
            }
            Err(_) => {
                tracing::warn!(file = filename, "refusing to delete file with invalid name");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal_before_touching_disk() {
        assert!(FileStore::validate_filename("../etc/passwd").is_err());
        assert!(FileStore::validate_filename("a/b.pdf").is_err());
        assert!(FileStore::validate_filename("a\\b.pdf").is_err());
        assert!(FileStore::validate_filename("..").is_err());
        assert!(FileStore::validate_filename(".hidden.pdf").is_err());
        assert!(FileStore::validate_filename("").is_err());
        assert!(FileStore::validate_filename("cert name.pdf").is_err());
    }

    #[test]
    fn accepts_bare_generated_names() {
        assert!(FileStore::validate_filename("cert-22UCS123-1714650000000-12345.pdf").is_ok());
        let generated = FileStore::make_cert_filename("22UCS123");
        assert!(FileStore::validate_filename(&generated).is_ok());
    }

    #[test]
    fn sanitizes_roll_number_in_filename() {
        let name = FileStore::make_cert_filename("22/UCS..123");
        assert!(name.starts_with("cert-22_UCS__123-"));
        assert!(FileStore::validate_filename(&name).is_ok());
    }

    #[test]
    fn generated_names_do_not_collide() {
        let a = FileStore::make_cert_filename("22UCS123");
        let b = FileStore::make_cert_filename("22UCS123");
        assert_ne!(a, b);
    }

    #[test]
    fn save_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), 1024);

        let path = store.save("cert-x-1-1.pdf", b"%PDF-1.4 test").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.4 test");

        store.delete("cert-x-1-1.pdf");
        assert!(!path.exists());
    }

    #[test]
    fn save_enforces_size_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), 8);

        match store.save("cert-x-1-2.pdf", b"123456789") {
            Err(ApiError::Validation(_)) => {}
            other => panic!("expected Validation error, got {other:?}"),
        }
        assert!(!dir.path().join("cert-x-1-2.pdf").exists());
    }
}
