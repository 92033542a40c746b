//! Upload validation applied before anything reaches a backend

use regex::Regex;
use std::{path::Path, sync::OnceLock};

use crate::error::{StorageError, StorageResult};
use crate::gateway::Upload;

/// Limits applied to every upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Maximum size of a single file in bytes
    pub max_file_size: u64,
    /// Maximum number of files in one request
    pub max_files: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 5_000_000,
            max_files: 5,
        }
    }
}

fn image_types() -> &'static Regex {
    static IMAGE_TYPES: OnceLock<Regex> = OnceLock::new();
    IMAGE_TYPES
        .get_or_init(|| Regex::new(r"jpeg|jpg|png|gif").expect("Failed to compile image regex"))
}

impl UploadPolicy {
    /// Both the file extension and the MIME type must name an accepted image
    /// format, and the file must fit the size limit.
    pub fn validate(&self, upload: &Upload) -> StorageResult<()> {
        let extension = Path::new(&upload.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !image_types().is_match(&extension) || !image_types().is_match(&upload.content_type) {
            return Err(StorageError::InvalidFileType(upload.file_name.clone()));
        }

        if upload.size() > self.max_file_size {
            return Err(StorageError::FileTooLarge {
                name: upload.file_name.clone(),
                size: upload.size(),
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate a multi-file request.
    pub fn validate_all(&self, uploads: &[Upload]) -> StorageResult<()> {
        if uploads.len() > self.max_files {
            return Err(StorageError::TooManyFiles {
                count: uploads.len(),
                max: self.max_files,
            });
        }

        uploads.iter().try_for_each(|upload| self.validate(upload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, content_type: &str, size: usize) -> Upload {
        Upload::new(name, content_type, vec![0u8; size])
    }

    #[test]
    fn test_accepts_supported_images() {
        let policy = UploadPolicy::default();
        for (name, mime) in [
            ("a.jpg", "image/jpeg"),
            ("b.JPEG", "image/jpeg"),
            ("c.png", "image/png"),
            ("d.gif", "image/gif"),
        ] {
            assert!(policy.validate(&image(name, mime, 10)).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_rejects_mismatched_extension_or_mime() {
        let policy = UploadPolicy::default();
        let err = policy
            .validate(&image("notes.pdf", "image/png", 10))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidFileType(_)));

        let err = policy
            .validate(&image("crop.png", "application/pdf", 10))
            .unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_rejects_oversized_file() {
        let policy = UploadPolicy {
            max_file_size: 100,
            max_files: 5,
        };
        assert!(policy.validate(&image("a.png", "image/png", 100)).is_ok());
        let err = policy.validate(&image("a.png", "image/png", 101)).unwrap_err();
        assert!(matches!(err, StorageError::FileTooLarge { size: 101, .. }));
    }

    #[test]
    fn test_rejects_too_many_files() {
        let policy = UploadPolicy::default();
        let uploads: Vec<Upload> = (0..6)
            .map(|i| image(&format!("{}.png", i), "image/png", 1))
            .collect();
        let err = policy.validate_all(&uploads).unwrap_err();
        assert!(matches!(err, StorageError::TooManyFiles { count: 6, max: 5 }));
        assert!(policy.validate_all(&uploads[..5]).is_ok());
    }
}
