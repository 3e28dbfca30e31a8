//! Local-disk storage for listing images.
//!
//! Files live in the configured uploads directory under random names
//! (`<uuid>.<ext>`) and are served read-only at `/uploads`.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use waladaw_core::DomainError;

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Accepted content types and the extension stored for each.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// An uploaded file as received from the form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Image store rooted at the uploads directory.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory served at `/uploads`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and write an image. Returns the stored file name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRule` for unsupported types or oversized
    /// files, `DomainError::Technical` if the file cannot be written.
    pub async fn save(&self, upload: &ImageUpload) -> Result<String, DomainError> {
        let extension = validate(upload)?;
        let name = format!("{}.{extension}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DomainError::technical(format!("create uploads dir: {e}")))?;
        tokio::fs::write(self.root.join(&name), &upload.bytes)
            .await
            .map_err(|e| DomainError::technical(format!("write image: {e}")))?;

        tracing::info!(file = %name, bytes = upload.bytes.len(), "image stored");
        Ok(name)
    }

    /// Remove a stored image. Missing files and foreign names are ignored.
    pub async fn delete(&self, name: &str) {
        if !is_stored_name(name) {
            tracing::warn!(file = %name, "refusing to delete unexpected upload name");
            return;
        }
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => tracing::info!(file = %name, "image deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(file = %name, error = %e, "failed to delete image"),
        }
    }
}

fn validate(upload: &ImageUpload) -> Result<&'static str, DomainError> {
    if upload.bytes.is_empty() {
        return Err(DomainError::rule("The image file is empty"));
    }
    if upload.bytes.len() > MAX_IMAGE_BYTES {
        return Err(DomainError::rule("Images must be at most 5 MB"));
    }
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(upload.content_type.trim()))
        .map(|(_, ext)| *ext)
        .ok_or_else(|| DomainError::rule("Images must be JPEG, PNG, WebP or GIF"))
}

/// Whether `name` looks like a file this store created.
fn is_stored_name(name: &str) -> bool {
    name.split_once('.').is_some_and(|(stem, ext)| {
        Uuid::parse_str(stem).is_ok() && ALLOWED_TYPES.iter().any(|(_, e)| *e == ext)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> ImageUpload {
        ImageUpload {
            content_type: content_type.to_owned(),
            bytes: vec![0xAB; len],
        }
    }

    #[test]
    fn test_validate_types_and_size() {
        assert_eq!(validate(&upload("image/png", 10)).unwrap(), "png");
        assert_eq!(validate(&upload("IMAGE/JPEG", 10)).unwrap(), "jpg");
        assert!(validate(&upload("application/pdf", 10)).is_err());
        assert!(validate(&upload("image/png", 0)).is_err());
        assert!(validate(&upload("image/png", MAX_IMAGE_BYTES)).is_ok());
        assert!(validate(&upload("image/png", MAX_IMAGE_BYTES + 1)).is_err());
    }

    #[test]
    fn test_is_stored_name() {
        let name = format!("{}.webp", Uuid::new_v4());
        assert!(is_stored_name(&name));
        assert!(!is_stored_name("../../etc/passwd"));
        assert!(!is_stored_name("photo.png"));
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let root = std::env::temp_dir().join(format!("waladaw-storage-{}", Uuid::new_v4()));
        let storage = ImageStorage::new(&root);

        let name = storage.save(&upload("image/gif", 64)).await.unwrap();
        assert!(name.ends_with(".gif"));
        assert_eq!(tokio::fs::read(root.join(&name)).await.unwrap().len(), 64);

        storage.delete(&name).await;
        assert!(!root.join(&name).exists());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
