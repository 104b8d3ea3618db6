//! Content archival: compressed uploads of raw HTML and extracted text
//!
//! Both objects are uploaded in parallel; the first failure cancels the
//! sibling upload and fails the archive as a whole. Compression goes through
//! the shared [`GzipPool`] so no deflate state is allocated per call.

use std::sync::Arc;

use thiserror::Error;

use crate::models::ArchiveKeys;
use crate::storage::{BlobError, BlobStore};
use crate::utils::compress::GzipPool;

/// Archival failure: either compression or one of the uploads.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("compression failed: {0}")]
    Compress(#[from] std::io::Error),

    #[error("upload failed: {0}")]
    Upload(#[from] BlobError),
}

/// Uploads page content to the blob store under the URL's hash.
pub struct ContentArchiver<B> {
    blob: Arc<B>,
    gzip: GzipPool,
}

impl<B: BlobStore> ContentArchiver<B> {
    pub fn new(blob: Arc<B>) -> Self {
        Self {
            blob,
            gzip: GzipPool::new(),
        }
    }

    /// The bucket archive pointers should reference.
    pub fn bucket(&self) -> &str {
        self.blob.bucket()
    }

    /// Archive the raw body and extracted text of one page.
    ///
    /// Object layout relative to the archive bucket:
    /// `<url_hash>/raw.html.gz` and `<url_hash>/text.txt.gz`, both gzip
    /// encoded with their uncompressed media type declared.
    pub async fn archive(
        &self,
        url_hash: &str,
        raw_html: &[u8],
        text: &str,
    ) -> Result<ArchiveKeys, ArchiveError> {
        let keys = ArchiveKeys {
            raw_key: format!("{url_hash}/raw.html.gz"),
            text_key: format!("{url_hash}/text.txt.gz"),
        };

        let raw_gz = self.gzip.compress(raw_html)?;
        let text_gz = self.gzip.compress(text.as_bytes())?;

        tokio::try_join!(
            self.blob
                .put_object(&keys.raw_key, raw_gz, "text/html", "gzip"),
            self.blob
                .put_object(&keys.text_key, text_gz, "text/plain", "gzip"),
        )?;

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use crate::utils::compress::gunzip;

    #[tokio::test]
    async fn test_archive_writes_both_objects() {
        let blob = Arc::new(MemoryBlobStore::new("test-bucket"));
        let archiver = ContentArchiver::new(Arc::clone(&blob));

        let keys = archiver
            .archive("abc123", b"<html>raw</html>", "visible text")
            .await
            .unwrap();

        assert_eq!(keys.raw_key, "abc123/raw.html.gz");
        assert_eq!(keys.text_key, "abc123/text.txt.gz");

        let raw = blob.object(&keys.raw_key).unwrap();
        assert_eq!(raw.content_type, "text/html");
        assert_eq!(raw.content_encoding, "gzip");
        assert_eq!(gunzip(&raw.body).unwrap(), b"<html>raw</html>");

        let text = blob.object(&keys.text_key).unwrap();
        assert_eq!(text.content_type, "text/plain");
        assert_eq!(gunzip(&text.body).unwrap(), b"visible text");
    }

    #[tokio::test]
    async fn test_archive_fails_when_either_upload_fails() {
        let blob = Arc::new(MemoryBlobStore::new("test-bucket"));
        blob.fail_key("abc123/text.txt.gz");
        let archiver = ContentArchiver::new(Arc::clone(&blob));

        let err = archiver
            .archive("abc123", b"<html></html>", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Upload(_)));
    }
}
