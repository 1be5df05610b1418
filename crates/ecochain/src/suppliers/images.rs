use mime::Mime;

use super::domain::SupplierId;

const PUBLIC_STORAGE_HOST: &str = "https://storage.googleapis.com";

/// Content type for an accepted upload. Only PNG and JPEG images are accepted.
pub fn content_type_for(file_name: &str) -> Option<Mime> {
    mime_guess::from_path(file_name)
        .iter()
        .find(|guess| *guess == mime::IMAGE_PNG || *guess == mime::IMAGE_JPEG)
}

/// Blob name for the `position`-th image (1-based) of a supplier: `<id>_<position>.<ext>`.
pub fn blob_name(supplier_id: &SupplierId, position: usize, file_name: &str) -> Option<String> {
    let ext = extension(file_name)?;
    Some(format!("{supplier_id}_{position}.{ext}"))
}

/// Rewrite a `gs://bucket/path` location into its public HTTPS form.
pub fn public_url(location: &str) -> Option<String> {
    let (bucket, path) = location.strip_prefix("gs://")?.split_once('/')?;
    if bucket.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("{PUBLIC_STORAGE_HOST}/{bucket}/{path}"))
}

fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.trim().to_ascii_lowercase();
    (!ext.is_empty()).then_some(ext)
}
