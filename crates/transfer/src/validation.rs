use std::path::{Component, Path};

use chunkdrop_protocol::constants::HASH_INDEX_FILE;

use crate::TransferError;

/// Validates a client-supplied upload identifier before it is used as a
/// directory name under the temp root.
///
/// The identifier is otherwise opaque; it is never checked against the bytes
/// it claims to fingerprint.
pub fn validate_upload_id(upload_id: &str) -> Result<(), TransferError> {
    single_component(upload_id, "upload id")
}

/// Validates a client-declared file name before it is used as a file name in
/// the completed area.
///
/// Rejects everything [`validate_upload_id`] rejects, plus the name of the
/// hash index file.
pub fn validate_file_name(file_name: &str) -> Result<(), TransferError> {
    single_component(file_name, "file name")?;
    if file_name == HASH_INDEX_FILE {
        return Err(TransferError::InvalidPath(format!(
            "reserved file name: {file_name}"
        )));
    }
    Ok(())
}

/// Accepts exactly one normal path component.
///
/// Rejects:
/// - Empty values
/// - Absolute paths and Windows prefixes
/// - `.` and `..`
/// - Anything containing a separator
fn single_component(value: &str, what: &str) -> Result<(), TransferError> {
    if value.is_empty() {
        return Err(TransferError::InvalidPath(format!("empty {what}")));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidPath(format!(
            "{what} must not contain separators: {value}"
        )));
    }

    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(TransferError::InvalidPath(format!(
            "parent directory traversal not allowed: {value}"
        ))),
        _ => Err(TransferError::InvalidPath(format!(
            "{what} must be a plain name: {value}"
        ))),
    }
}
