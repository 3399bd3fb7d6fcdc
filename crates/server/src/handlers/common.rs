use std::path::Path;

use chunkdrop_protocol::FileDescriptor;
use chunkdrop_transfer::CompletedFile;

/// Describes a completed file. The MIME type comes from the extension only.
pub fn describe_file(name: &str, path: &Path, size: u64) -> FileDescriptor {
    FileDescriptor {
        file_name: name.to_string(),
        mimetype: mime_for(name),
        extension: Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default(),
        path: path.display().to_string(),
        size,
    }
}

pub fn describe_completed(file: &CompletedFile) -> FileDescriptor {
    describe_file(&file.name, &file.path, file.size)
}

pub fn mime_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
