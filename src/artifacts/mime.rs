// Lookup tables mapping language tags, extensions, kinds and MIME types

use crate::artifacts::types::ArtifactKind;

/// File extension for a fenced-block language tag
pub fn extension_for_language(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "python" | "py" => "py",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "xml" => "xml",
        "markdown" | "md" => "md",
        "bash" | "shell" | "sh" => "sh",
        "sql" => "sql",
        "yaml" | "yml" => "yaml",
        "rust" | "rs" => "rs",
        _ => "txt",
    }
}

/// MIME type for a fenced-block language tag
pub fn mime_for_language(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "javascript" | "js" => "application/javascript",
        "typescript" | "ts" => "application/typescript",
        "python" | "py" => "text/x-python",
        "java" => "text/x-java-source",
        "cpp" => "text/x-c++src",
        "c" => "text/x-c",
        "html" => "text/html",
        "css" => "text/css",
        "json" => "application/json",
        "xml" => "application/xml",
        "markdown" | "md" => "text/markdown",
        "bash" | "shell" | "sh" => "application/x-sh",
        "sql" => "application/sql",
        "yaml" | "yml" => "text/yaml",
        "rust" | "rs" => "text/x-rust",
        _ => "text/plain",
    }
}

/// Artifact kind inferred from a stored file's extension
pub fn kind_for_extension(extension: &str) -> ArtifactKind {
    match extension.to_ascii_lowercase().as_str() {
        "js" | "ts" | "jsx" | "tsx" | "py" | "java" | "cpp" | "c" | "html" | "css" | "json"
        | "xml" | "sh" | "sql" | "yaml" | "rs" => ArtifactKind::Code,
        "md" | "txt" => ArtifactKind::Text,
        "pdf" | "doc" | "docx" => ArtifactKind::Document,
        "jpg" | "jpeg" | "png" | "gif" | "svg" | "webp" => ArtifactKind::Image,
        _ => ArtifactKind::File,
    }
}

/// MIME type inferred from a stored file's extension
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "js" | "jsx" => "application/javascript",
        "ts" | "tsx" => "application/typescript",
        "py" => "text/x-python",
        "java" => "text/x-java-source",
        "cpp" => "text/x-c++src",
        "c" => "text/x-c",
        "html" => "text/html",
        "css" => "text/css",
        "json" => "application/json",
        "xml" => "application/xml",
        "sh" => "application/x-sh",
        "sql" => "application/sql",
        "yaml" => "text/yaml",
        "rs" => "text/x-rust",
        "md" => "text/markdown",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Extension for a known MIME type
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    let ext = match essence.to_ascii_lowercase().as_str() {
        "application/javascript" | "text/javascript" => "js",
        "application/typescript" => "ts",
        "text/x-python" => "py",
        "text/x-java-source" => "java",
        "text/x-c++src" => "cpp",
        "text/x-c" => "c",
        "text/html" => "html",
        "text/css" => "css",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/x-sh" => "sh",
        "application/sql" => "sql",
        "text/yaml" => "yaml",
        "text/x-rust" => "rs",
        "text/markdown" => "md",
        "text/plain" => "txt",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        _ => return None,
    };
    Some(ext)
}

/// Default MIME type when the caller gives none
pub fn mime_for_kind(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Code | ArtifactKind::Text => "text/plain",
        ArtifactKind::Image => "image/png",
        ArtifactKind::Document | ArtifactKind::File => "application/octet-stream",
    }
}

/// Storage extension: kind first, then MIME type, then a generic fallback
pub fn storage_extension(kind: ArtifactKind, mime_type: Option<&str>) -> &'static str {
    match kind {
        ArtifactKind::Code | ArtifactKind::Text | ArtifactKind::Document => "txt",
        ArtifactKind::Image => "png",
        ArtifactKind::File => mime_type.and_then(extension_for_mime).unwrap_or("bin"),
    }
}
