use base64::{Engine, engine::general_purpose::STANDARD};
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::UploadOptions;

/// Detect Content-Type based on the key's file extension
///
/// Returns the MIME type for common build outputs. Falls back to
/// "application/octet-stream" for unknown types.
pub fn detect_content_type(key: &str) -> String {
    let ext = Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        // Scripts and styles
        Some("js") | Some("mjs") | Some("cjs") => "text/javascript",
        Some("css") => "text/css",
        Some("map") | Some("json") => "application/json",
        Some("wasm") => "application/wasm",

        // Markup and text
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        Some("xml") => "application/xml",
        Some("md") => "text/markdown",

        // Images
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        // Media
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",

        _ => "application/octet-stream",
    }
    .to_string()
}

/// Content-Type for a put: an explicit header wins over detection
pub fn content_type_for(key: &str, options: &UploadOptions) -> String {
    options
        .header("Content-Type")
        .map(str::to_string)
        .unwrap_or_else(|| detect_content_type(key))
}

/// Parse a header list into a map
///
/// Expected format: "Name1=value1,Name2=value2". Pairs with an empty name or
/// value are dropped.
pub fn parse_headers(headers_str: &str) -> BTreeMap<String, String> {
    headers_str
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let (key, value) = (key.trim(), value.trim());

            if key.is_empty() || value.is_empty() {
                None
            } else {
                Some((key.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// Where an upload header ends up on a put request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderField {
    ContentType,
    ContentEncoding,
    CacheControl,
    ContentDisposition,
    ContentLanguage,
    /// User metadata, with the `x-amz-meta-`/`x-oss-meta-` prefix stripped
    Metadata(String),
    Unsupported,
}

/// Map a header name (any case) to its put request field
pub fn classify_header(name: &str) -> HeaderField {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "content-type" => HeaderField::ContentType,
        "content-encoding" => HeaderField::ContentEncoding,
        "cache-control" => HeaderField::CacheControl,
        "content-disposition" => HeaderField::ContentDisposition,
        "content-language" => HeaderField::ContentLanguage,
        _ => lower
            .strip_prefix("x-amz-meta-")
            .or_else(|| lower.strip_prefix("x-oss-meta-"))
            .filter(|meta| !meta.is_empty())
            .map(|meta| HeaderField::Metadata(meta.to_string()))
            .unwrap_or(HeaderField::Unsupported),
    }
}

/// Base64 MD5 digest for the Content-MD5 header
pub fn content_md5(body: &[u8]) -> String {
    STANDARD.encode(Md5::digest(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_content_type_web() {
        assert_eq!(detect_content_type("static/app/main.js"), "text/javascript");
        assert_eq!(detect_content_type("static/app/main.CSS"), "text/css");
        assert_eq!(detect_content_type("main.js.map"), "application/json");
        assert_eq!(detect_content_type("fonts/a.woff2"), "font/woff2");
    }

    #[test]
    fn test_detect_content_type_unknown() {
        assert_eq!(detect_content_type("file.unknown"), "application/octet-stream");
        assert_eq!(detect_content_type("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_content_type_header_overrides_detection() {
        let options = UploadOptions::default().with_header("content-type", "text/plain");
        assert_eq!(content_type_for("app.js", &options), "text/plain");
        assert_eq!(
            content_type_for("app.js", &UploadOptions::default()),
            "text/javascript"
        );
    }

    #[test]
    fn test_classify_header() {
        assert_eq!(classify_header("Content-Type"), HeaderField::ContentType);
        assert_eq!(classify_header("content-encoding"), HeaderField::ContentEncoding);
        assert_eq!(classify_header("Cache-Control"), HeaderField::CacheControl);
        assert_eq!(
            classify_header("Content-Disposition"),
            HeaderField::ContentDisposition
        );
        assert_eq!(classify_header("Content-Language"), HeaderField::ContentLanguage);
    }

    #[test]
    fn test_classify_header_metadata() {
        assert_eq!(
            classify_header("x-amz-meta-build"),
            HeaderField::Metadata("build".to_string())
        );
        assert_eq!(
            classify_header("X-OSS-Meta-Commit"),
            HeaderField::Metadata("commit".to_string())
        );
        assert_eq!(classify_header("x-amz-meta-"), HeaderField::Unsupported);
    }

    #[test]
    fn test_classify_header_unsupported() {
        assert_eq!(classify_header("Expires"), HeaderField::Unsupported);
        assert_eq!(classify_header("x-custom"), HeaderField::Unsupported);
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers("Cache-Control=max-age=31536000, x-amz-meta-build=42");

        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get("Cache-Control"),
            Some(&"max-age=31536000".to_string())
        );
        assert_eq!(headers.get("x-amz-meta-build"), Some(&"42".to_string()));
    }

    #[test]
    fn test_parse_headers_malformed() {
        let headers = parse_headers("Cache-Control=no-cache,invalid,Expires=");

        assert_eq!(headers.len(), 1);
        assert!(parse_headers("").is_empty());
    }

    #[test]
    fn test_content_md5() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }
}
