use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use std::io::Write;

use crate::asset::Asset;
use crate::config::{GzipSetting, UploadOptions};
use crate::error::{PublishError, Result};

pub const CONTENT_ENCODING: &str = "Content-Encoding";

/// Upload body plus the transport options that describe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub body: Bytes,
    pub options: UploadOptions,
}

/// Prepare an asset for upload
///
/// With compression disabled the content and `base` options pass through
/// untouched. Otherwise the content is gzipped and the returned options are
/// `base` plus a `Content-Encoding: gzip` header; `base` itself is never
/// modified.
pub fn encode(asset: &Asset, setting: GzipSetting, base: &UploadOptions) -> Result<EncodedBody> {
    let level = match setting {
        GzipSetting::Disabled => {
            return Ok(EncodedBody {
                body: asset.content.clone(),
                options: base.clone(),
            });
        }
        GzipSetting::Enabled => Compression::default(),
        GzipSetting::Level(level) if level <= 9 => Compression::new(level),
        GzipSetting::Level(level) => {
            return Err(PublishError::Encoding {
                name: asset.name.clone(),
                message: format!("invalid gzip level {} (expected 0-9)", level),
            });
        }
    };

    let body = gzip(&asset.content, level).map_err(|e| PublishError::Encoding {
        name: asset.name.clone(),
        message: e.to_string(),
    })?;

    Ok(EncodedBody {
        body: Bytes::from(body),
        options: base.with_header(CONTENT_ENCODING, "gzip"),
    })
}

fn gzip(content: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(content.len() / 2), level);
    encoder.write_all(content)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    fn asset() -> Asset {
        Asset::new("main.js", "console.log('hello');".repeat(50))
    }

    #[test]
    fn test_gzip_round_trip_sets_marker() {
        let asset = asset();
        let encoded = encode(&asset, GzipSetting::Enabled, &UploadOptions::default()).unwrap();

        assert_ne!(encoded.body, asset.content);
        assert_eq!(gunzip(&encoded.body), asset.content.to_vec());
        assert_eq!(encoded.options.header(CONTENT_ENCODING), Some("gzip"));
    }

    #[test]
    fn test_disabled_passes_bytes_through() {
        let asset = asset();
        let base = UploadOptions::default().with_header("Cache-Control", "no-cache");
        let encoded = encode(&asset, GzipSetting::Disabled, &base).unwrap();

        assert_eq!(encoded.body, asset.content);
        assert_eq!(encoded.options, base);
    }

    #[test]
    fn test_level_keeps_base_options() {
        let asset = asset();
        let base = UploadOptions::default().with_header("Cache-Control", "max-age=3600");
        let encoded = encode(&asset, GzipSetting::Level(9), &base).unwrap();

        assert_eq!(gunzip(&encoded.body), asset.content.to_vec());
        assert_eq!(encoded.options.header("Cache-Control"), Some("max-age=3600"));
        assert_eq!(encoded.options.header(CONTENT_ENCODING), Some("gzip"));
        assert_eq!(base.header(CONTENT_ENCODING), None);
    }

    #[test]
    fn test_invalid_level_is_encoding_error() {
        let err = encode(&asset(), GzipSetting::Level(42), &UploadOptions::default()).unwrap_err();
        assert_eq!(err.code(), "EncodingError");
    }
}
