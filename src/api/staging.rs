//! Upload staging.
//!
//! Upload bodies arrive base64-encoded inside the request line. They are
//! decoded straight into a temp file so the remote write can stream from
//! disk. The temp file is deleted when the returned handle drops.

use std::io::{self, BufWriter, Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::read::DecoderReader;
use tempfile::NamedTempFile;

use crate::api::ApiError;
use crate::error::GateError;

/// Largest decoded upload accepted: 1 GiB.
pub const MAX_UPLOAD_SIZE: u64 = 1 << 30;

const STAGING_PREFIX: &str = "sftpgate-upload-";

/// Decode `content` into a fresh temp file.
pub fn stage(content: &str) -> Result<NamedTempFile, ApiError> {
    stage_with_limit(content, MAX_UPLOAD_SIZE)
}

pub(crate) fn stage_with_limit(content: &str, limit: u64) -> Result<NamedTempFile, ApiError> {
    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile()
        .map_err(|e| GateError::LocalStaging(format!("cannot create temp file: {}", e)))?;

    let mut decoder = DecoderReader::new(content.trim().as_bytes(), &BASE64);
    let mut limited = (&mut decoder).take(limit + 1);

    let written = {
        let mut writer = BufWriter::new(staged.as_file_mut());
        let n = io::copy(&mut limited, &mut writer).map_err(staging_error)?;
        writer.flush().map_err(staging_error)?;
        n
    };

    if written > limit {
        return Err(ApiError::invalid(format!(
            "upload exceeds the {} byte limit",
            limit
        )));
    }

    tracing::debug!(
        "Staged {} bytes at {}",
        written,
        staged.path().display()
    );
    Ok(staged)
}

fn staging_error(err: io::Error) -> ApiError {
    if err.kind() == io::ErrorKind::InvalidData {
        ApiError::invalid(format!("content is not valid base64: {}", err))
    } else {
        GateError::LocalStaging(err.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn decodes_into_prefixed_temp_file() {
        let encoded = BASE64.encode(b"hello, remote");
        let staged = stage(&encoded).unwrap();

        let name = staged.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("sftpgate-upload-"));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"hello, remote");
    }

    #[test]
    fn empty_content_stages_empty_file() {
        let staged = stage("").unwrap();
        assert_eq!(std::fs::metadata(staged.path()).unwrap().len(), 0);
    }

    #[test]
    fn temp_file_removed_on_drop() {
        let staged = stage(&BASE64.encode(b"x")).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn invalid_base64_is_invalid_request() {
        let err = stage("not*base64!").unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");
        assert!(err.message.contains("base64"));
    }

    #[test]
    fn over_limit_is_rejected() {
        let encoded = BASE64.encode(vec![7u8; 64]);
        assert!(stage_with_limit(&encoded, 64).is_ok());

        let err = stage_with_limit(&encoded, 63).unwrap_err();
        assert_eq!(err.code, "INVALID_REQUEST");
        assert!(err.message.contains("limit"));
    }
}
