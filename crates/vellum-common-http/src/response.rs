//! HTTP response decoding.

use serde::de::DeserializeOwned;

/// Parse a JSON response.
pub async fn parse_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ResponseError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(ResponseError::Read)?;
    decode_json(status.as_u16(), &bytes)
}

/// Decode a JSON body that has already been read.
pub fn decode_json<T: DeserializeOwned>(status: u16, bytes: &[u8]) -> Result<T, ResponseError> {
    serde_json::from_slice(bytes).map_err(|e| ResponseError::Parse {
        status,
        body: String::from_utf8_lossy(bytes).to_string(),
        source: e,
    })
}

/// Response parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("failed to read response body: {0}")]
    Read(#[source] reqwest::Error),

    #[error("failed to parse JSON (status {status}): {source}")]
    Parse {
        status: u16,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        element_path: String,
        granted: bool,
    }

    #[test]
    fn test_decode_rows() {
        let rows: Vec<Row> =
            decode_json(200, br#"[{"element_path":"deal:read","granted":true}]"#).unwrap();
        assert_eq!(
            rows,
            vec![Row {
                element_path: "deal:read".to_string(),
                granted: true
            }]
        );
    }

    #[test]
    fn test_decode_nullable_scalar() {
        let value: Option<bool> = decode_json(200, b"null").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_response_error_display() {
        let err = decode_json::<Row>(400, b"invalid json").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("failed to parse JSON"));
        assert!(message.contains("status 400"));
        match err {
            ResponseError::Parse { body, .. } => assert_eq!(body, "invalid json"),
            other => panic!("Expected Parse, got {other:?}"),
        }
    }
}
