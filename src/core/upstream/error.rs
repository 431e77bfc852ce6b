use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request could not be sent or its body could not be read.
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// An `error` event inside the run's event stream.
    #[error("upstream stream error: {0}")]
    Stream(String),

    #[error("run still pending after {attempts} status checks")]
    PollTimeout { attempts: u32 },
}

impl UpstreamError {
    /// Builds a [`Status`](Self::Status) error, preferring the service's own message.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct Envelope {
            error: Inner,
        }
        #[derive(serde::Deserialize)]
        struct Inner {
            message: String,
        }

        let message = match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => envelope.error.message,
            Err(_) if body.trim().is_empty() => status.canonical_reason().unwrap_or("").to_owned(),
            Err(_) => body.trim().to_owned(),
        };
        Self::Status { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_extraction() {
        let err = UpstreamError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
        );
        assert_eq!(err.to_string(), "upstream returned 401 Unauthorized: Incorrect API key provided");

        let err = UpstreamError::from_status(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.to_string(), "upstream returned 502 Bad Gateway: Bad Gateway");
    }
}
