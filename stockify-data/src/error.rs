use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `stockify-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("request to {endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid strike key: {0}")]
    InvalidStrike(String),

    #[error(
        "\
        invalid history series: timestamp len {timestamps} does not match \
        oi len {oi}, oi change len {oi_change}, volume len {volume} \
    "
    )]
    InvalidHistory {
        timestamps: usize,
        oi: usize,
        oi_change: usize,
        volume: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for DataError {
    fn from(error: reqwest::Error) -> Self {
        let endpoint = error
            .url()
            .map(|url| url.path().to_string())
            .unwrap_or_default();

        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status {
                endpoint,
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                endpoint,
                message: error.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for DataError {
    fn from(error: url::ParseError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_error_from_serde_json() {
        let error = serde_json::from_str::<u64>("not a number").unwrap_err();
        assert!(matches!(DataError::from(error), DataError::Decode(_)));
    }
}
