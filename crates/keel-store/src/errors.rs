//! Store error types.

/// Errors raised by a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored text was not valid JSON.
    #[error("corrupt value for key {key}: {source}")]
    Corrupt {
        /// Key whose value failed to decode.
        key: String,
        /// Decode failure.
        source: serde_json::Error,
    },

    /// Filesystem failure while opening the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_display_names_key() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::Corrupt {
            key: "bg_msg_queue".into(),
            source,
        };
        assert!(err.to_string().starts_with("corrupt value for key bg_msg_queue"));
    }
}
