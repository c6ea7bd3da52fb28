//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while loading or applying rule files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Rule file could not be read from disk.
    #[error("failed to read rule file {}: {source}", path.display())]
    Read {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Rule file is not a valid manifest.
    #[error("failed to parse rule file {}: {message}", path.display())]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// A node-mask pattern is not a valid regular expression.
    #[error("invalid node mask `{pattern}`: {message}")]
    InvalidMask {
        /// The pattern as written in the manifest.
        pattern: String,
        /// Regex compile diagnostic.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = ConfigError::Parse {
            path: PathBuf::from("/p/.enb/enb-make.js"),
            message: "expected value at line 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse rule file /p/.enb/enb-make.js: expected value at line 1"
        );
    }

    #[test]
    fn invalid_mask_display() {
        let err = ConfigError::InvalidMask {
            pattern: "[".into(),
            message: "unclosed character class".into(),
        };
        assert!(err.to_string().contains("invalid node mask `[`"));
    }
}
