//! Error types for the prefix manager node.

use prefixmgr_core::CoreError;

/// Errors that can occur during node operation.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rejected: {0}")]
    Core(#[from] CoreError),
    #[error("prefix manager is not running")]
    ChannelClosed,
    #[error("node already running")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefixmgr_core::SourceType;

    #[test]
    fn display_messages() {
        assert_eq!(
            NodeError::Config("no areas".into()).to_string(),
            "configuration error: no areas"
        );
        assert_eq!(
            NodeError::ChannelClosed.to_string(),
            "prefix manager is not running"
        );
        assert_eq!(NodeError::AlreadyRunning.to_string(), "node already running");
    }

    #[test]
    fn from_core_error() {
        let err: NodeError = CoreError::SourceTypeMismatch {
            prefix: "10.0.0.0/8".into(),
            expected: SourceType::Bgp,
            actual: SourceType::Vip,
        }
        .into();
        assert!(matches!(err, NodeError::Core(_)));
        assert_eq!(
            err.to_string(),
            "rejected: entry for 10.0.0.0/8 has source type VIP, expected BGP"
        );
    }

    #[test]
    fn from_io_error() {
        let err: NodeError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, NodeError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
