//! Unified error type for the ozon-bot.

use std::error::Error as StdError;

use thiserror::Error;

/// `err` followed by each cause in its `source()` chain, skipping causes
/// whose text is already present. Keeps DNS/TLS/socket detail that
/// transport errors only expose as sources.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }
    message
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Ozon API error (status={status}): {message}")]
    OzonApi { status: u16, message: String },

    #[error("Google Sheets API error (status={status}): {message}")]
    SheetsApi { status: u16, message: String },

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transport failure with its full cause chain.
    pub fn http(err: &(dyn StdError + 'static)) -> Self {
        Error::Http(error_chain(err))
    }

    /// True for transport failures and non-success upstream responses.
    ///
    /// These are recoverable for the current cycle: the caller reports them
    /// to the operator and carries on.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::OzonApi { .. } | Error::SheetsApi { .. } | Error::Auth(_)
        )
    }

    /// Short operator-facing description, without response bodies.
    pub fn short_message(&self) -> String {
        match self {
            Error::Http(_) => "marketplace or ledger is unreachable".to_string(),
            Error::OzonApi { status, .. } => format!("Ozon API answered with status {status}"),
            Error::SheetsApi { status, .. } => {
                format!("unit-economics sheet answered with status {status}")
            }
            Error::Auth(_) => "upstream authentication failed".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(Error::Http("timeout".into()).is_upstream());
        assert!(Error::OzonApi {
            status: 500,
            message: "boom".into()
        }
        .is_upstream());
        assert!(Error::SheetsApi {
            status: 403,
            message: "denied".into()
        }
        .is_upstream());
        assert!(!Error::Config("bad".into()).is_upstream());
        assert!(!Error::Other("x".into()).is_upstream());
    }

    #[derive(Debug)]
    struct Layer {
        text: &'static str,
        cause: Option<Box<Layer>>,
    }

    impl std::fmt::Display for Layer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.text)
        }
    }

    impl StdError for Layer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn test_error_chain_appends_new_causes() {
        let err = Layer {
            text: "error sending request",
            cause: Some(Box::new(Layer {
                text: "request",
                cause: Some(Box::new(Layer {
                    text: "dns error: no such host",
                    cause: None,
                })),
            })),
        };
        assert_eq!(
            error_chain(&err),
            "error sending request: dns error: no such host"
        );
        assert!(matches!(Error::http(&err), Error::Http(m) if m.contains("dns error")));
    }

    #[test]
    fn test_short_message_hides_body() {
        let err = Error::OzonApi {
            status: 502,
            message: "<html>very long gateway page</html>".into(),
        };
        let msg = err.short_message();
        assert!(msg.contains("502"));
        assert!(!msg.contains("html"));
    }
}
