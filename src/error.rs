use thiserror::Error;

use crate::model::NormalizationReport;

pub const MSG_PARSE: &str = "Error parsing XML";
pub const MSG_PLAYER_NOT_FOUND: &str = "Player not found";
pub const MSG_NO_DATA: &str = "No data available";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML near byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("document has no ALL_INSTANCES element")]
    MissingInstances,
    #[error("instance {instance}: missing required `{field}`")]
    MissingField { instance: String, field: &'static str },
    #[error("instance {instance}: `{field}` is not a number ({value:?})")]
    InvalidNumber {
        instance: String,
        field: String,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("no usable events after filtering ({} rows rejected)", report.rejected_total())]
    NoUsableEvents { report: NormalizationReport },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsufficientDataError {
    #[error("player `{player}` not found")]
    PlayerNotFound { player: String },
    #[error("no qualifying events for {selection}")]
    NoData { selection: String },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),
}

impl InsufficientDataError {
    pub fn user_message(&self) -> &'static str {
        match self {
            InsufficientDataError::PlayerNotFound { .. } => MSG_PLAYER_NOT_FOUND,
            InsufficientDataError::NoData { .. } => MSG_NO_DATA,
        }
    }
}

impl ReportError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ReportError::Parse(_) => MSG_PARSE,
            ReportError::Normalization(_) => MSG_NO_DATA,
            ReportError::InsufficientData(err) => err.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_match_documented_strings() {
        let parse = ReportError::from(ParseError::MissingInstances);
        assert_eq!(parse.user_message(), "Error parsing XML");

        let missing = ReportError::from(InsufficientDataError::PlayerNotFound {
            player: "Nobody".to_string(),
        });
        assert_eq!(missing.user_message(), "Player not found");

        let empty = ReportError::from(InsufficientDataError::NoData {
            selection: "team Test FC".to_string(),
        });
        assert_eq!(empty.user_message(), "No data available");
    }

    #[test]
    fn missing_field_names_the_instance() {
        let err = ParseError::MissingField {
            instance: "42".to_string(),
            field: "Team",
        };
        let text = err.to_string();
        assert!(text.contains("42"));
        assert!(text.contains("Team"));
    }
}
