use serde::{Deserialize, Serialize};
use std::fmt;

/// A reason code with the phrase shown to users.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ReasonCode {
    pub code: &'static str,
    pub message: &'static str,
}

/// Accepted `no_autobump` reason codes.
pub const NO_AUTOBUMP_REASONS: &[ReasonCode] = &[
    ReasonCode {
        code: "incompatible_version_format",
        message: "incompatible version format",
    },
    ReasonCode {
        code: "bumped_by_upstream",
        message: "bumped by upstream",
    },
];

/// Preset reasons for deprecating or disabling a cask.
pub const LIFECYCLE_REASONS: &[ReasonCode] = &[
    ReasonCode {
        code: "discontinued",
        message: "is discontinued upstream",
    },
    ReasonCode {
        code: "moved_to_mas",
        message: "is now exclusively distributed on the Mac App Store",
    },
    ReasonCode {
        code: "no_longer_available",
        message: "is no longer available upstream",
    },
    ReasonCode {
        code: "no_longer_meets_criteria",
        message: "no longer meets the criteria for acceptable casks",
    },
    ReasonCode {
        code: "unmaintained",
        message: "is not maintained upstream",
    },
    ReasonCode {
        code: "unsigned",
        message: "is unsigned or does not meet signature requirements",
    },
    ReasonCode {
        code: "fails_gatekeeper_check",
        message: "does not pass the macOS Gatekeeper check",
    },
];

pub fn find_reason<'a>(table: &'a [ReasonCode], code: &str) -> Option<&'a ReasonCode> {
    table.iter().find(|r| r.code == code)
}

/// Either a symbolic reason code or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reason {
    Code { code: String },
    Text(String),
}

impl Reason {
    pub fn code(code: impl Into<String>) -> Self {
        Reason::Code { code: code.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Reason::Text(text.into())
    }

    /// Human phrase for this reason: the table message for a known code, the
    /// code itself otherwise, and free text verbatim.
    pub fn describe(&self, table: &[ReasonCode]) -> String {
        match self {
            Reason::Code { code } => find_reason(table, code)
                .map_or_else(|| code.clone(), |r| r.message.to_owned()),
            Reason::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Code { code } => f.write_str(code),
            Reason::Text(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_codes_are_unique() {
        for table in [NO_AUTOBUMP_REASONS, LIFECYCLE_REASONS] {
            let mut codes: Vec<&str> = table.iter().map(|r| r.code).collect();
            codes.sort_unstable();
            codes.dedup();
            assert_eq!(codes.len(), table.len());
        }
    }

    #[test]
    fn find_reason_by_code() {
        assert!(find_reason(NO_AUTOBUMP_REASONS, "bumped_by_upstream").is_some());
        assert!(find_reason(NO_AUTOBUMP_REASONS, "nonexistent").is_none());
    }

    #[test]
    fn reason_deserializes_code_or_text() {
        let code: Reason = serde_json::from_str(r#"{"code": "discontinued"}"#).unwrap();
        assert_eq!(code, Reason::code("discontinued"));
        let text: Reason = serde_json::from_str(r#""is broken""#).unwrap();
        assert_eq!(text, Reason::text("is broken"));
    }

    #[test]
    fn describe_uses_table_message() {
        assert_eq!(
            Reason::code("discontinued").describe(LIFECYCLE_REASONS),
            "is discontinued upstream"
        );
        assert_eq!(Reason::code("custom").describe(LIFECYCLE_REASONS), "custom");
        assert_eq!(Reason::text("is broken").describe(LIFECYCLE_REASONS), "is broken");
    }
}
