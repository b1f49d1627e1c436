//! P&ID context records emitted by the diagram page strategy.

use serde::{Deserialize, Serialize};

/// Classification context for one diagram-like page.
///
/// Collected per page during block parsing and written both to the
/// per-page context CSV under `pid_context/` and into the document
/// summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PidContext {
    /// 1-based page number.
    pub page: u32,
    /// Whether the page classified as diagram-like.
    pub pid_like: bool,
    /// Drawing reference code found on the page, e.g. `PID/0001-PR-002`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_reference: Option<String>,
    /// First note line found on the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_note: Option<String>,
    /// Page-rule override that decided the classification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Distinct matched strings supporting the classification, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl PidContext {
    /// Evidence strings flattened for CSV cells.
    pub fn evidence_joined(&self) -> String {
        self.evidence.join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_joined() {
        let ctx = PidContext {
            page: 4,
            pid_like: true,
            evidence: vec!["DIAGRAMA".into(), "PID/0001-PR-002".into()],
            ..Default::default()
        };
        assert_eq!(ctx.evidence_joined(), "DIAGRAMA;PID/0001-PR-002");
    }

    #[test]
    fn test_optional_fields_skipped() {
        let ctx = PidContext {
            page: 2,
            pid_like: false,
            ..Default::default()
        };
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("pid_reference"));
        assert!(!json.contains("evidence"));
    }
}
