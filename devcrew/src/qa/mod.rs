//! Live functional QA against the generated application.
//!
//! The tester model turns the architect's test list into JSON test cases.
//! The app is served as a subprocess, polled until it answers, and the
//! cases run against it one by one. Results are text for the operator;
//! a failing case never fails the pipeline.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::fenced_block;

pub mod runner;
pub mod server;

pub use runner::run_cases;
pub use server::{AppServer, ReadyEndpoint, server_argv, wait_for_endpoint};

/// One HTTP check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub endpoint: String,
    pub method: String,
    pub expected_status: u16,
    #[serde(default)]
    pub json_payload: Option<Value>,
    /// `None` skips the body comparison.
    #[serde(default)]
    pub expected_response: Option<Value>,
}

/// Parse the tester's reply into test cases.
///
/// Accepts a bare JSON array, an array inside a fenced block, or an array
/// surrounded by prose.
pub fn parse_test_cases(reply: &str) -> Result<Vec<TestCase>> {
    let body = fenced_block(reply).unwrap_or_else(|| reply.to_string());
    let start = body.find('[').context("no JSON array in tester reply")?;
    let end = body.rfind(']').context("unterminated JSON array in tester reply")?;
    if end < start {
        anyhow::bail!("malformed JSON array in tester reply");
    }
    let cases: Vec<TestCase> =
        serde_json::from_str(&body[start..=end]).context("tester reply is not valid test-case JSON")?;
    if cases.is_empty() {
        anyhow::bail!("tester returned no test cases");
    }
    Ok(cases)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub case: TestCase,
    pub passed: bool,
    /// `PASS: ...` or `FAIL: ...` with details.
    pub line: String,
}

/// What QA found. Rendered for the operator via `Display`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QaReport {
    pub outcomes: Vec<CaseOutcome>,
    /// Cases skipped after the first failure.
    pub not_run: usize,
    /// Set when QA could not run at all (server did not start, bad JSON).
    pub aborted: Option<String>,
}

impl QaReport {
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self {
            aborted: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// True when QA ran and every case passed.
    pub fn all_passed(&self) -> bool {
        self.aborted.is_none() && self.failed() == 0 && self.not_run == 0
    }
}

impl fmt::Display for QaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.aborted {
            return write!(f, "QA did not run: {reason}");
        }
        for o in &self.outcomes {
            writeln!(f, "{}", o.line)?;
        }
        write!(
            f,
            "{} passed, {} failed, {} not run",
            self.passed(),
            self.failed(),
            self.not_run
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fenced_array() {
        let reply = r#"Here are the cases:
```json
[
  {"endpoint": "/todos", "method": "GET", "expected_status": 200, "json_payload": null, "expected_response": []},
  {"endpoint": "/todos", "method": "POST", "expected_status": 200, "json_payload": {"task": "x"}}
]
```"#;
        let cases = parse_test_cases(reply).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected_response, Some(json!([])));
        assert_eq!(cases[1].json_payload, Some(json!({"task": "x"})));
        assert_eq!(cases[1].expected_response, None);
    }

    #[test]
    fn parses_array_in_prose() {
        let reply = "Sure. [{\"endpoint\":\"/\",\"method\":\"GET\",\"expected_status\":200}] Done.";
        let cases = parse_test_cases(reply).unwrap();
        assert_eq!(cases[0].endpoint, "/");
        assert_eq!(cases[0].json_payload, None);
    }

    #[test]
    fn rejects_non_json_and_empty() {
        assert!(parse_test_cases("all good, ship it").is_err());
        assert!(parse_test_cases("[]").is_err());
        assert!(parse_test_cases("[{\"endpoint\": 1}]").is_err());
    }

    #[test]
    fn report_summary_counts() {
        let case = TestCase {
            endpoint: "/".into(),
            method: "GET".into(),
            expected_status: 200,
            json_payload: None,
            expected_response: None,
        };
        let report = QaReport {
            outcomes: vec![
                CaseOutcome { case: case.clone(), passed: true, line: "PASS: GET /".into() },
                CaseOutcome { case, passed: false, line: "FAIL: GET /".into() },
            ],
            not_run: 2,
            aborted: None,
        };
        assert!(!report.all_passed());
        assert_eq!(report.to_string(), "PASS: GET /\nFAIL: GET /\n1 passed, 1 failed, 2 not run");
        assert_eq!(QaReport::aborted("boom").to_string(), "QA did not run: boom");
    }
}
