//! Executes test cases against a ready server.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use super::server::ReadyEndpoint;
use super::{CaseOutcome, QaReport, TestCase};

/// Run `cases` in order, stopping at the first failure.
pub async fn run_cases(
    http: &reqwest::Client,
    endpoint: &ReadyEndpoint,
    cases: &[TestCase],
    request_timeout: Duration,
) -> QaReport {
    let mut report = QaReport::default();
    for (i, case) in cases.iter().enumerate() {
        let outcome = run_case(http, endpoint, case, request_timeout).await;
        tracing::info!(
            method = %case.method,
            endpoint = %case.endpoint,
            passed = outcome.passed,
            "QA case"
        );
        let failed = !outcome.passed;
        report.outcomes.push(outcome);
        if failed {
            report.not_run = cases.len() - i - 1;
            break;
        }
    }
    report
}

async fn run_case(
    http: &reqwest::Client,
    endpoint: &ReadyEndpoint,
    case: &TestCase,
    request_timeout: Duration,
) -> CaseOutcome {
    let label = format!("{} {}", case.method.to_uppercase(), case.endpoint);
    let fail = |detail: String| CaseOutcome {
        case: case.clone(),
        passed: false,
        line: format!("FAIL: {label}{detail}"),
    };

    let method = match Method::from_bytes(case.method.trim().to_uppercase().as_bytes()) {
        Ok(m) => m,
        Err(_) => return fail(format!(" - invalid HTTP method '{}'", case.method)),
    };

    let mut req = http
        .request(method, endpoint.url(&case.endpoint))
        .timeout(request_timeout);
    if let Some(payload) = &case.json_payload {
        req = req.json(payload);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => return fail(format!(" - Request Error: {e}")),
    };

    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();

    let status_match = status == case.expected_status;
    let body_match = match &case.expected_response {
        None => true,
        Some(expected) => serde_json::from_str::<Value>(&body)
            .map(|got| &got == expected)
            .unwrap_or(false),
    };

    if status_match && body_match {
        return CaseOutcome {
            case: case.clone(),
            passed: true,
            line: format!("PASS: {label}"),
        };
    }

    let expected_body = case
        .expected_response
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_else(|| "(any)".to_string());
    fail(format!(
        "\n  - Expected Status: {}, Got: {status}\n  - Expected Response: {expected_body}, Got: {body}",
        case.expected_status
    ))
}
