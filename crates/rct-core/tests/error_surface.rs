use rct_core::errors::{ErrorInfo, RctError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("arm", 1)
        .with_context("reason", "example")
}

#[test]
fn weights_error_surface() {
    let err = RctError::Weights(sample_info("W001", "sum exceeds one"));
    assert_eq!(err.code(), "W001");
    assert!(err.info().context.contains_key("arm"));
}

#[test]
fn assignment_error_surface() {
    let err = RctError::Assignment(sample_info("A001", "unknown unit"));
    assert_eq!(err.info().code, "A001");
    assert_eq!(err.info().context["reason"], "example");
}

#[test]
fn balance_error_surface() {
    let err = RctError::Balance(sample_info("B001", "singular covariance").with_hint("drop a column"));
    let rendered = err.to_string();
    assert!(rendered.starts_with("balance error: singular covariance (code: B001)"));
    assert!(rendered.contains("arm=1"));
    assert!(rendered.ends_with("hint: drop a column"));
}

#[test]
fn errors_round_trip_json() {
    let err = RctError::Search(sample_info("S001", "empty quantile"));
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Search\""));
    let decoded: RctError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}
