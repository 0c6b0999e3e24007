//! Unit tests for `AppError` display format and conversions.

use nexus_research::AppError;

#[test]
fn display_carries_kind_prefix() {
    let cases = [
        (AppError::InvalidInput("topic is empty".into()), "invalid input: topic is empty"),
        (AppError::NoActiveSession("s1".into()), "no active session: s1"),
        (AppError::SessionBusy("s1".into()), "session busy: s1"),
        (
            AppError::WorkflowAlreadyComplete("s1".into()),
            "workflow already complete: s1",
        ),
        (AppError::Upstream("timeout".into()), "upstream: timeout"),
        (AppError::Render("no output".into()), "render: no output"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn same_detail_different_kind_is_distinguishable() {
    let stage = AppError::Stage("connection dropped".into());
    let upstream = AppError::Upstream("connection dropped".into());
    assert_ne!(stage.to_string(), upstream.to_string());
}

#[test]
fn toml_error_converts_to_config() {
    let parse_err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    let err: AppError = parse_err.into();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn json_error_converts_to_db() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
    let err: AppError = parse_err.into();
    assert!(matches!(err, AppError::Db(_)));
    assert!(err.to_string().contains("checkpoint serialization"));
}

#[test]
fn io_error_converts_to_io() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert_eq!(err.to_string(), "io: gone");
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Config("x".into()));
}
