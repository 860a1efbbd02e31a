use agent_ensemble::AppError;

#[test]
fn display_prefixes_category() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Backend("start failed".into()), "backend: start failed"),
        (AppError::Protocol("line too long".into()), "protocol: line too long"),
        (AppError::Precondition("no active project".into()), "precondition: no active project"),
        (AppError::InvalidTransition("done -> working".into()), "invalid transition: done -> working"),
        (AppError::NotFound("session s1".into()), "not found: session s1"),
        (AppError::Subscription("closed".into()), "subscription: closed"),
        (AppError::Io("broken pipe".into()), "io: broken pipe"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_errors_convert() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into();

    assert!(matches!(err, AppError::Io(ref msg) if msg == "pipe closed"));
}

#[test]
fn toml_errors_convert_to_config() {
    let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();

    let err: AppError = toml_err.into();

    assert!(matches!(err, AppError::Config(_)));
}
