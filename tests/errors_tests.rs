use std::error::Error;
use tldr::errors::BotError;

#[test]
fn test_bot_error_implements_error_trait() {
    fn assert_error<T: Error + Send + Sync + 'static>(_: &T) {}

    let error = BotError::ParseError("test error".to_string());
    assert_error(&error);
}

#[test]
fn test_bot_error_display() {
    let error = BotError::ApiError("chat not found".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to access Telegram API: chat not found"
    );

    let error = BotError::OpenAIError("Model unavailable".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to access OpenAI API: Model unavailable"
    );

    let error = BotError::GeminiError("HTTP 403: API key not valid".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to access Gemini API: HTTP 403: API key not valid"
    );

    let error = BotError::StorageError("disk full".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to persist message buffers: disk full"
    );

    let error = BotError::Timeout(120);
    assert_eq!(
        format!("{error}"),
        "Timed out after 120s waiting for the summarizer"
    );
}

#[test]
fn test_bot_error_from_conversions() {
    let err = anyhow::anyhow!("test error");
    match BotError::from(err) {
        BotError::GeneralError(msg) => assert_eq!(msg, "test error"),
        other => panic!("Unexpected error type: {other:?}"),
    }

    let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
    match BotError::from(err) {
        BotError::StorageError(msg) => assert!(msg.contains("read-only volume")),
        other => panic!("Unexpected error type: {other:?}"),
    }

    let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    assert!(matches!(BotError::from(err), BotError::ParseError(_)));

    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_reqwest_conversion(err: reqwest::Error) -> BotError {
        BotError::from(err)
    }
}
