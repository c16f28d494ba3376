use bifrost::{BifrostError, Result};

#[test]
fn test_error_display() {
    let err = BifrostError::AdapterNotFound("weather-api".to_string());
    assert_eq!(err.to_string(), "Adapter 'weather-api' not found");
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(BifrostError::InvalidInput("bad".into()))
    }
    assert!(returns_error().is_err());
}

#[test]
fn json_errors_convert() {
    let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
    let err: BifrostError = parse.unwrap_err().into();
    assert!(matches!(err, BifrostError::Json(_)));
}

// ============================================================================
// Status and code accessors
// ============================================================================

#[test]
fn status_is_known_for_upstream_and_not_found() {
    let upstream = BifrostError::Upstream {
        status: 502,
        message: "Request failed with status code 502".into(),
        body: None,
    };
    assert_eq!(upstream.status(), Some(502));
    assert_eq!(BifrostError::AdapterNotFound("x".into()).status(), Some(404));
    assert_eq!(BifrostError::Configuration("x".into()).status(), None);
}

#[test]
fn transport_code() {
    let err = BifrostError::Transport {
        code: "ECONNRESET".into(),
        message: "socket hang up".into(),
    };
    assert_eq!(err.code(), Some("ECONNRESET"));
    assert_eq!(BifrostError::InvalidInput("x".into()).code(), None);
}

#[test]
fn timeout_detection() {
    let by_code = BifrostError::Transport {
        code: "ECONNABORTED".into(),
        message: "aborted".into(),
    };
    let by_message = BifrostError::Transport {
        code: "EREQUEST".into(),
        message: "timeout of 100ms exceeded".into(),
    };
    let neither = BifrostError::Transport {
        code: "ECONNREFUSED".into(),
        message: "connection refused".into(),
    };
    assert!(by_code.is_timeout());
    assert!(by_message.is_timeout());
    assert!(!neither.is_timeout());
}
