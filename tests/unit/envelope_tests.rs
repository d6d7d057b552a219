use pixel_streaming_launcher::models::envelope::Envelope;
use pixel_streaming_launcher::models::session::{Session, SessionStatus};
use pixel_streaming_launcher::AppError;

#[test]
fn ok_envelope_yields_payload() {
    let envelope: Envelope<String> =
        serde_json::from_str(r#"{"status":"ok","payload":"token-1"}"#).expect("parse");

    assert_eq!(envelope.into_result(200).expect("ok"), Some("token-1".into()));
}

#[test]
fn data_is_accepted_in_place_of_payload() {
    let envelope: Envelope<Session> = serde_json::from_str(
        r#"{"status":"ok","data":{"id":"7d3f0c1e-2b7a-4a55-9d1c-3f3c2f1b0a01","status":"running"}}"#,
    )
    .expect("parse");

    let session = envelope.into_result(200).expect("ok").expect("session");
    assert_eq!(session.status, SessionStatus::Running);
    assert!(session.is_assigned());
}

#[test]
fn error_envelope_carries_status_and_message() {
    let envelope: Envelope<String> =
        serde_json::from_str(r#"{"status":"error","message":"session not found"}"#)
            .expect("parse");

    let err = envelope.into_result(404).expect_err("error envelope");

    assert!(matches!(
        err,
        AppError::Api { status: 404, ref message } if message == "session not found"
    ));
    assert_eq!(err.to_string(), "api error 404: session not found");
}

#[test]
fn unknown_status_with_message_is_an_error() {
    let envelope: Envelope<String> =
        serde_json::from_str(r#"{"status":"fail","message":"bad"}"#).expect("parse");

    assert!(envelope.into_result(500).is_err());
}

#[test]
fn missing_payload_is_none() {
    let envelope: Envelope<Session> = serde_json::from_str(r#"{"status":"ok"}"#).expect("parse");

    assert_eq!(envelope.into_result(200).expect("ok"), None);
}
