use chrono::NaiveDate;
use glucoview::api::auth::decode_login_response;
use glucoview::api::glucose::decode_glucose_response;
use glucoview::api::Credentials;
use glucoview::error::FetchError;
use glucoview::logging::redact_bearer;
use glucoview::{GlucoseBand, GlucosePipeline, GlucoseState, Action, WindowSelector};

/// Wire contract of the habits API, decoded without a server

const DAY_RESPONSE: &str = r#"{
  "code": 200,
  "message": "Glucose data retrieved",
  "success": true,
  "data": {
    "data": [
      {"source":"libre","date":"2025-01-09T14:00:00.000Z","dateUnix":1736431200,"value":96,
       "historic":false,"isSpike":false,"averaged":true,"isPickLow":false},
      {"source":"libre","date":"2025-01-09T14:15:00.000Z","dateUnix":1736432100,"value":104,
       "historic":false,"isSpike":false,"averaged":true,"isPickLow":false}
    ],
    "spikes": [
      {"source":"libre","date":"2025-01-09T15:00:00.000Z","dateUnix":1736434800,"value":212,
       "historic":false,"isSpike":true,"averaged":false,"isPickLow":false}
    ],
    "isPickLow": [],
    "glucoseSources": ["libre", "dexcom"],
    "glucoseSourceChoosed": "libre",
    "score": [{"date":"2025-01-09","unixDate":1736380800,"value":82}],
    "events": [{"type":"meal"}],
    "timezone": "Europe/Madrid",
    "maxGlucose": 212
  },
  "i18n": "es",
  "global": {"es": "Datos obtenidos"}
}"#;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
}

#[test]
fn test_day_response_feeds_pipeline() {
    let series = decode_glucose_response(date(), 200, DAY_RESPONSE).unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series.source_label, "libre");
    assert_eq!(series.glucose_sources.len(), 2);
    assert_eq!(series.max_glucose, 212.0);

    let state = GlucoseState::new(date())
        .reduce(Action::SetWindow(WindowSelector::Custom(date())))
        .reduce(Action::FetchStarted);
    let generation = state.generation;
    let state = state.reduce(Action::FetchSucceeded {
        generation,
        date: date(),
        series,
    });
    assert_eq!(state.timezone, "Europe/Madrid");
    assert_eq!(state.glucose_source, "libre");

    let now = chrono::Utc::now();
    let view = GlucosePipeline::default().render(&state, now, None);
    assert_eq!(view.points.len(), 3);
    assert_eq!(view.points[2].band, GlucoseBand::High);
    assert_eq!(view.stats.spike_count, 1);
    assert_eq!(view.stats.average, 137);
}

#[test]
fn test_error_statuses() {
    assert!(matches!(
        decode_glucose_response(date(), 401, r#"{"message":"jwt expired"}"#),
        Err(FetchError::Unauthorized)
    ));
    assert!(matches!(
        decode_glucose_response(date(), 404, ""),
        Err(FetchError::NoDataForDay { date: d }) if d == date()
    ));

    match decode_glucose_response(date(), 502, r#"{"message":"Bad gateway upstream"}"#) {
        Err(FetchError::NetworkOrServer { status, message }) => {
            assert_eq!(status, Some(502));
            assert_eq!(message, "Bad gateway upstream");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_login_contract() {
    let body = r#"{"_id":"u-42","user":"ana","email":"ana@example.com","surveyStart":false,"token":"Bearer abc.def.ghi"}"#;
    let session = decode_login_response(200, body).unwrap();
    let credentials = session.credentials().unwrap();
    assert_eq!(credentials.user_id, "u-42");
    assert_eq!(credentials.authorization(), "Bearer abc.def.ghi");
}

#[test]
fn test_no_fallback_credential() {
    let err = Credentials::from_parts(None, None).unwrap_err();
    assert!(err.is_unauthorized());
}

#[test]
fn test_authorization_is_redacted() {
    let credentials =
        Credentials::from_parts(Some("eyJhbGciOiJIUzI1NiJ9.payload.sig".into()), Some("u".into()))
            .unwrap();
    let logged = redact_bearer(&credentials.authorization());
    assert!(logged.starts_with("Bearer ****"));
    assert!(!logged.contains("payload"));
}
