use serde_json::json;
use shelfscope::gateway::{GatewayError, SqlGuardrailViolation};
use shelfscope::metrics::MetricsError;
use shelfscope::models::{QUERY_ENVELOPE_SCHEMA_VERSION, QueryEnvelope, QueryEnvelopeCommandFailure};

#[test]
fn ok_envelope_tracks_contract_fields() {
    let envelope = QueryEnvelope::ok("query", json!({"rows": [{"brand": "Puma"}]}))
        .with_meta("row_count", json!(1))
        .with_warning("row_cap_exceeded", "result truncated to 1 rows")
        .with_warning_details(json!({"row_cap": 1}));

    assert!(envelope.ok);
    assert_eq!(envelope.command, "query");
    assert!(envelope.generated_at_utc.ends_with('Z'));
    assert_eq!(
        envelope.meta.get("schema_version"),
        Some(&json!(QUERY_ENVELOPE_SCHEMA_VERSION))
    );
    assert_eq!(envelope.meta.get("row_count"), Some(&json!(1)));
    assert_eq!(envelope.warnings.len(), 1);
    assert_eq!(
        envelope.warnings[0].details.as_ref(),
        Some(&json!({"row_cap": 1}))
    );
    assert!(envelope.error.is_none());
}

#[test]
fn ok_envelope_omits_error_field() {
    let encoded = serde_json::to_value(QueryEnvelope::ok("brands", json!({"brands": []})))
        .expect("envelope should serialize");
    let object = encoded.as_object().expect("envelope JSON should be object");

    assert_eq!(object.get("ok"), Some(&json!(true)));
    assert!(object.contains_key("generated_at_utc"));
    assert!(object.contains_key("warnings"));
    assert!(!object.contains_key("error"));
}

#[test]
fn guardrail_rejection_maps_to_error_envelope() {
    let error = GatewayError::Rejected(SqlGuardrailViolation {
        message: "Mutating SQL keyword `delete` is not allowed".to_string(),
        details: json!({"violation": {"reason": "mutating_statement"}}),
    });
    let envelope = QueryEnvelope::from_gateway_error("query", &error);

    assert!(!envelope.ok);
    assert!(envelope.data.is_none());
    let payload = envelope.error.expect("error payload should be present");
    assert_eq!(payload.code, "sql_guardrail_violation");
    assert_eq!(
        payload.details,
        Some(json!({"violation": {"reason": "mutating_statement"}}))
    );
}

#[test]
fn metrics_failure_names_the_query_and_keeps_partial_data() {
    let failure = MetricsError {
        query: "price_buckets",
        source: GatewayError::Execution {
            cause: "no such column: price".to_string(),
        },
    };
    let envelope = QueryEnvelope::from_metrics_error("dashboard", &failure)
        .with_data(json!({"report": {"kpis": {"products": 3}}}));

    assert!(!envelope.ok);
    assert_eq!(envelope.meta.get("failed_query"), Some(&json!("price_buckets")));
    assert_eq!(
        envelope.error.as_ref().map(|error| error.code.as_str()),
        Some("query_execution_failed")
    );
    assert!(envelope.data.is_some());
}

#[test]
fn command_failure_downcasts_and_displays_as_json() {
    let error = QueryEnvelope::error("brands", "catalog_unavailable", "unable to open catalog")
        .into_failure();
    let failure = error
        .downcast_ref::<QueryEnvelopeCommandFailure>()
        .expect("failure should carry its envelope");

    assert_eq!(failure.envelope().command, "brands");
    let decoded: serde_json::Value =
        serde_json::from_str(&error.to_string()).expect("display should be JSON");
    assert_eq!(decoded["error"]["code"], "catalog_unavailable");
}
