pub mod query_envelope;

pub use query_envelope::{
    QUERY_ENVELOPE_SCHEMA_VERSION, QueryEnvelope, QueryEnvelopeCommandFailure, QueryEnvelopeError,
    QueryEnvelopeWarning,
};
