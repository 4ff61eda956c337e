//! The intake pipeline: orchestration of validation, computation, rule
//! evaluation and persistence for one submission, plus the read-side
//! assembler and the thin admin create operations.

mod admin;
mod intake;
mod result;

use crate::audit::{AuditSink, StoreAuditSink};
use crate::model::{FormSubmission, ParticipantAssignment, RuleEvaluation};
use crate::storage::Store;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct IntakeRequest {
    pub form_template_id: i64,
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Response envelope shared by intake submission and result lookup.
#[derive(Debug, Serialize)]
pub struct IntakeEnvelope {
    pub submission: FormSubmission,
    pub answers: Value,
    pub computed: Map<String, Value>,
    pub rule_evaluations: Vec<RuleEvaluation>,
    pub assignments: Vec<ParticipantAssignment>,
    pub schedule_plan: Option<Value>,
}

pub struct IntakeService {
    store: Store,
    audit: Arc<dyn AuditSink>,
}

impl IntakeService {
    pub fn new(store: Store, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Store-backed service with the default audit sink.
    pub fn with_store(store: Store) -> Self {
        let audit = Arc::new(StoreAuditSink::new(store.clone()));
        Self::new(store, audit)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
