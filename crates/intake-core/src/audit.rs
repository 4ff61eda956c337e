//! Append-only audit trail. Writes are best-effort: the orchestrator logs
//! and swallows sink failures so an audit outage never rolls back an intake.

use crate::storage::Store;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub study_id: Option<String>,
    pub participant_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub detail: Value,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, record: AuditRecord) -> anyhow::Result<()>;
}

/// Default sink: the `audit_logs` table next to everything else.
pub struct StoreAuditSink {
    store: Store,
}

impl StoreAuditSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn emit(&self, record: AuditRecord) -> anyhow::Result<()> {
        self.store.insert_audit(
            record.study_id.as_deref(),
            record.participant_id.as_deref(),
            &record.action,
            &record.entity_type,
            record.entity_id,
            &record.detail,
        )
    }
}
