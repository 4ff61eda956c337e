use crate::model::{
    ComputeDefinition, ComputedValue, EntityStatus, FieldType, FormField, FormLogic,
    FormSubmission, FormTemplate, ParticipantAssignment, RuleEvaluation, RuleSet, RuleType,
    SchedulePlan,
};
use anyhow::Context;
use rusqlite::{params, Connection, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed store. All engine state lives here; rows with structured
/// payloads keep them as JSON text columns.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

/// Rows produced by the transactional rule-phase write.
#[derive(Debug)]
pub struct RulePhaseRows {
    pub evaluations: Vec<RuleEvaluation>,
    pub assignments: Vec<ParticipantAssignment>,
    pub schedule_plan: Option<SchedulePlan>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // --- Form templates & fields ---

    pub fn insert_form_template(
        &self,
        study_id: &str,
        name: &str,
        version: i64,
        status: EntityStatus,
    ) -> anyhow::Result<FormTemplate> {
        let created_at = now_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO form_templates(study_id, name, version, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![study_id, name, version, status.as_str(), created_at],
        )?;
        Ok(FormTemplate {
            id: conn.last_insert_rowid(),
            study_id: study_id.to_string(),
            name: name.to_string(),
            version,
            status,
            created_at,
        })
    }

    pub fn get_form_template(
        &self,
        id: i64,
        study_id: &str,
    ) -> anyhow::Result<Option<FormTemplate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, study_id, name, version, status, created_at
             FROM form_templates WHERE id = ?1 AND study_id = ?2",
        )?;
        let mut rows = stmt.query(params![id, study_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(template_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn insert_form_field(
        &self,
        form_template_id: i64,
        key: &str,
        label: &str,
        field_type: FieldType,
        required: bool,
        options: Option<&Value>,
        validation: Option<&Value>,
        order_index: i64,
    ) -> anyhow::Result<FormField> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO form_fields(form_template_id, key, label, type, required, options, validation, order_index)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                form_template_id,
                key,
                label,
                field_type.as_str(),
                required,
                options.map(to_json_text).transpose()?,
                validation.map(to_json_text).transpose()?,
                order_index
            ],
        )?;
        Ok(FormField {
            id: conn.last_insert_rowid(),
            form_template_id,
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            required,
            options: options.cloned(),
            validation: validation.cloned(),
            order_index,
        })
    }

    pub fn field_key_exists(&self, form_template_id: i64, key: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM form_fields WHERE form_template_id = ?1 AND key = ?2",
            params![form_template_id, key],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn list_fields(&self, form_template_id: i64) -> anyhow::Result<Vec<FormField>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, form_template_id, key, label, type, required, options, validation, order_index
             FROM form_fields WHERE form_template_id = ?1
             ORDER BY order_index ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![form_template_id], field_from_row)?;
        collect(rows)
    }

    pub fn insert_form_logic(
        &self,
        form_template_id: i64,
        logic: &Value,
        order_index: i64,
    ) -> anyhow::Result<FormLogic> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO form_logic(form_template_id, logic, order_index) VALUES (?1, ?2, ?3)",
            params![form_template_id, to_json_text(logic)?, order_index],
        )?;
        Ok(FormLogic {
            id: conn.last_insert_rowid(),
            form_template_id,
            logic: logic.clone(),
            order_index,
        })
    }

    // --- Compute definitions & rule sets ---

    pub fn insert_compute_definition(
        &self,
        study_id: &str,
        key: &str,
        value_type: &str,
        definition: &Value,
        version: i64,
        status: EntityStatus,
    ) -> anyhow::Result<ComputeDefinition> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO compute_definitions(study_id, key, type, definition, version, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                study_id,
                key,
                value_type,
                to_json_text(definition)?,
                version,
                status.as_str()
            ],
        )?;
        Ok(ComputeDefinition {
            id: conn.last_insert_rowid(),
            study_id: study_id.to_string(),
            key: key.to_string(),
            value_type: value_type.to_string(),
            definition: definition.clone(),
            version,
            status,
        })
    }

    pub fn has_published_compute_key(&self, study_id: &str, key: &str) -> anyhow::Result<bool> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM compute_definitions
             WHERE study_id = ?1 AND key = ?2 AND status = 'published'",
            params![study_id, key],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn published_compute_definitions(
        &self,
        study_id: &str,
    ) -> anyhow::Result<Vec<ComputeDefinition>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, study_id, key, type, definition, version, status
             FROM compute_definitions
             WHERE study_id = ?1 AND status = 'published'
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![study_id], compute_definition_from_row)?;
        collect(rows)
    }

    pub fn insert_rule_set(
        &self,
        study_id: &str,
        rule_type: RuleType,
        name: &str,
        version: i64,
        status: EntityStatus,
        expression: &Value,
    ) -> anyhow::Result<RuleSet> {
        let created_at = now_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO rule_sets(study_id, rule_type, name, version, status, expression, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                study_id,
                rule_type.as_str(),
                name,
                version,
                status.as_str(),
                to_json_text(expression)?,
                created_at
            ],
        )?;
        Ok(RuleSet {
            id: conn.last_insert_rowid(),
            study_id: study_id.to_string(),
            rule_type,
            name: name.to_string(),
            version,
            status,
            expression: expression.clone(),
            created_at,
        })
    }

    pub fn published_rule_sets(&self, study_id: &str) -> anyhow::Result<Vec<RuleSet>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, study_id, rule_type, name, version, status, expression, created_at
             FROM rule_sets
             WHERE study_id = ?1 AND status = 'published'
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![study_id], rule_set_from_row)?;
        collect(rows)
    }

    // --- Submission pipeline writes ---

    pub fn insert_submission(
        &self,
        study_id: &str,
        participant_id: &str,
        form_template_id: i64,
        answers: &Value,
        submitted_at: &str,
    ) -> anyhow::Result<FormSubmission> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO form_submissions(study_id, participant_id, form_template_id, answers, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                study_id,
                participant_id,
                form_template_id,
                to_json_text(answers)?,
                submitted_at
            ],
        )?;
        Ok(FormSubmission {
            id: conn.last_insert_rowid(),
            study_id: study_id.to_string(),
            participant_id: participant_id.to_string(),
            form_template_id,
            answers: answers.clone(),
            submitted_at: submitted_at.to_string(),
        })
    }

    /// One transaction per submission: either every computed value lands or
    /// none do.
    pub fn insert_computed_values(
        &self,
        submission_id: i64,
        values: &[(String, Value)],
        computed_at: &str,
    ) -> anyhow::Result<Vec<ComputedValue>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(values.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO computed_values(submission_id, key, value, computed_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (key, value) in values {
                stmt.execute(params![
                    submission_id,
                    key,
                    to_json_text(value)?,
                    computed_at
                ])?;
                out.push(ComputedValue {
                    id: tx.last_insert_rowid(),
                    submission_id,
                    key: key.clone(),
                    value: value.clone(),
                    computed_at: computed_at.to_string(),
                });
            }
        }
        tx.commit()?;
        Ok(out)
    }

    /// Writes a submission's whole rule phase in one transaction: every
    /// evaluation row, the assignments of matched group rules, and the
    /// schedule plan when any scheduling rule matched. A failure on any row
    /// rolls back the lot.
    pub fn insert_rule_phase(
        &self,
        submission_id: i64,
        study_id: &str,
        participant_id: &str,
        evaluations: &[(i64, bool, Value)],
        assignments: &[(String, String)],
        schedule_plan: Option<&Value>,
        written_at: &str,
    ) -> anyhow::Result<RulePhaseRows> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut rows = RulePhaseRows {
            evaluations: Vec::with_capacity(evaluations.len()),
            assignments: Vec::with_capacity(assignments.len()),
            schedule_plan: None,
        };
        {
            let mut stmt = tx.prepare(
                "INSERT INTO rule_evaluations(submission_id, rule_set_id, result, detail, evaluated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (rule_set_id, matched, detail) in evaluations {
                stmt.execute(params![
                    submission_id,
                    rule_set_id,
                    matched,
                    to_json_text(detail)?,
                    written_at
                ])?;
                rows.evaluations.push(RuleEvaluation {
                    id: tx.last_insert_rowid(),
                    submission_id,
                    rule_set_id: *rule_set_id,
                    matched: *matched,
                    detail: detail.clone(),
                    evaluated_at: written_at.to_string(),
                });
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO participant_assignments(participant_id, study_id, group_key, group_value, assigned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (group_key, group_value) in assignments {
                stmt.execute(params![
                    participant_id,
                    study_id,
                    group_key,
                    group_value,
                    written_at
                ])?;
                rows.assignments.push(ParticipantAssignment {
                    id: tx.last_insert_rowid(),
                    participant_id: participant_id.to_string(),
                    study_id: study_id.to_string(),
                    group_key: group_key.clone(),
                    group_value: group_value.clone(),
                    assigned_at: written_at.to_string(),
                });
            }
        }
        if let Some(plan) = schedule_plan {
            tx.execute(
                "INSERT INTO schedule_plans(participant_id, study_id, plan, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![participant_id, study_id, to_json_text(plan)?, written_at],
            )?;
            rows.schedule_plan = Some(SchedulePlan {
                id: tx.last_insert_rowid(),
                participant_id: participant_id.to_string(),
                study_id: study_id.to_string(),
                plan: plan.clone(),
                created_at: written_at.to_string(),
            });
        }
        tx.commit()?;
        Ok(rows)
    }

    pub fn insert_audit(
        &self,
        study_id: Option<&str>,
        participant_id: Option<&str>,
        action: &str,
        entity_type: &str,
        entity_id: Option<i64>,
        detail: &Value,
    ) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_logs(study_id, participant_id, action, entity_type, entity_id, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                study_id,
                participant_id,
                action,
                entity_type,
                entity_id,
                to_json_text(detail)?,
                now_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn count_audit(&self, action: &str) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audit_logs WHERE action = ?1",
            params![action],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    // --- Result assembly reads ---

    pub fn latest_submission(
        &self,
        study_id: &str,
        participant_id: &str,
    ) -> anyhow::Result<Option<FormSubmission>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, study_id, participant_id, form_template_id, answers, submitted_at
             FROM form_submissions
             WHERE study_id = ?1 AND participant_id = ?2
             ORDER BY submitted_at DESC, id DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query(params![study_id, participant_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(submission_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn computed_for_submission(&self, submission_id: i64) -> anyhow::Result<Vec<ComputedValue>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, submission_id, key, value, computed_at
             FROM computed_values WHERE submission_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![submission_id], computed_value_from_row)?;
        collect(rows)
    }

    pub fn evaluations_for_submission(
        &self,
        submission_id: i64,
    ) -> anyhow::Result<Vec<RuleEvaluation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, submission_id, rule_set_id, result, detail, evaluated_at
             FROM rule_evaluations WHERE submission_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![submission_id], rule_evaluation_from_row)?;
        collect(rows)
    }

    pub fn assignments_for(
        &self,
        study_id: &str,
        participant_id: &str,
    ) -> anyhow::Result<Vec<ParticipantAssignment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, participant_id, study_id, group_key, group_value, assigned_at
             FROM participant_assignments
             WHERE study_id = ?1 AND participant_id = ?2
             ORDER BY assigned_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![study_id, participant_id], assignment_from_row)?;
        collect(rows)
    }

    pub fn latest_schedule_plan(
        &self,
        study_id: &str,
        participant_id: &str,
    ) -> anyhow::Result<Option<SchedulePlan>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, participant_id, study_id, plan, created_at
             FROM schedule_plans
             WHERE study_id = ?1 AND participant_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query(params![study_id, participant_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(schedule_plan_from_row(row)?)),
            None => Ok(None),
        }
    }
}

// --- Row mapping ---

fn template_from_row(row: &Row) -> rusqlite::Result<FormTemplate> {
    Ok(FormTemplate {
        id: row.get(0)?,
        study_id: row.get(1)?,
        name: row.get(2)?,
        version: row.get(3)?,
        status: EntityStatus::parse(&row.get::<_, String>(4)?).unwrap_or(EntityStatus::Draft),
        created_at: row.get(5)?,
    })
}

fn field_from_row(row: &Row) -> rusqlite::Result<FormField> {
    Ok(FormField {
        id: row.get(0)?,
        form_template_id: row.get(1)?,
        key: row.get(2)?,
        label: row.get(3)?,
        field_type: FieldType::parse(&row.get::<_, String>(4)?).unwrap_or(FieldType::Text),
        required: row.get(5)?,
        options: opt_json(row.get(6)?),
        validation: opt_json(row.get(7)?),
        order_index: row.get(8)?,
    })
}

fn compute_definition_from_row(row: &Row) -> rusqlite::Result<ComputeDefinition> {
    Ok(ComputeDefinition {
        id: row.get(0)?,
        study_id: row.get(1)?,
        key: row.get(2)?,
        value_type: row.get(3)?,
        definition: req_json(row.get(4)?),
        version: row.get(5)?,
        status: EntityStatus::parse(&row.get::<_, String>(6)?).unwrap_or(EntityStatus::Draft),
    })
}

fn rule_set_from_row(row: &Row) -> rusqlite::Result<RuleSet> {
    Ok(RuleSet {
        id: row.get(0)?,
        study_id: row.get(1)?,
        rule_type: RuleType::parse(&row.get::<_, String>(2)?).unwrap_or(RuleType::Eligibility),
        name: row.get(3)?,
        version: row.get(4)?,
        status: EntityStatus::parse(&row.get::<_, String>(5)?).unwrap_or(EntityStatus::Draft),
        expression: req_json(row.get(6)?),
        created_at: row.get(7)?,
    })
}

fn submission_from_row(row: &Row) -> rusqlite::Result<FormSubmission> {
    Ok(FormSubmission {
        id: row.get(0)?,
        study_id: row.get(1)?,
        participant_id: row.get(2)?,
        form_template_id: row.get(3)?,
        answers: req_json(row.get(4)?),
        submitted_at: row.get(5)?,
    })
}

fn computed_value_from_row(row: &Row) -> rusqlite::Result<ComputedValue> {
    Ok(ComputedValue {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        key: row.get(2)?,
        value: opt_json(row.get(3)?).unwrap_or(Value::Null),
        computed_at: row.get(4)?,
    })
}

fn rule_evaluation_from_row(row: &Row) -> rusqlite::Result<RuleEvaluation> {
    Ok(RuleEvaluation {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        rule_set_id: row.get(2)?,
        matched: row.get(3)?,
        detail: opt_json(row.get(4)?).unwrap_or(Value::Null),
        evaluated_at: row.get(5)?,
    })
}

fn assignment_from_row(row: &Row) -> rusqlite::Result<ParticipantAssignment> {
    Ok(ParticipantAssignment {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        study_id: row.get(2)?,
        group_key: row.get(3)?,
        group_value: row.get(4)?,
        assigned_at: row.get(5)?,
    })
}

fn schedule_plan_from_row(row: &Row) -> rusqlite::Result<SchedulePlan> {
    Ok(SchedulePlan {
        id: row.get(0)?,
        participant_id: row.get(1)?,
        study_id: row.get(2)?,
        plan: req_json(row.get(3)?),
        created_at: row.get(4)?,
    })
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> anyhow::Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn to_json_text(value: &Value) -> anyhow::Result<String> {
    serde_json::to_string(value).context("failed to encode json column")
}

fn opt_json(text: Option<String>) -> Option<Value> {
    text.and_then(|s| serde_json::from_str(&s).ok())
}

fn req_json(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::Null)
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
