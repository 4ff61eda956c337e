use super::{IntakeEnvelope, IntakeRequest, IntakeService};
use crate::audit::AuditRecord;
use crate::compute::{self, ComputeError, ComputeExpression};
use crate::context::EvaluationContext;
use crate::errors::{IntakeError, Result};
use crate::expr;
use crate::model::RuleType;
use crate::rules;
use crate::storage::store::now_rfc3339;
use crate::validate::validate_answers;
use serde_json::{json, Map, Value};

impl IntakeService {
    /// Runs the whole pipeline for one submission: fetch → validate →
    /// persist submission → compute → persist computed values → evaluate
    /// rules → persist evaluations/assignments/plan → audit.
    ///
    /// Nothing is written (audit included) unless validation passes. The
    /// submission row commits before the compute phase, so a compute cycle
    /// leaves the submission durable with zero computed values.
    pub async fn submit_intake(
        &self,
        study_id: &str,
        participant_id: &str,
        request: IntakeRequest,
    ) -> Result<IntakeEnvelope> {
        let template = self
            .store
            .get_form_template(request.form_template_id, study_id)?
            .ok_or(IntakeError::TemplateNotFound(request.form_template_id))?;

        let fields = self.store.list_fields(template.id)?;
        let report = validate_answers(&fields, &request.answers);
        if !report.is_valid() {
            return Err(IntakeError::ValidationFailed(report.issues));
        }

        let submitted_at = now_rfc3339();
        let answers = Value::Object(request.answers.clone());
        let submission = self.store.insert_submission(
            study_id,
            participant_id,
            template.id,
            &answers,
            &submitted_at,
        )?;

        let definitions = self.store.published_compute_definitions(study_id)?;
        let parsed: Vec<(String, ComputeExpression)> = definitions
            .iter()
            .map(|d| (d.key.clone(), ComputeExpression::parse(&d.definition)))
            .collect();

        let mut metadata = Map::new();
        metadata.insert("study_id".to_string(), json!(study_id));
        metadata.insert("participant_id".to_string(), json!(participant_id));
        metadata.insert("form_template_id".to_string(), json!(template.id));
        metadata.insert("submission_id".to_string(), json!(submission.id));
        metadata.insert("submitted_at".to_string(), json!(submitted_at));
        if let Some(extra) = request.metadata {
            // caller metadata wins on key collisions
            for (key, value) in extra {
                metadata.insert(key, value);
            }
        }

        let ctx = EvaluationContext::new(request.answers, metadata);
        let (computed, ctx) = compute::resolve_all(&parsed, ctx)
            .map_err(|ComputeError::Cycle(key)| IntakeError::ComputeCycle(key))?;
        self.store
            .insert_computed_values(submission.id, &computed, &submitted_at)?;

        // Evaluation is pure; every row of the rule phase lands in one
        // transaction afterwards.
        let rule_sets = self.store.published_rule_sets(study_id)?;
        let mut evaluations = Vec::with_capacity(rule_sets.len());
        let mut assignment_pairs = Vec::new();
        let mut plans = Vec::new();
        for rule_set in &rule_sets {
            let resolved = rules::resolve_payload(rule_set.rule_type, &rule_set.expression);
            let matched = expr::evaluate(&resolved.predicate, &ctx);

            let mut detail = json!({
                "rule_set_id": rule_set.id,
                "rule_type": rule_set.rule_type,
                "name": rule_set.name,
                "matched": matched,
            });
            if let Some(assignment) = &resolved.assignment {
                detail["assignment"] = json!(assignment);
            }
            if let Some(plan) = &resolved.plan {
                detail["plan"] = plan.clone();
            }
            evaluations.push((rule_set.id, matched, detail));

            if !matched {
                continue;
            }
            match rule_set.rule_type {
                RuleType::GroupAssignment => {
                    if let Some(assignment) = resolved.assignment {
                        assignment_pairs.push((assignment.key, assignment.value));
                    }
                }
                RuleType::Scheduling => {
                    if let Some(plan) = resolved.plan {
                        plans.push(json!({
                            "rule_set_id": rule_set.id,
                            "name": rule_set.name,
                            "plan": plan,
                        }));
                    }
                }
                RuleType::Eligibility => {}
            }
        }

        let schedule_plan = (!plans.is_empty()).then(|| json!({ "plans": plans }));
        let phase = self.store.insert_rule_phase(
            submission.id,
            study_id,
            participant_id,
            &evaluations,
            &assignment_pairs,
            schedule_plan.as_ref(),
            &submitted_at,
        )?;
        let rule_evaluations = phase.evaluations;
        let assignments = phase.assignments;

        let audit = AuditRecord {
            study_id: Some(study_id.to_string()),
            participant_id: Some(participant_id.to_string()),
            action: "intake_submitted".to_string(),
            entity_type: "form_submission".to_string(),
            entity_id: Some(submission.id),
            detail: json!({
                "form_template_id": template.id,
                "computed_keys": computed.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
                "rule_count": rule_sets.len(),
                "matched_rules": rule_evaluations.iter().filter(|e| e.matched).count(),
            }),
        };
        if let Err(error) = self.audit.emit(audit).await {
            tracing::warn!(event = "audit_emit_failed", error = %error);
        }

        tracing::info!(
            event = "intake_submitted",
            study_id,
            participant_id,
            submission_id = submission.id,
            computed = computed.len(),
            rules = rule_evaluations.len(),
        );

        Ok(IntakeEnvelope {
            submission,
            answers,
            computed: computed.into_iter().collect(),
            rule_evaluations,
            assignments,
            schedule_plan,
        })
    }
}
