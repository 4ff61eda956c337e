use super::{IntakeEnvelope, IntakeService};
use crate::errors::{IntakeError, Result};
use serde_json::{Map, Value};

impl IntakeService {
    /// Projects the latest submission for a `(study, participant)` pair into
    /// the same envelope shape the submit path returns.
    pub async fn intake_result(
        &self,
        study_id: &str,
        participant_id: &str,
    ) -> Result<IntakeEnvelope> {
        let submission = self
            .store
            .latest_submission(study_id, participant_id)?
            .ok_or(IntakeError::NotFound)?;

        let computed: Map<String, Value> = self
            .store
            .computed_for_submission(submission.id)?
            .into_iter()
            .map(|row| (row.key, row.value))
            .collect();
        let rule_evaluations = self.store.evaluations_for_submission(submission.id)?;
        let assignments = self.store.assignments_for(study_id, participant_id)?;
        let schedule_plan = self
            .store
            .latest_schedule_plan(study_id, participant_id)?
            .map(|row| row.plan);

        Ok(IntakeEnvelope {
            answers: submission.answers.clone(),
            submission,
            computed,
            rule_evaluations,
            assignments,
            schedule_plan,
        })
    }
}
