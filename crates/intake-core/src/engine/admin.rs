//! Thin create operations behind the admin endpoints. These are insert
//! wrappers, but the application-level invariants (status vocabulary, field
//! key uniqueness, published compute-key uniqueness) are enforced here
//! rather than in the schema.

use super::IntakeService;
use crate::errors::{IntakeError, Result};
use crate::model::{
    ComputeDefinition, EntityStatus, FieldType, FormField, FormLogic, FormTemplate, RuleSet,
    RuleType,
};
use serde_json::Value;

impl IntakeService {
    pub fn create_form_template(
        &self,
        study_id: &str,
        name: &str,
        version: Option<i64>,
        status: Option<&str>,
    ) -> Result<FormTemplate> {
        let version = check_version(version)?;
        let status = parse_status(status, EntityStatus::Draft)?;
        Ok(self
            .store
            .insert_form_template(study_id, name, version, status)?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_form_field(
        &self,
        study_id: &str,
        form_template_id: i64,
        key: &str,
        label: &str,
        field_type: &str,
        required: bool,
        options: Option<&Value>,
        validation: Option<&Value>,
        order_index: i64,
    ) -> Result<FormField> {
        self.require_template(form_template_id, study_id)?;
        let field_type = FieldType::parse(field_type).ok_or_else(|| {
            IntakeError::InvalidPayload(format!("unknown field type '{}'", field_type))
        })?;
        if self.store.field_key_exists(form_template_id, key)? {
            return Err(IntakeError::InvalidPayload(format!(
                "field key '{}' already exists on this template",
                key
            )));
        }
        Ok(self.store.insert_form_field(
            form_template_id,
            key,
            label,
            field_type,
            required,
            options,
            validation,
            order_index,
        )?)
    }

    pub fn create_form_logic(
        &self,
        study_id: &str,
        form_template_id: i64,
        logic: &Value,
        order_index: i64,
    ) -> Result<FormLogic> {
        self.require_template(form_template_id, study_id)?;
        Ok(self
            .store
            .insert_form_logic(form_template_id, logic, order_index)?)
    }

    pub fn create_compute_definition(
        &self,
        study_id: &str,
        key: &str,
        value_type: &str,
        definition: &Value,
        version: Option<i64>,
        status: Option<&str>,
    ) -> Result<ComputeDefinition> {
        let version = check_version(version)?;
        let status = parse_status(status, EntityStatus::Published)?;
        if status == EntityStatus::Published
            && self.store.has_published_compute_key(study_id, key)?
        {
            return Err(IntakeError::InvalidPayload(format!(
                "published compute definition '{}' already exists for this study",
                key
            )));
        }
        Ok(self.store.insert_compute_definition(
            study_id, key, value_type, definition, version, status,
        )?)
    }

    pub fn create_rule_set(
        &self,
        study_id: &str,
        rule_type: &str,
        name: &str,
        version: Option<i64>,
        status: Option<&str>,
        expression: &Value,
    ) -> Result<RuleSet> {
        let rule_type = RuleType::parse(rule_type).ok_or_else(|| {
            IntakeError::InvalidPayload(format!("unknown rule type '{}'", rule_type))
        })?;
        let version = check_version(version)?;
        let status = parse_status(status, EntityStatus::Published)?;
        Ok(self
            .store
            .insert_rule_set(study_id, rule_type, name, version, status, expression)?)
    }

    fn require_template(&self, form_template_id: i64, study_id: &str) -> Result<()> {
        // Admin routes answer 400 for a dangling template reference; only
        // the intake path reports 404.
        self.store
            .get_form_template(form_template_id, study_id)?
            .ok_or_else(|| {
                IntakeError::InvalidPayload(format!(
                    "form template {} does not belong to this study",
                    form_template_id
                ))
            })?;
        Ok(())
    }
}

fn check_version(version: Option<i64>) -> Result<i64> {
    let version = version.unwrap_or(1);
    if version < 1 {
        return Err(IntakeError::InvalidPayload(
            "version must be >= 1".to_string(),
        ));
    }
    Ok(version)
}

fn parse_status(raw: Option<&str>, default: EntityStatus) -> Result<EntityStatus> {
    match raw {
        None => Ok(default),
        Some(s) => EntityStatus::parse(s)
            .ok_or_else(|| IntakeError::InvalidPayload(format!("unknown status '{}'", s))),
    }
}
