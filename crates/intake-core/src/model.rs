use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status shared by form templates, compute definitions and rule
/// sets. Only `published` rows feed rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Draft,
    Published,
    Archived,
}

impl EntityStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(EntityStatus::Draft),
            "published" => Some(EntityStatus::Published),
            "archived" => Some(EntityStatus::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::Published => "published",
            EntityStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Time,
    Select,
    MultiSelect,
}

impl FieldType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "select" => Some(FieldType::Select),
            "multi_select" => Some(FieldType::MultiSelect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multi_select",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Eligibility,
    GroupAssignment,
    Scheduling,
}

impl RuleType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eligibility" => Some(RuleType::Eligibility),
            "group_assignment" => Some(RuleType::GroupAssignment),
            "scheduling" => Some(RuleType::Scheduling),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Eligibility => "eligibility",
            RuleType::GroupAssignment => "group_assignment",
            RuleType::Scheduling => "scheduling",
        }
    }
}

/// Versioned, ordered collection of fields. Immutable once referenced by a
/// submission (the API exposes no update surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormTemplate {
    pub id: i64,
    pub study_id: String,
    pub name: String,
    pub version: i64,
    pub status: EntityStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: i64,
    pub form_template_id: i64,
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub options: Option<Value>,
    pub validation: Option<Value>,
    pub order_index: i64,
}

/// Conditional-visibility payload for the UI. Stored verbatim, never
/// interpreted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormLogic {
    pub id: i64,
    pub form_template_id: i64,
    pub logic: Value,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeDefinition {
    pub id: i64,
    pub study_id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub definition: Value,
    pub version: i64,
    pub status: EntityStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: i64,
    pub study_id: String,
    pub rule_type: RuleType,
    pub name: String,
    pub version: i64,
    pub status: EntityStatus,
    pub expression: Value,
    pub created_at: String,
}

/// One immutable instance of answers. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: i64,
    pub study_id: String,
    pub participant_id: String,
    pub form_template_id: i64,
    pub answers: Value,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedValue {
    pub id: i64,
    pub submission_id: i64,
    pub key: String,
    pub value: Value,
    pub computed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub id: i64,
    pub submission_id: i64,
    pub rule_set_id: i64,
    pub matched: bool,
    pub detail: Value,
    pub evaluated_at: String,
}

/// Append-only; the latest row per `group_key` wins for downstream queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantAssignment {
    pub id: i64,
    pub participant_id: String,
    pub study_id: String,
    pub group_key: String,
    pub group_value: String,
    pub assigned_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePlan {
    pub id: i64,
    pub participant_id: String,
    pub study_id: String,
    pub plan: Value,
    pub created_at: String,
}
