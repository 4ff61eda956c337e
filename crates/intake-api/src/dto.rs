//! Request bodies for the admin create endpoints. The intake submit body is
//! [`intake_core::engine::IntakeRequest`]; responses reuse the core model
//! structs and envelope directly.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct CreateFormTemplateRequest {
    pub name: String,
    pub version: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFormFieldRequest {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    pub options: Option<Value>,
    pub validation: Option<Value>,
    #[serde(default)]
    pub order_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateFormLogicRequest {
    pub logic: Value,
    #[serde(default)]
    pub order_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateComputeDefinitionRequest {
    pub key: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub definition: Value,
    pub version: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleSetRequest {
    pub rule_type: String,
    pub name: String,
    pub version: Option<i64>,
    pub status: Option<String>,
    pub expression: Value,
}
