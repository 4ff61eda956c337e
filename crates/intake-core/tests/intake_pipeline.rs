use intake_core::engine::{IntakeRequest, IntakeService};
use intake_core::errors::IntakeError;
use intake_core::storage::Store;
use serde_json::{json, Map, Value};

const STUDY: &str = "sleep-study";

fn service() -> (Store, IntakeService) {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    (store.clone(), IntakeService::with_store(store))
}

fn answers(v: Value) -> Map<String, Value> {
    v.as_object().unwrap().clone()
}

fn seed_sleep_study(svc: &IntakeService) -> i64 {
    let template = svc
        .create_form_template(STUDY, "Baseline intake", None, Some("published"))
        .unwrap();
    svc.create_form_field(
        STUDY,
        template.id,
        "age",
        "Age",
        "number",
        true,
        None,
        Some(&json!({ "min": 18 })),
        0,
    )
    .unwrap();
    svc.create_form_field(
        STUDY,
        template.id,
        "sleep_start",
        "Usual bedtime",
        "time",
        true,
        None,
        None,
        1,
    )
    .unwrap();
    svc.create_form_field(
        STUDY,
        template.id,
        "sleep_end",
        "Usual wake time",
        "time",
        true,
        None,
        None,
        2,
    )
    .unwrap();

    svc.create_compute_definition(
        STUDY,
        "sleep_duration",
        "number",
        &json!({ "func": "duration", "args": [
            { "var": "answers.sleep_start" }, { "var": "answers.sleep_end" }
        ]}),
        None,
        None,
    )
    .unwrap();

    svc.create_rule_set(
        STUDY,
        "eligibility",
        "Adults only",
        None,
        None,
        &json!({ "op": ">=", "left": { "var": "answers.age" }, "right": 18 }),
    )
    .unwrap();
    svc.create_rule_set(
        STUDY,
        "group_assignment",
        "Young adult cohort",
        None,
        None,
        &json!({
            "when": { "op": "between", "left": { "var": "answers.age" }, "min": 18, "max": 30 },
            "assignment": { "key": "cohort", "value": "young-adult" }
        }),
    )
    .unwrap();
    svc.create_rule_set(
        STUDY,
        "scheduling",
        "Baseline visit",
        None,
        None,
        &json!({
            "when": { "op": ">=", "left": { "var": "answers.age" }, "right": 18 },
            "plan": { "visit": "baseline", "offset_days": 7 }
        }),
    )
    .unwrap();

    template.id
}

#[tokio::test]
async fn sleep_pipeline_happy_path() {
    let (_store, svc) = service();
    let template_id = seed_sleep_study(&svc);

    let envelope = svc
        .submit_intake(
            STUDY,
            "p-1",
            IntakeRequest {
                form_template_id: template_id,
                answers: answers(json!({
                    "age": 24, "sleep_start": "22:00", "sleep_end": "06:00"
                })),
                metadata: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(envelope.computed["sleep_duration"], json!(480));
    assert_eq!(envelope.rule_evaluations.len(), 3);
    assert!(envelope.rule_evaluations.iter().all(|e| e.matched));
    assert_eq!(envelope.assignments.len(), 1);
    assert_eq!(envelope.assignments[0].group_key, "cohort");
    assert_eq!(envelope.assignments[0].group_value, "young-adult");

    let plan = envelope.schedule_plan.as_ref().unwrap();
    assert_eq!(
        plan["plans"][0]["plan"],
        json!({ "visit": "baseline", "offset_days": 7 })
    );

    // the read side projects the same envelope
    let result = svc.intake_result(STUDY, "p-1").await.unwrap();
    assert_eq!(result.submission.id, envelope.submission.id);
    assert_eq!(result.computed, envelope.computed);
    assert_eq!(result.rule_evaluations.len(), 3);
    assert_eq!(result.assignments.len(), 1);
    assert_eq!(result.schedule_plan, envelope.schedule_plan);
}

#[tokio::test]
async fn matched_scheduling_rules_and_plan_entries_agree() {
    let (_store, svc) = service();
    let template_id = seed_sleep_study(&svc);
    // second scheduling rule that never matches
    svc.create_rule_set(
        STUDY,
        "scheduling",
        "Minor follow-up",
        None,
        None,
        &json!({
            "when": { "op": "<", "left": { "var": "answers.age" }, "right": 18 },
            "plan": { "visit": "guardian-consent" }
        }),
    )
    .unwrap();

    let envelope = svc
        .submit_intake(
            STUDY,
            "p-2",
            IntakeRequest {
                form_template_id: template_id,
                answers: answers(json!({
                    "age": 24, "sleep_start": "23:00", "sleep_end": "07:00"
                })),
                metadata: None,
            },
        )
        .await
        .unwrap();

    let matched_scheduling = envelope
        .rule_evaluations
        .iter()
        .filter(|e| e.matched && e.detail["rule_type"] == json!("scheduling"))
        .count();
    let plans = envelope.schedule_plan.as_ref().unwrap()["plans"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(matched_scheduling, 1);
    assert_eq!(plans, matched_scheduling);
}

#[tokio::test]
async fn validation_failure_writes_nothing() {
    let (store, svc) = service();
    let template_id = seed_sleep_study(&svc);

    let err = svc
        .submit_intake(
            STUDY,
            "p-1",
            IntakeRequest {
                form_template_id: template_id,
                answers: answers(json!({ "age": 15 })),
                metadata: None,
            },
        )
        .await
        .unwrap_err();

    match err {
        IntakeError::ValidationFailed(issues) => {
            assert!(issues.iter().any(|i| i.key == "age"));
            assert!(issues.iter().any(|i| i.key == "sleep_start"));
        }
        other => panic!("expected ValidationFailed, got {:?}", other),
    }

    // no submission, no audit record
    assert!(matches!(
        svc.intake_result(STUDY, "p-1").await.unwrap_err(),
        IntakeError::NotFound
    ));
    assert_eq!(store.count_audit("intake_submitted").unwrap(), 0);
}

#[tokio::test]
async fn unknown_template_is_not_found() {
    let (_store, svc) = service();
    seed_sleep_study(&svc);

    let err = svc
        .submit_intake(
            STUDY,
            "p-1",
            IntakeRequest {
                form_template_id: 9999,
                answers: Map::new(),
                metadata: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IntakeError::TemplateNotFound(9999)));
}

#[tokio::test]
async fn compute_cycle_fails_the_phase_and_writes_no_values() {
    let (store, svc) = service();
    let template = svc
        .create_form_template(STUDY, "Minimal", None, None)
        .unwrap();
    svc.create_compute_definition(
        STUDY,
        "a",
        "number",
        &json!({ "op": "add", "args": [{ "var": "computed.b" }, 1] }),
        None,
        None,
    )
    .unwrap();
    svc.create_compute_definition(
        STUDY,
        "b",
        "number",
        &json!({ "op": "add", "args": [{ "var": "computed.a" }, 1] }),
        None,
        None,
    )
    .unwrap();

    let err = svc
        .submit_intake(
            STUDY,
            "p-9",
            IntakeRequest {
                form_template_id: template.id,
                answers: Map::new(),
                metadata: None,
            },
        )
        .await
        .unwrap_err();

    match err {
        IntakeError::ComputeCycle(key) => assert!(key == "a" || key == "b"),
        other => panic!("expected ComputeCycle, got {:?}", other),
    }

    // the submission is durable, the compute phase left nothing behind
    let submission = store.latest_submission(STUDY, "p-9").unwrap().unwrap();
    assert!(store
        .computed_for_submission(submission.id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn duplicate_published_compute_keys_are_rejected() {
    let (_store, svc) = service();
    let definition = json!({ "value": 1 });
    svc.create_compute_definition(STUDY, "score", "number", &definition, None, None)
        .unwrap();
    let err = svc
        .create_compute_definition(STUDY, "score", "number", &definition, Some(2), None)
        .unwrap_err();
    assert!(matches!(err, IntakeError::InvalidPayload(_)));
    // drafts may share the key
    svc.create_compute_definition(STUDY, "score", "number", &definition, Some(2), Some("draft"))
        .unwrap();
}

#[tokio::test]
async fn latest_submission_wins_on_the_read_side() {
    let (_store, svc) = service();
    let template_id = seed_sleep_study(&svc);

    for (age, start) in [(24, "22:00"), (25, "23:30")] {
        svc.submit_intake(
            STUDY,
            "p-1",
            IntakeRequest {
                form_template_id: template_id,
                answers: answers(json!({
                    "age": age, "sleep_start": start, "sleep_end": "06:00"
                })),
                metadata: None,
            },
        )
        .await
        .unwrap();
    }

    let result = svc.intake_result(STUDY, "p-1").await.unwrap();
    assert_eq!(result.answers["age"], json!(25));
    assert_eq!(result.computed["sleep_duration"], json!(390));
}

#[tokio::test]
async fn metadata_flows_into_rule_context() {
    let (_store, svc) = service();
    let template = svc
        .create_form_template(STUDY, "Minimal", None, None)
        .unwrap();
    svc.create_rule_set(
        STUDY,
        "eligibility",
        "Main site only",
        None,
        None,
        &json!({ "op": "==", "left": { "var": "metadata.site" }, "right": "main" }),
    )
    .unwrap();

    let envelope = svc
        .submit_intake(
            STUDY,
            "p-1",
            IntakeRequest {
                form_template_id: template.id,
                answers: Map::new(),
                metadata: Some(answers(json!({ "site": "main" }))),
            },
        )
        .await
        .unwrap();
    assert!(envelope.rule_evaluations[0].matched);
    // engine-provided metadata is present alongside caller keys
    assert_eq!(
        envelope.submission.study_id,
        STUDY
    );
}
