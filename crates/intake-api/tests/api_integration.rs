use intake_api::server::{start_background_server, ApiConfig};
use intake_core::storage::Store;
use serde_json::{json, Value};

async fn spawn_api(store: Option<Store>) -> String {
    let config = ApiConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_cors: false,
    };
    let addr = start_background_server(&config, store).await.unwrap();
    format!("http://{}", addr)
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn seed_sleep_study(client: &reqwest::Client, base: &str) -> i64 {
    let (status, body) = post(
        client,
        format!("{base}/api/studies/sleep/forms"),
        json!({ "name": "Baseline intake", "status": "published" }),
    )
    .await;
    assert_eq!(status, 201);
    let form_id = body["form_template"]["id"].as_i64().unwrap();

    for (i, (key, label, field_type, validation)) in [
        ("age", "Age", "number", Some(json!({ "min": 18 }))),
        ("sleep_start", "Usual bedtime", "time", None),
        ("sleep_end", "Usual wake time", "time", None),
    ]
    .into_iter()
    .enumerate()
    {
        let (status, _) = post(
            client,
            format!("{base}/api/studies/sleep/forms/{form_id}/fields"),
            json!({
                "key": key,
                "label": label,
                "type": field_type,
                "required": true,
                "validation": validation,
                "order_index": i
            }),
        )
        .await;
        assert_eq!(status, 201);
    }

    let (status, _) = post(
        client,
        format!("{base}/api/studies/sleep/compute-definitions"),
        json!({
            "key": "sleep_duration",
            "type": "number",
            "definition": { "func": "duration", "args": [
                { "var": "answers.sleep_start" }, { "var": "answers.sleep_end" }
            ]}
        }),
    )
    .await;
    assert_eq!(status, 201);

    for rule in [
        json!({
            "rule_type": "eligibility",
            "name": "Adults only",
            "expression": { "op": ">=", "left": { "var": "answers.age" }, "right": 18 }
        }),
        json!({
            "rule_type": "group_assignment",
            "name": "Young adult cohort",
            "expression": {
                "when": { "op": "between", "left": { "var": "answers.age" }, "min": 18, "max": 30 },
                "assignment": { "key": "cohort", "value": "young-adult" }
            }
        }),
        json!({
            "rule_type": "scheduling",
            "name": "Baseline visit",
            "expression": {
                "when": { "op": ">=", "left": { "var": "answers.age" }, "right": 18 },
                "plan": { "visit": "baseline", "offset_days": 7 }
            }
        }),
    ] {
        let (status, _) = post(client, format!("{base}/api/studies/sleep/rule-sets"), rule).await;
        assert_eq!(status, 201);
    }

    form_id
}

#[tokio::test]
async fn intake_round_trip_over_http() {
    let base = spawn_api(Some(Store::memory().unwrap())).await;
    let client = reqwest::Client::new();
    let form_id = seed_sleep_study(&client, &base).await;

    let (status, envelope) = post(
        &client,
        format!("{base}/api/studies/sleep/participants/p-1/intake-submit"),
        json!({
            "form_template_id": form_id,
            "answers": { "age": 24, "sleep_start": "22:00", "sleep_end": "06:00" }
        }),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(envelope["computed"]["sleep_duration"], json!(480));
    assert_eq!(envelope["rule_evaluations"].as_array().unwrap().len(), 3);
    assert_eq!(envelope["assignments"][0]["group_key"], json!("cohort"));
    assert_eq!(
        envelope["assignments"][0]["group_value"],
        json!("young-adult")
    );
    assert_eq!(
        envelope["schedule_plan"]["plans"][0]["plan"],
        json!({ "visit": "baseline", "offset_days": 7 })
    );

    let resp = client
        .get(format!(
            "{base}/api/studies/sleep/participants/p-1/intake-result"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let result: Value = resp.json().await.unwrap();
    assert_eq!(result["computed"], envelope["computed"]);
    assert_eq!(result["submission"]["id"], envelope["submission"]["id"]);
}

#[tokio::test]
async fn validation_failure_is_a_400_with_issues() {
    let base = spawn_api(Some(Store::memory().unwrap())).await;
    let client = reqwest::Client::new();
    let form_id = seed_sleep_study(&client, &base).await;

    let (status, body) = post(
        &client,
        format!("{base}/api/studies/sleep/participants/p-1/intake-submit"),
        json!({ "form_template_id": form_id, "answers": { "age": 15 } }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], json!("Validation failed"));
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e["key"] == json!("age")));

    // the failed submit left nothing to read back
    let resp = client
        .get(format!(
            "{base}/api/studies/sleep/participants/p-1/intake-result"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn missing_template_and_missing_body_fields() {
    let base = spawn_api(Some(Store::memory().unwrap())).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{base}/api/studies/sleep/participants/p-1/intake-submit"),
        json!({ "form_template_id": 42, "answers": {} }),
    )
    .await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    // structurally invalid payload: answers must be a map
    let (status, _) = post(
        &client,
        format!("{base}/api/studies/sleep/participants/p-1/intake-submit"),
        json!({ "form_template_id": 42, "answers": "not a map" }),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post(
        &client,
        format!("{base}/api/studies/sleep/forms"),
        json!({ "version": 2 }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn admin_rejects_bad_enums_and_dangling_references() {
    let base = spawn_api(Some(Store::memory().unwrap())).await;
    let client = reqwest::Client::new();

    let (status, _) = post(
        &client,
        format!("{base}/api/studies/sleep/rule-sets"),
        json!({ "rule_type": "lottery", "name": "Nope", "expression": {} }),
    )
    .await;
    assert_eq!(status, 400);

    let (status, _) = post(
        &client,
        format!("{base}/api/studies/sleep/forms/123/fields"),
        json!({ "key": "age", "label": "Age", "type": "number" }),
    )
    .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn server_without_a_store_answers_503() {
    let base = spawn_api(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let (status, body) = post(
        &client,
        format!("{base}/api/studies/sleep/forms"),
        json!({ "name": "Baseline" }),
    )
    .await;
    assert_eq!(status, 503);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}
