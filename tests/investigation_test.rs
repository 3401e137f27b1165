use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::sync::Arc;

use culprit::core::{Confidence, Engine, IncidentInput, IssueCategory};
use culprit::Config;

const TRACE: &str = "java.lang.NullPointerException: customer was null
\tat com.example.card.Handler.handleEvent(Handler.kt:44)
\tat com.example.card.Dispatcher.dispatch(Dispatcher.kt:12)
\tat org.springframework.Container.invoke(Container.java:99)";

const HANDLER_DIFF: &str = "@@ -42,6 +42,5 @@
 fun handleEvent(event: Event) {
     val customer = repository.find(event.customerId)
-    if (customer == null) return
     process(customer)
 }";

const PAYMENT_DIFF: &str = "@@ -10,3 +10,4 @@
 fun charge(amount: Long) {
+    throw IllegalStateException(\"payments disabled\")
 }";

fn incident_json() -> serde_json::Value {
    json!({
        "stack_trace": TRACE,
        "incident_time": "2024-03-10T12:00:00Z",
        "services": {
            "payment-service": {
                "diffs": [{ "file_path": "src/main/kotlin/com/example/pay/Charger.kt", "diff": PAYMENT_DIFF }],
                "deployments": [
                    { "commit_hash": "deadbeefcafebabe", "deployed_at": "2024-03-10T11:00:00Z" },
                    { "commit_hash": "0000000011111111", "deployed_at": "2024-03-01T11:00:00Z" }
                ]
            },
            "card-service": {
                "diffs": [{ "file_path": "src/main/kotlin/com/example/card/Handler.kt", "diff": HANDLER_DIFF }]
            }
        }
    })
}

fn load_incident() -> IncidentInput {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("incident.json");
    file.write_str(&incident_json().to_string()).unwrap();
    file.assert(predicate::str::contains("card-service"));

    let content = std::fs::read_to_string(file.path()).unwrap();
    IncidentInput::from_json(&content).unwrap()
}

#[test]
fn test_end_to_end_investigation() {
    let engine = Engine::new(&Config::default()).unwrap();
    let investigation = engine.investigate(load_incident());

    // Map input keeps the order services appear in the document
    let services: Vec<&str> = investigation.file_reports.iter().map(|r| r.service.as_str()).collect();
    assert_eq!(services, vec!["payment-service", "card-service"]);

    let handler = &investigation.file_reports[1];
    assert_eq!(handler.issues.len(), 1);
    assert_eq!(handler.issues[0].category, IssueCategory::NullCheckRemoved);
    assert!(handler.summary.starts_with("Found 1 potential issues (1 HIGH severity)"));

    let charger = &investigation.file_reports[0];
    assert_eq!(charger.issues[0].category, IssueCategory::NewExceptionIntroduced);

    let candidate = investigation.resolution.candidate.as_ref().unwrap();
    assert_eq!(candidate.service, "card-service");
    assert_eq!(candidate.confidence, Confidence::High);
    assert_eq!(candidate.file_path.as_deref(), Some("src/main/kotlin/com/example/card/Handler.kt"));
    assert_eq!(candidate.line_number, Some(44));
    // Only the deployment inside the 72 hour window counts
    assert_eq!(
        candidate.contributing_factors,
        vec!["Recent deployment to payment-service (commit: deadbeef)".to_string()]
    );

    let analysis = investigation.exception_analysis.as_ref().unwrap();
    assert_eq!(analysis.call_flow.len(), 2);
    assert_eq!(analysis.changed_frames_count, 1);
    assert_eq!(analysis.confidence, Confidence::High);
}

#[tokio::test]
async fn test_concurrent_investigation_is_deterministic() {
    let engine = Arc::new(Engine::new(&Config::default()).unwrap());

    let sequential = engine.investigate(load_incident());
    let first = Arc::clone(&engine).investigate_concurrent(load_incident()).await.unwrap();
    let second = engine.investigate_concurrent(load_incident()).await.unwrap();

    assert_eq!(first, sequential);
    assert_eq!(first, second);
}

#[test]
fn test_investigation_serializes_with_stable_tags() {
    let engine = Engine::new(&Config::default()).unwrap();
    let investigation = engine.investigate(load_incident());
    let rendered = serde_json::to_string(&investigation).unwrap();

    assert!(predicate::str::contains("\"null_check_removed\"").eval(&rendered));
    assert!(predicate::str::contains("\"new-exception-introduced\"").eval(&rendered));
    assert!(predicate::str::contains("\"confidence\":\"HIGH\"").eval(&rendered));
}
