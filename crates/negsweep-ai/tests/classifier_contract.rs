//! Contract tests for the AiClassifier trait using the scripted fake.

use negsweep_ai::fakes::ScriptedClassifier;
use negsweep_ai::{AiClassifier, AiVerdict, ClassifierError, VerdictKind};

fn terms(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn scripted_classifier_records_batches_and_context() {
    let classifier = ScriptedClassifier::returning(vec![AiVerdict::new(
        "acme widget",
        VerdictKind::Competitor,
        "rival brand",
    )
    .with_keyword("acme")]);

    let verdicts = classifier
        .classify(&terms(&["acme widget", "best widget"]), "widget shop")
        .await
        .unwrap();

    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].keyword.as_deref(), Some("acme"));
    let calls = classifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, terms(&["acme widget", "best widget"]));
    assert_eq!(calls[0].1, "widget shop");
}

#[tokio::test]
async fn invalid_completion_surfaces_as_schema_error() {
    let classifier = ScriptedClassifier::completion("not json at all {");
    let err = classifier
        .classify(&terms(&["best widget"]), "")
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifierError::Schema(_)));
}

#[tokio::test]
async fn failing_classifier_returns_its_error_every_time() {
    let classifier = ScriptedClassifier::failing(ClassifierError::Network("timeout".into()));
    for _ in 0..2 {
        assert!(classifier.classify(&terms(&["x"]), "").await.is_err());
    }
    assert_eq!(classifier.call_count(), 2);
}
