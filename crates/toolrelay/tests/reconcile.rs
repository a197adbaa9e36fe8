mod common;

use common::ScriptedModel;
use toolrelay::provider::ModelError;
use toolrelay::Reconciler;

#[tokio::test]
async fn test_clean_answer_is_returned_without_model_call() {
    let model = ScriptedModel::new();
    let reconciler = Reconciler::new();

    let answer = reconciler
        .reconcile(&model, "what is 8 times 12", "8 times 12 is 96.")
        .await;
    assert_eq!(answer, "8 times 12 is 96.");

    // Reconciling the result again changes nothing
    let again = reconciler.reconcile(&model, "what is 8 times 12", &answer).await;
    assert_eq!(again, answer);
    assert_eq!(model.complete_count(), 0);
}

#[tokio::test]
async fn test_failed_rewrite_strips_markup() {
    let model = ScriptedModel::new().completion_err(ModelError::Request("connection refused".into()));
    let reconciler = Reconciler::new();

    let answer = reconciler
        .reconcile(
            &model,
            "what is 8 times 12",
            "<function=multiple>{\"a\": 8, \"b\": 12}</function> The product is 96.",
        )
        .await;

    assert_eq!(answer, "{\"a\": 8, \"b\": 12} The product is 96.");
    assert_eq!(model.complete_count(), 1);
}

#[tokio::test]
async fn test_empty_rewrite_strips_markup() {
    let model = ScriptedModel::new().completion("   ");
    let reconciler = Reconciler::new();

    let answer = reconciler
        .reconcile(&model, "2 plus 2", "<function=add></function>It is 4.")
        .await;

    assert_eq!(answer, "It is 4.");
}
