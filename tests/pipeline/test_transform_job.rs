mod support;

use indexmap::IndexMap;
use recast::catalog::FilterExpression;
use recast::core::batch::{TransformBatch, TransformOutcome, TransformRecord};
use recast::core::error::PipelineError;
use recast::core::executor::{EngineError, EngineResponse, TransformEngine};
use recast::core::runner::TransformJobRunner;
use recast::core::types::{RecordStatus, SkipReason};
use std::sync::Arc;
use support::*;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn run_job(
    runner: TransformJobRunner,
) -> (Result<(), PipelineError>, Vec<TransformRecord>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = runner.run(tx).await;
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    (outcome, records)
}

#[tokio::test]
async fn classifies_every_record_exactly_once() {
    let server = mock_catalog().await;
    mount_search(
        &server,
        vec![
            hit("uuid-change", "Changed", "n"),
            hit("uuid-same", "Untouched", "n"),
            hit("uuid-skip", "Not applicable", "n"),
            hit("uuid-fail", "Broken", "n"),
        ],
    )
    .await;
    mount_fetch(&server, "uuid-change", "<md>old</md>").await;
    mount_fetch(&server, "uuid-same", "<md>same</md>").await;
    mount_fetch(&server, "uuid-skip", "<md>skip</md>").await;
    mount_fetch(&server, "uuid-fail", "<md>fail</md>").await;

    let engine = Arc::new(ScriptedEngine::new(vec![
        Ok(EngineResponse::Transformed {
            xml: "<md>new</md>".to_string(),
            messages: vec![],
        }),
        // same document back: a success without a diff
        Ok(EngineResponse::Transformed {
            xml: "<md>same</md>".to_string(),
            messages: vec![],
        }),
        Ok(EngineResponse::NotApplicable {
            reason: SkipReason::AlreadyApplied,
            messages: vec![],
        }),
        Err(EngineError::Processing("malformed input".to_string())),
    ]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        engine,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    outcome.unwrap();

    // every searched record lands in the result set exactly once, in order
    let uuids: Vec<&str> = records.iter().map(|r| r.uuid.as_str()).collect();
    assert_eq!(uuids, ["uuid-change", "uuid-same", "uuid-skip", "uuid-fail"]);

    match &records[0].outcome {
        TransformOutcome::Success { result, has_diff, .. } => {
            assert_eq!(result, "<md>new</md>");
            assert!(*has_diff);
        }
        other => panic!("expected success, got {other:?}"),
    }
    // a no-change result is still a success, just without a diff
    match &records[1].outcome {
        TransformOutcome::Success { has_diff, .. } => assert!(!*has_diff),
        other => panic!("expected success, got {other:?}"),
    }
    match &records[2].outcome {
        TransformOutcome::Skipped { reason, .. } => {
            assert_eq!(*reason, SkipReason::AlreadyApplied)
        }
        other => panic!("expected skip, got {other:?}"),
    }
    match &records[3].outcome {
        TransformOutcome::Failure { error } => assert!(error.contains("malformed input")),
        other => panic!("expected failure, got {other:?}"),
    }

    // originals carry the fetched XML verbatim
    assert_eq!(records[0].original, "<md>old</md>");
    assert_eq!(records[3].original, "<md>fail</md>");
}

#[tokio::test]
async fn working_copy_is_skipped_before_the_engine_runs() {
    let server = mock_catalog().await;
    mount_search(
        &server,
        vec![workflow_hit("uuid-wc", "Drafted", 2, "e")],
    )
    .await;
    mount_fetch(&server, "uuid-wc", "<md>draft</md>").await;

    let engine = Arc::new(ScriptedEngine::new(vec![]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        Arc::clone(&engine) as Arc<dyn TransformEngine>,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    outcome.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].outcome,
        TransformOutcome::Skipped {
            reason: SkipReason::HasWorkingCopy,
            warnings: vec![],
        }
    );
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn non_transformable_record_type_is_skipped() {
    let server = mock_catalog().await;
    mount_search(&server, vec![hit("uuid-sub", "Sub-template", "s")]).await;
    mount_fetch(&server, "uuid-sub", "<md>sub</md>").await;

    let engine = Arc::new(ScriptedEngine::new(vec![]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        Arc::clone(&engine) as Arc<dyn TransformEngine>,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    outcome.unwrap();

    assert_eq!(records[0].status(), RecordStatus::Skipped);
    match &records[0].outcome {
        TransformOutcome::Skipped { reason, .. } => {
            assert_eq!(*reason, SkipReason::NotApplicable)
        }
        other => panic!("expected skip, got {other:?}"),
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn duplicate_search_hits_are_processed_once() {
    let server = mock_catalog().await;
    mount_search(
        &server,
        vec![
            hit("uuid-dup", "First", "n"),
            hit("uuid-dup", "Again", "n"),
        ],
    )
    .await;
    mount_fetch(&server, "uuid-dup", "<md>dup</md>").await;

    let engine = Arc::new(ScriptedEngine::new(vec![Ok(
        EngineResponse::Transformed {
            xml: "<md>dup2</md>".to_string(),
            messages: vec![],
        },
    )]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        engine,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    outcome.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn missing_required_parameter_aborts_before_any_fetch() {
    // no search or fetch mocks: the binding error must fire first
    let server = mock_catalog().await;
    let engine = Arc::new(ScriptedEngine::new(vec![]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        engine,
        transformation,
        IndexMap::new(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    match outcome {
        Err(PipelineError::MissingParameter { name, .. }) => {
            assert_eq!(name, "organisation")
        }
        other => panic!("expected missing parameter, got {other:?}"),
    }
    assert!(records.is_empty());
}

#[tokio::test]
async fn fetch_failure_aborts_but_keeps_processed_records() {
    let server = mock_catalog().await;
    mount_search(
        &server,
        vec![hit("uuid-ok", "Fine", "n"), hit("uuid-gone", "Gone", "n")],
    )
    .await;
    mount_fetch(&server, "uuid-ok", "<md>ok</md>").await;
    Mock::given(method("GET"))
        .and(path("/api/records/uuid-gone/formatters/xml"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let engine = Arc::new(ScriptedEngine::new(vec![Ok(
        EngineResponse::Transformed {
            xml: "<md>ok2</md>".to_string(),
            messages: vec![],
        },
    )]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        engine,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    assert!(matches!(outcome, Err(PipelineError::Catalog(_))));
    // the record processed before the abort survives
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uuid, "uuid-ok");
}

#[tokio::test]
async fn engine_unavailable_aborts_the_job() {
    let server = mock_catalog().await;
    mount_search(&server, vec![hit("uuid-a", "A", "n")]).await;
    mount_fetch(&server, "uuid-a", "<md>a</md>").await;

    let engine = Arc::new(ScriptedEngine::new(vec![Err(EngineError::Unavailable(
        "xsltproc not found".to_string(),
    ))]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        engine,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    match outcome {
        Err(PipelineError::EngineUnavailable(message)) => {
            assert!(message.contains("xsltproc"))
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
    assert!(records.is_empty());
}

#[tokio::test]
async fn batch_partitions_cover_the_whole_set() {
    let server = mock_catalog().await;
    mount_search(
        &server,
        vec![
            hit("uuid-1", "One", "n"),
            hit("uuid-2", "Two", "n"),
            hit("uuid-3", "Three", "n"),
        ],
    )
    .await;
    mount_fetch(&server, "uuid-1", "<md>1</md>").await;
    mount_fetch(&server, "uuid-2", "<md>2</md>").await;
    mount_fetch(&server, "uuid-3", "<md>3</md>").await;

    let engine = Arc::new(ScriptedEngine::new(vec![
        Ok(EngineResponse::Transformed {
            xml: "<md>1b</md>".to_string(),
            messages: vec![],
        }),
        Err(EngineError::Processing("bad".to_string())),
        Ok(EngineResponse::NotApplicable {
            reason: SkipReason::NotApplicable,
            messages: vec![],
        }),
    ]));
    let (_lib, transformation) = library_with_stylesheet("fix-contacts");
    let runner = TransformJobRunner::new(
        connect(&server).await,
        engine,
        transformation,
        required_params(),
        FilterExpression::default(),
    );

    let (outcome, records) = run_job(runner).await;
    outcome.unwrap();

    let mut batch = TransformBatch::new("fix-contacts");
    for record in records {
        assert!(batch.add(record));
    }
    assert_eq!(batch.successes().len(), 1);
    assert_eq!(batch.failures().len(), 1);
    assert_eq!(batch.skipped().len(), 1);
    assert_eq!(
        batch.successes().len() + batch.failures().len() + batch.skipped().len(),
        batch.len()
    );
    assert!(batch.diff("uuid-1").is_some());
    assert!(batch.diff("uuid-2").is_none());
}
