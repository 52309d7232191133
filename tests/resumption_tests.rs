// Resuming a workflow from route identifiers and saved records

mod fixtures;

use deploy_flow::storage::{DeploymentStore, FileDeploymentStore};
use deploy_flow::workflow::*;
use fixtures::*;
use std::sync::Arc;
use tempfile::TempDir;

fn params(intent: Option<&str>, dseq: Option<&str>) -> RouteParams {
    RouteParams::from_raw(intent, dseq).unwrap()
}

#[tokio::test]
async fn test_deep_link_lands_on_provider_selection_with_saved_spec() {
    let world = TestWorld::new();
    let created = {
        let mut first = world.orchestrator();
        first.create_deployment(sample_spec()).await.unwrap()
    };

    // A fresh session only has the dseq from the route
    let resumed = WorkflowOrchestrator::resume(
        world.collaborators.clone(),
        &params(None, Some(created.dseq.as_str())),
    )
    .await
    .unwrap();

    let state = resumed.state();
    assert_eq!(state.step, WorkflowStep::ProviderSelecting);
    assert_eq!(state.deployment, Some(created));
    assert_eq!(resumed.specification(), Some(&sample_spec()));
}

#[tokio::test]
async fn test_resumed_workflow_completes_lease_and_manifest() {
    let world = TestWorld::new();
    let created = world
        .orchestrator()
        .create_deployment(sample_spec())
        .await
        .unwrap();

    let mut resumed = WorkflowOrchestrator::resume(
        world.collaborators.clone(),
        &params(None, Some(created.dseq.as_str())),
    )
    .await
    .unwrap();
    world.watch(&resumed);

    resumed
        .accept_bid(BidSelection::for_deployment(&created, PROVIDER))
        .await
        .unwrap();

    assert_eq!(resumed.step(), WorkflowStep::Completed);
    assert_eq!(world.chain.probe.samples().len(), 3);
    match world.chain.events().last() {
        Some(ChainEvent::ManifestSent(submission)) => {
            assert_eq!(submission.spec, sample_spec());
            assert_eq!(submission.signer, OWNER);
        }
        other => panic!("expected a manifest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_dseq_resumes_but_cannot_lease() {
    let world = TestWorld::new();
    let mut resumed = WorkflowOrchestrator::resume(
        world.collaborators.clone(),
        &params(None, Some("777")),
    )
    .await
    .unwrap();
    assert_eq!(resumed.step(), WorkflowStep::ProviderSelecting);
    assert!(resumed.specification().is_none());

    let deployment = resumed.state().deployment.unwrap();
    let err = resumed
        .accept_bid(BidSelection::for_deployment(&deployment, PROVIDER))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::PreconditionMissing {
            missing: "workload specification",
            ..
        }
    ));
    assert!(world.chain.events().is_empty());
}

#[tokio::test]
async fn test_intent_only_resumes_into_preflight() {
    let world = TestWorld::new();
    let resumed = WorkflowOrchestrator::resume(
        world.collaborators.clone(),
        &params(Some(PREFLIGHT_INTENT), None),
    )
    .await
    .unwrap();

    let state = resumed.state();
    assert_eq!(state.step, WorkflowStep::PreflightChecking);
    assert_eq!(state.intent_id.as_deref(), Some(PREFLIGHT_INTENT));
    assert!(state.deployment.is_none());
}

#[tokio::test]
async fn test_dseq_without_signer_is_refused() {
    let world = TestWorld::with_signer(None);
    let result =
        WorkflowOrchestrator::resume(world.collaborators.clone(), &params(None, Some("5"))).await;

    match result {
        Err(err) => assert_eq!(err.kind(), Some(FailureKind::PreconditionMissing)),
        Ok(_) => panic!("resume without a signer should fail"),
    }
}

#[tokio::test]
async fn test_reapplying_the_same_route_changes_nothing() {
    let world = TestWorld::new();
    let created = world
        .orchestrator()
        .create_deployment(sample_spec())
        .await
        .unwrap();
    let route = params(Some(PREFLIGHT_INTENT), Some(created.dseq.as_str()));

    let mut resumed = WorkflowOrchestrator::resume(world.collaborators.clone(), &route)
        .await
        .unwrap();
    let before = resumed.state();
    let history_len = resumed.history().len();

    resumed.apply_route(&route).await.unwrap();
    resumed.apply_route(&route).await.unwrap();

    assert_eq!(resumed.state(), before);
    assert_eq!(resumed.history().len(), history_len);
}

#[tokio::test]
async fn test_resolver_is_deterministic() {
    let route = params(Some("preflight-check"), Some("42"));
    let first = ResumptionResolver::resolve(&route, Some(OWNER)).unwrap();
    let second = ResumptionResolver::resolve(&route, Some(OWNER)).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.step, WorkflowStep::ProviderSelecting);
    assert_eq!(
        ResumptionResolver::resolve(&params(None, None), None).unwrap(),
        Resolution::configuring()
    );
}

#[tokio::test]
async fn test_file_store_survives_between_sessions() {
    let dir = TempDir::new().unwrap();
    let world = TestWorld::new();

    let file_store: Arc<dyn DeploymentStore> =
        Arc::new(FileDeploymentStore::new(dir.path().join("deployments")));
    let mut collaborators = world.collaborators.clone();
    collaborators.store = file_store;

    let created = WorkflowOrchestrator::new(collaborators.clone())
        .create_deployment(sample_spec())
        .await
        .unwrap();

    // New store handle over the same directory
    collaborators.store = Arc::new(FileDeploymentStore::new(dir.path().join("deployments")));
    let resumed =
        WorkflowOrchestrator::resume(collaborators, &params(None, Some(created.dseq.as_str())))
            .await
            .unwrap();

    assert_eq!(resumed.specification(), Some(&sample_spec()));
}
