use beacon_core::{SessionId, SessionRole};
use beacon_server::{SessionError, SessionPhase};

use crate::integration::{create_test_negotiator, init_tracing};
use crate::utils::{MediaCall, TEST_OFFER, wait_for_response};

#[tokio::test]
async fn test_presenter_is_accepted() {
    init_tracing();

    let (negotiator, media, _signaling, mut signal_rx) = create_test_negotiator();
    let presenter = SessionId(1);

    negotiator.presenter(presenter, TEST_OFFER.to_owned()).await;

    let response = wait_for_response(&mut signal_rx, presenter, SessionRole::Presenter)
        .await
        .expect("No presenter response");
    assert_eq!(response, Ok("answer-for-pipeline-1/endpoint-2".to_owned()));

    assert_eq!(negotiator.presenter_session().await, Some(presenter));
    assert_eq!(negotiator.phase(presenter).await, SessionPhase::Active);
    assert_eq!(media.connects(), 1);

    let endpoint = "pipeline-1/endpoint-2".to_owned();
    let calls = media.calls();
    assert_eq!(calls[0], MediaCall::CreatePipeline);
    assert_eq!(
        calls[1],
        MediaCall::CreateEndpoint {
            pipeline: "pipeline-1".to_owned()
        }
    );
    assert!(calls.contains(&MediaCall::Subscribe {
        endpoint: endpoint.clone()
    }));
    assert!(calls.contains(&MediaCall::ProcessOffer {
        endpoint: endpoint.clone()
    }));
    assert!(calls.contains(&MediaCall::GatherCandidates { endpoint }));
}

#[tokio::test]
async fn test_second_presenter_is_rejected() {
    init_tracing();

    let (negotiator, media, signaling, mut signal_rx) = create_test_negotiator();
    let first = SessionId(1);
    let second = SessionId(2);

    negotiator
        .start_presenter(first, TEST_OFFER)
        .await
        .expect("First presenter should be accepted");

    negotiator.presenter(second, TEST_OFFER.to_owned()).await;

    let response = wait_for_response(&mut signal_rx, second, SessionRole::Presenter)
        .await
        .expect("No presenter response");
    assert_eq!(response, Err(SessionError::PresenterBusy.to_string()));
    assert_eq!(
        signaling.rejections_for(second).await,
        vec!["Another user is currently acting as presenter. Try again later ..."]
    );

    assert_eq!(negotiator.presenter_session().await, Some(first));
    assert_eq!(negotiator.phase(first).await, SessionPhase::Active);
    assert_eq!(media.pipelines().len(), 1);
}

#[tokio::test]
async fn test_repeated_presenter_request_stops_own_broadcast() {
    init_tracing();

    let (negotiator, media, _signaling, _signal_rx) = create_test_negotiator();
    let presenter = SessionId(1);

    negotiator
        .start_presenter(presenter, TEST_OFFER)
        .await
        .expect("Presenter should be accepted");

    let result = negotiator.start_presenter(presenter, TEST_OFFER).await;
    assert!(matches!(result, Err(SessionError::PresenterBusy)));

    assert_eq!(negotiator.presenter_session().await, None);
    assert!(media.is_released("pipeline-1"));
    assert_eq!(media.closes(), 1);
}
