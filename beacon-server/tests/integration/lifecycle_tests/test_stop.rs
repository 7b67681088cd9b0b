use beacon_core::SessionId;
use beacon_server::SessionPhase;

use crate::integration::{create_test_negotiator, init_tracing};
use crate::utils::TEST_OFFER;

#[tokio::test]
async fn test_presenter_stop_notifies_viewers() {
    init_tracing();

    let (negotiator, media, signaling, _signal_rx) = create_test_negotiator();
    let presenter = SessionId(1);
    let viewers = [SessionId(2), SessionId(3)];

    negotiator
        .start_presenter(presenter, TEST_OFFER)
        .await
        .expect("Presenter should be accepted");
    for viewer in viewers {
        negotiator
            .start_viewer(viewer, TEST_OFFER)
            .await
            .expect("Viewer should be accepted");
    }

    negotiator.stop(presenter).await;

    for viewer in viewers {
        assert_eq!(signaling.stop_count_for(viewer).await, 1);
        assert_eq!(negotiator.phase(viewer).await, SessionPhase::Idle);
    }
    assert_eq!(signaling.stop_count_for(presenter).await, 0);

    assert!(media.is_released("pipeline-1"));
    assert_eq!(negotiator.presenter_session().await, None);
    assert_eq!(negotiator.viewer_count().await, 0);
    assert_eq!(media.closes(), 1);
}

#[tokio::test]
async fn test_viewer_stop_releases_only_its_endpoint() {
    init_tracing();

    let (negotiator, media, signaling, _signal_rx) = create_test_negotiator();
    let presenter = SessionId(1);
    let viewer = SessionId(2);

    negotiator
        .start_presenter(presenter, TEST_OFFER)
        .await
        .expect("Presenter should be accepted");
    negotiator
        .start_viewer(viewer, TEST_OFFER)
        .await
        .expect("Viewer should be accepted");

    negotiator.stop(viewer).await;

    assert_eq!(media.released(), vec!["pipeline-1/endpoint-3"]);
    assert_eq!(negotiator.viewer_count().await, 0);
    assert_eq!(negotiator.phase(presenter).await, SessionPhase::Active);
    assert_eq!(signaling.stop_count_for(viewer).await, 0);
    assert_eq!(media.closes(), 0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    init_tracing();

    let (negotiator, media, signaling, _signal_rx) = create_test_negotiator();
    let presenter = SessionId(1);

    negotiator.stop(SessionId(5)).await;
    negotiator.stop(SessionId(5)).await;
    assert!(media.calls().is_empty());
    assert!(signaling.signals_for(SessionId(5)).await.is_empty());

    negotiator
        .start_presenter(presenter, TEST_OFFER)
        .await
        .expect("Presenter should be accepted");
    negotiator.stop(presenter).await;
    negotiator.stop(presenter).await;

    assert_eq!(media.released(), vec!["pipeline-1"]);
    assert_eq!(media.closes(), 1);
}

#[tokio::test]
async fn test_client_is_recreated_after_close() {
    init_tracing();

    let (negotiator, media, _signaling, _signal_rx) = create_test_negotiator();

    negotiator
        .start_presenter(SessionId(1), TEST_OFFER)
        .await
        .expect("First presenter should be accepted");
    negotiator.stop(SessionId(1)).await;
    assert_eq!(media.closes(), 1);

    negotiator
        .start_presenter(SessionId(2), TEST_OFFER)
        .await
        .expect("Second presenter should be accepted");

    assert_eq!(media.connects(), 2);
    assert_eq!(media.closes(), 1);
    assert_eq!(negotiator.presenter_session().await, Some(SessionId(2)));
}

#[tokio::test]
async fn test_shutdown_ends_broadcast() {
    init_tracing();

    let (negotiator, media, signaling, _signal_rx) = create_test_negotiator();
    let viewer = SessionId(2);

    negotiator
        .start_presenter(SessionId(1), TEST_OFFER)
        .await
        .expect("Presenter should be accepted");
    negotiator
        .start_viewer(viewer, TEST_OFFER)
        .await
        .expect("Viewer should be accepted");

    negotiator.shutdown().await;

    assert_eq!(signaling.stop_count_for(viewer).await, 1);
    assert_eq!(negotiator.presenter_session().await, None);
    assert_eq!(media.closes(), 1);

    negotiator.shutdown().await;
    assert_eq!(media.closes(), 1);
}
