use beacon_core::SessionId;
use beacon_server::SessionError;
use futures::future::join_all;

use crate::integration::{create_test_negotiator, init_tracing};
use crate::utils::TEST_OFFER;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_presenters_have_single_winner() {
    init_tracing();

    let (negotiator, media, _signaling, _signal_rx) = create_test_negotiator();

    let attempts = (1..=8).map(|n| {
        let negotiator = negotiator.clone();
        tokio::spawn(async move { (n, negotiator.start_presenter(SessionId(n), TEST_OFFER).await) })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.expect("Presenter task panicked"))
        .collect();

    let winners: Vec<u64> = results
        .iter()
        .filter(|(_, result)| result.is_ok())
        .map(|(n, _)| *n)
        .collect();
    assert_eq!(winners.len(), 1, "Exactly one presenter should win");

    for (_, result) in results.iter().filter(|(_, result)| result.is_err()) {
        assert!(matches!(result, Err(SessionError::PresenterBusy)));
    }

    assert_eq!(negotiator.presenter_session().await, Some(SessionId(winners[0])));
    assert_eq!(media.pipelines().len(), 1);
    assert_eq!(media.connects(), 1);
}
