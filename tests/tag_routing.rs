mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{GatedTransport, ScriptedTransport, echo, expired, gated, raw};
use serde_json::json;
use tokio::sync::Notify;
use transmission_rpc::rpc::{
    Envelope, RpcClient, RpcError, TagCorrelator, TorrentIds, TorrentRemoveRequest,
};

fn success(tag: u64) -> Envelope {
    Envelope {
        tag: Some(tag),
        result: Some("success".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn later_response_unblocks_only_its_caller() {
    let correlator = TagCorrelator::new();
    let first = correlator.register_next();
    let second = correlator.register_next();
    assert_eq!((first.tag(), second.tag()), (1, 2));

    let waiting_first = tokio::spawn(first.wait());
    let waiting_second = tokio::spawn(second.wait());

    correlator.resolve(2, Ok(success(2))).unwrap();
    let envelope = waiting_second.await.unwrap().unwrap();
    assert_eq!(envelope.tag, Some(2));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiting_first.is_finished());
    assert!(correlator.is_pending(1));

    correlator.resolve(1, Ok(success(1))).unwrap();
    assert_eq!(waiting_first.await.unwrap().unwrap().tag, Some(1));
}

#[tokio::test]
async fn concurrent_requests_get_distinct_tags() {
    let transport = Arc::new(GatedTransport::default());
    let client = RpcClient::new(transport.clone());

    let calls: Vec<_> = (0..16)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.request("session-get", ()).await })
        })
        .collect();
    for call in calls {
        call.await.unwrap().unwrap();
    }

    let tags: HashSet<u64> = transport.sent().iter().map(|s| s.tag()).collect();
    assert_eq!(tags.len(), 16);
    assert_eq!(client.correlator().pending_count(), 0);
}

#[tokio::test]
async fn slow_request_does_not_block_fast_one() {
    let transport = Arc::new(GatedTransport::default());
    let client = RpcClient::new(transport.clone());

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .request("torrent-verify", TorrentIds::All)
                .await
        })
    };
    while transport.sent().is_empty() {
        tokio::task::yield_now().await;
    }

    let fast = client.request("session-get", ()).await.unwrap();
    assert_eq!(fast.arguments.unwrap()["method"], "session-get");
    assert!(!slow.is_finished());

    transport.gate.notify_one();
    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.arguments.unwrap()["method"], "torrent-verify");
}

#[tokio::test]
async fn dropped_caller_releases_tag() {
    let transport = Arc::new(GatedTransport::default());
    let client = RpcClient::new(transport.clone());

    let call = client.request("torrent-verify", TorrentIds::All);
    let timed_out = tokio::time::timeout(Duration::from_millis(20), call).await;
    assert!(timed_out.is_err());
    assert_eq!(client.correlator().pending_count(), 0);

    // The abandoned exchange still completes; its response is dropped.
    transport.gate.notify_one();
    let next = client.request("session-get", ()).await.unwrap();
    assert_eq!(next.arguments.unwrap()["method"], "session-get");
}

#[tokio::test]
async fn abandoned_request_is_not_resent_after_expiry() {
    let gate = Arc::new(Notify::new());
    let transport = ScriptedTransport::new(vec![
        gated(&gate, expired("fresh")),
        echo(json!({"method": "session-get"})),
    ]);
    let client = RpcClient::new(transport.clone());

    let remove = client.torrent_remove(TorrentRemoveRequest {
        ids: TorrentIds::parse_list(["3"]),
        delete_local_data: Some(true),
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(20), remove).await;
    assert!(timed_out.is_err());
    assert_eq!(transport.sent().len(), 1);

    // The 409 arrives after the caller is gone.
    gate.notify_one();
    while client.session().current().is_none() {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.sent().len(), 1);

    // The stored token serves the next request, and the script step meant
    // for a retry is still unused.
    let next = client.request("session-get", ()).await.unwrap();
    assert_eq!(next.arguments.unwrap()["method"], "session-get");
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].json()["method"], "session-get");
    assert_eq!(sent[1].token.as_deref(), Some("fresh"));
}

#[tokio::test]
async fn foreign_tag_never_reaches_its_owner() {
    let gate = Arc::new(Notify::new());
    let transport = ScriptedTransport::new(vec![
        gated(
            &gate,
            raw(json!({"result": "success", "tag": 1, "arguments": {"answer": "torrent-verify"}})),
        ),
        raw(json!({"result": "success", "tag": 1, "arguments": {"answer": "session-get"}})),
    ]);
    let client = RpcClient::new(transport.clone());

    let verify = {
        let client = client.clone();
        tokio::spawn(async move { client.request("torrent-verify", TorrentIds::All).await })
    };
    while transport.sent().is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.sent()[0].tag(), 1);

    let err = client.request("session-get", ()).await.unwrap_err();
    assert!(matches!(err, RpcError::UnmatchedTag(1)), "{err:?}");
    assert!(!verify.is_finished());
    assert!(client.correlator().is_pending(1));

    gate.notify_one();
    let verify = verify.await.unwrap().unwrap();
    assert_eq!(verify.arguments.unwrap()["answer"], "torrent-verify");
}

#[tokio::test]
async fn mismatched_response_tag_is_reported() {
    let transport = ScriptedTransport::new(vec![raw(json!({
        "result": "success",
        "arguments": {},
        "tag": 99,
    }))]);
    let client = RpcClient::new(transport);

    let err = client.request("session-get", ()).await.unwrap_err();
    assert!(matches!(err, RpcError::UnmatchedTag(99)));
    assert_eq!(client.correlator().pending_count(), 0);
}

#[tokio::test]
async fn untagged_response_belongs_to_its_request() {
    let transport = ScriptedTransport::new(vec![raw(json!({
        "result": "success",
        "arguments": {"version": "4.0.5"},
    }))]);
    let client = RpcClient::new(transport);

    let response = client.request("session-get", ()).await.unwrap();
    assert_eq!(response.arguments.unwrap()["version"], "4.0.5");
}
