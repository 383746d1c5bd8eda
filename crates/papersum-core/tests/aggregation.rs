//! End-to-end behaviour of both aggregation methods through
//! [`summarize_chunks`], driven by the recording [`MockClient`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use papersum_core::llm::mock::{MockClient, MockReply};
use papersum_core::prompts::SYSTEM_PROMPT;
use papersum_core::{
    Chunk, CompletionError, Config, Phase, ProgressEvent, Role, RunContext, SummaryError,
    summarize_chunks,
};
use tokio_util::sync::CancellationToken;

fn doc(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk::new(i, format!("text of page {i}.")))
        .collect()
}

/// Replies "out-<call number>" so each call's output is recognizable.
fn numbered() -> MockClient {
    MockClient::from_fn(|n, _| MockReply::text(format!("out-{n}")))
}

#[tokio::test]
async fn refine_threads_each_output_into_the_next_call() {
    let mock = numbered();
    let summary = summarize_chunks(&doc(4), &mock, "refine", &Config::default(), &RunContext::default())
        .await
        .unwrap();

    assert_eq!(summary, "out-3");
    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 4);
    for k in 1..4 {
        assert!(prompts[k].contains(&format!("out-{}", k - 1)));
        assert!(prompts[k].contains(&format!("text of page {k}.")));
    }
}

#[tokio::test]
async fn reduce_maps_every_chunk_then_synthesizes_once() {
    let mock = numbered();
    let config = Config {
        map_concurrency: 1,
        ..Config::default()
    };
    let summary = summarize_chunks(&doc(3), &mock, "reduce", &config, &RunContext::default())
        .await
        .unwrap();

    assert_eq!(summary, "out-3");
    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 4);
    for (i, p) in prompts[..3].iter().enumerate() {
        assert!(p.contains(&format!("text of page {i}.")));
        assert_eq!(p.matches("text of page").count(), 1);
    }
    assert!(prompts[3].contains("out-0\n\nout-1\n\nout-2"));
}

#[tokio::test]
async fn every_call_carries_the_system_message() {
    let mock = numbered();
    summarize_chunks(&doc(2), &mock, "reduce", &Config::default(), &RunContext::default())
        .await
        .unwrap();
    for call in mock.calls() {
        assert_eq!(call[0].role, Role::System);
        assert_eq!(call[0].content, SYSTEM_PROMPT);
    }
}

#[tokio::test]
async fn empty_input_makes_zero_calls_for_both_methods() {
    for method in ["refine", "reduce"] {
        let mock = numbered();
        let err = summarize_chunks(&[], &mock, method, &Config::default(), &RunContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::EmptyInput), "{method}: {err:?}");
        assert_eq!(mock.call_count(), 0);
    }
}

#[tokio::test]
async fn unknown_selector_makes_zero_calls() {
    let mock = numbered();
    let err = summarize_chunks(&doc(3), &mock, "summarize", &Config::default(), &RunContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SummaryError::UnknownMethod(ref m) if m == "summarize"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn refine_failure_stops_later_steps() {
    let mock = MockClient::with_sequence(vec![
        MockReply::text("first"),
        MockReply::Fail(CompletionError::Api {
            status: 500,
            body: "upstream".into(),
        }),
        MockReply::text("never"),
    ]);
    let err = summarize_chunks(&doc(5), &mock, "refine", &Config::default(), &RunContext::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SummaryError::Completion(CompletionError::Api { status: 500, .. })
    ));
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn reduce_failure_discards_partials() {
    let mock = MockClient::from_fn(|n, _| {
        if n < 3 {
            MockReply::text(format!("partial-{n}"))
        } else {
            MockReply::Fail(CompletionError::RateLimited { retry_after: None })
        }
    });
    let err = summarize_chunks(&doc(3), &mock, "reduce", &Config::default(), &RunContext::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SummaryError::Completion(CompletionError::RateLimited { .. })
    ));
    assert_eq!(mock.call_count(), 4);
}

#[tokio::test]
async fn empty_reply_mid_refine_is_an_error() {
    let mock = MockClient::with_sequence(vec![MockReply::text("first"), MockReply::text("")]);
    let err = summarize_chunks(&doc(3), &mock, "refine", &Config::default(), &RunContext::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SummaryError::Completion(CompletionError::EmptyResponse)
    ));
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn deterministic_replies_give_identical_summaries() {
    for method in ["refine", "reduce"] {
        let a = summarize_chunks(&doc(3), &numbered(), method, &Config::default(), &RunContext::default())
            .await
            .unwrap();
        let b = summarize_chunks(&doc(3), &numbered(), method, &Config::default(), &RunContext::default())
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn single_chunk_call_counts() {
    let refine = numbered();
    summarize_chunks(&doc(1), &refine, "refine", &Config::default(), &RunContext::default())
        .await
        .unwrap();
    assert_eq!(refine.call_count(), 1);

    let reduce = numbered();
    summarize_chunks(&doc(1), &reduce, "reduce", &Config::default(), &RunContext::default())
        .await
        .unwrap();
    assert_eq!(reduce.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_call_times_out() {
    let mock = MockClient::new(MockReply::text("late")).with_delay(Duration::from_secs(600));
    let config = Config {
        call_timeout_secs: 30,
        ..Config::default()
    };
    let ctx = RunContext::default().with_timeout(config.call_timeout());
    let err = summarize_chunks(&doc(2), &mock, "reduce", &config, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SummaryError::Completion(CompletionError::Timeout(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_outstanding_calls() {
    let mock = MockClient::new(MockReply::text("slow")).with_delay(Duration::from_secs(10));
    let cancel = CancellationToken::new();
    let ctx = RunContext::default()
        .with_cancel(cancel.clone())
        .with_timeout(None);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = summarize_chunks(&doc(3), &mock, "refine", &Config::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, SummaryError::Cancelled));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_reduce_mid_map() {
    let mock = MockClient::new(MockReply::text("slow")).with_delay(Duration::from_secs(10));
    let cancel = CancellationToken::new();
    let ctx = RunContext::default()
        .with_cancel(cancel.clone())
        .with_timeout(None);
    let config = Config {
        map_concurrency: 2,
        ..Config::default()
    };

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = summarize_chunks(&doc(4), &mock, "reduce", &config, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, SummaryError::Cancelled));
    // Two map calls were in flight; the other pages and the reduce never ran.
    assert_eq!(mock.call_count(), 2);
    assert!(mock.prompts().iter().all(|p| p.contains("text of page")));
}

#[tokio::test]
async fn progress_reports_each_step() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let ctx = RunContext::new("paper").with_progress(Arc::new(move |e: ProgressEvent| {
        if let ProgressEvent::Step { phase, completed, total, .. } = e {
            sink.lock().unwrap().push((phase, completed, total));
        }
    }));

    let config = Config {
        map_concurrency: 1,
        ..Config::default()
    };
    summarize_chunks(&doc(2), &numbered(), "reduce", &config, &ctx)
        .await
        .unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec![(Phase::Map, 1, 3), (Phase::Map, 2, 3), (Phase::Reduce, 3, 3)]
    );

    events.lock().unwrap().clear();
    summarize_chunks(&doc(2), &numbered(), "refine", &config, &ctx)
        .await
        .unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec![(Phase::Initial, 1, 2), (Phase::Refine, 2, 2)]
    );
}
