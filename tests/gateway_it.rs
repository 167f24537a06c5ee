// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use httpmock::prelude::*;
// self
use ssh_account_broker::{
	_preludet::*,
	auth::{DisplayName, UserId},
	broker::GrantRequest,
	config::BrokerConfig,
	error::UpstreamError,
	gateway::Gateway,
	http::{ReqwestTransport, TransportFuture, UpstreamTransport},
};

/// Wraps the reqwest transport and records the highest number of overlapping calls.
#[derive(Default)]
struct HighWaterTransport {
	inner: ReqwestTransport,
	current: AtomicUsize,
	peak: AtomicUsize,
}
impl HighWaterTransport {
	fn new() -> Self {
		Self { inner: test_reqwest_transport(), ..Default::default() }
	}
}
impl UpstreamTransport for HighWaterTransport {
	fn post_json<'a>(&'a self, url: &'a Url, body: &'a serde_json::Value) -> TransportFuture<'a> {
		Box::pin(async move {
			let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;

			self.peak.fetch_max(now, Ordering::SeqCst);

			let response = self.inner.post_json(url, body).await;

			self.current.fetch_sub(1, Ordering::SeqCst);

			response
		})
	}
}

fn request(id: i64) -> GrantRequest {
	let identity = UserId::new(id);

	GrantRequest::new(identity, DisplayName::or_user_id(None, identity))
}

fn config(upstream: &str, bound: usize, timeout: Duration) -> BrokerConfig {
	BrokerConfig::builder()
		.upstream_url(Url::parse(upstream).expect("Mock upstream URL should parse."))
		.max_concurrent_requests(bound)
		.request_timeout(timeout)
		.build()
		.expect("Gateway config should build successfully.")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_the_bound() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/ssh");
			then.status(201)
				.body(r#"{"Usuario":"u","Senha":"s","Expiracao":"3h"}"#)
				.delay(std::time::Duration::from_millis(150));
		})
		.await;
	let transport = Arc::new(HighWaterTransport::new());
	let gateway = Arc::new(Gateway::<HighWaterTransport>::with_transport(
		&config(&server.url("/ssh"), 2, Duration::seconds(5)),
		transport.clone(),
	));
	let started = std::time::Instant::now();
	let mut handles = Vec::new();

	for id in 0..6 {
		let gateway = gateway.clone();

		handles.push(tokio::spawn(async move { gateway.request_credential(&request(id)).await }));
	}

	for handle in handles {
		handle
			.await
			.expect("Gateway task should not panic.")
			.expect("Every queued call should eventually succeed.");
	}

	let peak = transport.peak.load(Ordering::SeqCst);

	assert!((1..=2).contains(&peak), "Peak concurrency {peak} exceeded the bound.");
	assert!(
		started.elapsed() >= std::time::Duration::from_millis(450),
		"Six calls through two slots need at least three delay rounds."
	);
	assert_eq!(gateway.in_flight(), 0);
	assert_eq!(gateway.capacity(), 2);

	mock.assert_calls_async(6).await;
}

#[tokio::test]
async fn slow_upstream_times_out() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/ssh");
			then.status(200).body("{}").delay(std::time::Duration::from_millis(1_500));
		})
		.await;
	let gateway = Gateway::<ReqwestTransport>::with_transport(
		&config(&server.url("/ssh"), 1, Duration::milliseconds(200)),
		test_reqwest_transport(),
	);
	let err = gateway
		.request_credential(&request(1))
		.await
		.expect_err("A call slower than the timeout should fail.");

	assert!(matches!(
		err,
		UpstreamError::Timeout { timeout } if timeout == Duration::milliseconds(200)
	));
	assert_eq!(gateway.in_flight(), 0, "A timed-out call must release its slot.");
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_error() {
	let gateway = Gateway::<ReqwestTransport>::with_transport(
		&config("http://127.0.0.1:1/ssh", 1, Duration::seconds(2)),
		test_reqwest_transport(),
	);
	let err = gateway
		.request_credential(&request(1))
		.await
		.expect_err("A closed port should fail the call.");

	assert_eq!(err.kind(), "transport");
}

#[tokio::test]
async fn rejected_status_keeps_body_for_logs() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/ssh");
			then.status(429).body("slow down");
		})
		.await;
	let gateway = Gateway::<ReqwestTransport>::with_transport(
		&config(&server.url("/ssh"), 1, Duration::seconds(2)),
		test_reqwest_transport(),
	);
	let err = gateway
		.request_credential(&request(1))
		.await
		.expect_err("A 429 should be rejected.");

	assert!(matches!(err, UpstreamError::Rejected { status: 429, ref body } if body == "slow down"));
}
