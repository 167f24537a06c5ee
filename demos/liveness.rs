//! Wires a complete broker, runs the expiry sweeper, and serves the liveness report over HTTP.
//!
//! The upstream panel is faked with `httpmock` unless `API_URL` is set, in which case the
//! whole configuration comes from the environment. Stop with Ctrl-C.

// std
use std::sync::Arc;
// crates.io
use axum::{Json, Router, extract::State, routing::get};
use color_eyre::Result;
use httpmock::prelude::*;
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use ssh_account_broker::{
	auth::{DisplayName, UserId},
	command::IncomingUpdate,
	config::BrokerConfig,
	context::BrokerContext,
	http::ReqwestTransport,
	stats::LivenessReport,
	store::{CooldownStore, MemoryStore},
	sweeper::{Notifier, NotifyFuture},
};

type Context = Arc<BrokerContext<ReqwestTransport>>;

/// Prints readiness notices instead of sending chat messages.
struct StdoutNotifier;
impl Notifier for StdoutNotifier {
	fn notify_ready(&self, identity: UserId) -> NotifyFuture<'_> {
		Box::pin(async move {
			println!("{identity} may request a new account.");

			Ok(())
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let _panel = server
		.mock_async(|when, then| {
			when.method(POST).path("/ssh");
			then.status(201).header("content-type", "application/json").body(
				r#"{"Usuario":"demo-1","Senha":"demo-pass","Expiracao":"3 horas"}"#,
			);
		})
		.await;
	let config = match std::env::var("API_URL") {
		Ok(_) => BrokerConfig::from_env()?,
		Err(_) => BrokerConfig::builder().upstream_url(Url::parse(&server.url("/ssh"))?).build()?,
	};
	let store: Arc<dyn CooldownStore> = Arc::new(MemoryStore::default());
	let context: Context =
		Arc::new(BrokerContext::connect(config, store, Arc::new(StdoutNotifier)).await?);
	let identity = UserId::new(1001);
	let greeting = context
		.dispatcher
		.handle_update(IncomingUpdate::Command {
			chat_id: 1001,
			identity,
			display_name: DisplayName::or_user_id(Some("demo"), identity),
			command: "/get".into(),
		})
		.await;

	println!("Reply to /get: {greeting:?}.");

	let shutdown = CancellationToken::new();
	let sweeper = context.spawn_sweeper(shutdown.clone());
	let app = Router::new().route("/health", get(health)).with_state(context);
	let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;

	println!("Liveness report on http://{}/health.", listener.local_addr()?);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await?;
	shutdown.cancel();
	sweeper.await?;

	Ok(())
}

async fn health(State(context): State<Context>) -> Json<LivenessReport> {
	Json(context.liveness())
}
