use std::{
    future::IntoFuture as _,
    io,
    sync::{Arc, OnceLock},
    time,
};

use application::{
    api, config, graphql, notifier::Notifier, run_auto_completion,
    subscriptions, Args, Config,
};
use axum::{
    extract::MatchedPath,
    routing::{get, on, post, MethodFilter},
    Extension, Router,
};
use axum_client_ip::InsecureClientIp;
use futures::{future, TryFutureExt as _};
use service::{
    infra::{fanout, postgres, Postgres},
    Service,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing as log;
use tracing_subscriber::{
    filter::filter_fn,
    layer::{Layer as _, SubscriberExt as _},
    util::SubscriberInitExt as _,
};

/// Levels written to stderr rather than stdout.
const STDERR_LEVELS: &[log::Level] = &[log::Level::WARN, log::Level::ERROR];

/// Maximum level to log, known once the [`Config`] is loaded.
static LOG_LEVEL: OnceLock<log::Level> = OnceLock::new();

postgres::embed_migrations!("../migrations");

#[tokio::main]
async fn main() {
    init_logging();

    _ = run().await;
}

/// Installs the global [`tracing`] subscriber splitting output between
/// stdout and stderr by level.
fn init_logging() {
    let enabled = |to_stderr: bool| {
        filter_fn(move |meta| {
            let level = LOG_LEVEL.get().copied().unwrap_or(log::Level::INFO);
            meta.is_span()
                || STDERR_LEVELS.contains(meta.level()) == to_stderr
                    && level >= *meta.level()
        })
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_thread_names(true)
                .with_writer(io::stdout)
                .with_filter(enabled(false)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_thread_names(true)
                .with_writer(io::stderr)
                .with_filter(enabled(true)),
        )
        .init();
}

/// Loads the [`Config`], prepares the storage, and serves the API along
/// with the [`Service`] background tasks until shutdown.
async fn run() -> Result<(), ()> {
    let Args { config } = Args::parse().map_err(|e| {
        log::error!("failed to parse command line arguments: {e}");
    })?;

    let Config {
        server,
        api: api_conf,
        service,
        notifier,
        postgres,
        log,
    } = Config::new(config).map_err(|e| {
        log::error!("failed to load `Config`: {e}");
    })?;

    LOG_LEVEL
        .set(log.level.into())
        .unwrap_or_else(|_| unreachable!("first initialization"));

    let mut postgres = Postgres::new(&postgres.into()).map_err(|e| {
        log::error!("failed to initialize `Postgres` client: {e}");
    })?;
    migrations::runner()
        .run_async(&mut postgres)
        .await
        .map_err(|e| log::error!("failed to run database migrations: {e}"))?;

    let notifier = Notifier::new(notifier).map_err(|e| {
        log::error!("failed to initialize `Notifier`: {e}");
    })?;

    let (service, background) = Service::new(
        service.into(),
        postgres,
        fanout::Memory::default(),
        notifier,
    );

    let app = Router::new()
        .route(
            "/graphql",
            on(MethodFilter::GET.or(MethodFilter::POST), graphql),
        )
        .route("/subscriptions", get(subscriptions))
        .route("/tasks/auto-completion", post(run_auto_completion))
        .layer(Extension(Arc::new(api::Schema::new(
            api::Query,
            api::Mutation,
            api::Subscription,
        ))))
        .layer(Extension(Arc::new(api_conf)))
        .layer(Extension(service))
        .layer(cors(&server.cors)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(http_span)
                .on_response(record_response),
        );

    let addr = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        log::error!("failed to listen on `{addr}`: {e}");
    })?;
    log::info!("listening on `{addr}`");

    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future()
        .map_err(|e| log::error!("webserver failed: {e}"));
    let background = background
        .into_future()
        .map_err(|e| log::error!("{e}"));

    match future::select(Box::pin(serve), Box::pin(background)).await {
        future::Either::Left((res, _)) => res,
        future::Either::Right((Ok(()), serve)) => serve.await,
        future::Either::Right((Err(()), _)) => Err(()),
    }
}

/// Builds the [`CorsLayer`] allowing the configured origins.
///
/// A `*` origin allows any.
fn cors(conf: &config::Cors) -> Result<CorsLayer, ()> {
    let origins = if conf.origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        conf.origins
            .iter()
            .map(|origin| {
                origin.parse::<http::header::HeaderValue>().map_err(|e| {
                    log::error!("`{origin}` is not a valid CORS origin: {e}");
                })
            })
            .collect::<Result<Vec<_>, _>>()?
            .into()
    };

    Ok(CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::OPTIONS,
            http::Method::POST,
        ])
        .allow_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
        ])
        .allow_origin(origins))
}

/// Creates the [`tracing::Span`] of the provided HTTP request.
fn http_span<B>(req: &http::Request<B>) -> tracing::Span {
    let client_ip = InsecureClientIp::from(req.headers(), req.extensions())
        .map(|ip| ip.0.to_string())
        .ok();

    tracing::info_span!(
        "HTTP request",
        http.client_ip = client_ip,
        http.method = req.method().as_str(),
        http.route = req
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str),
        http.target = req
            .uri()
            .path_and_query()
            .map(http::uri::PathAndQuery::as_str),
        http.user_agent = req
            .headers()
            .get(http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok()),
        http.status_code = tracing::field::Empty,
    )
}

/// Records the status code and duration of the provided HTTP response.
fn record_response<B>(
    res: &http::Response<B>,
    dur: time::Duration,
    span: &tracing::Span,
) {
    let status = res.status();
    _ = span.record("http.status_code", status.as_u16());

    let duration = format!("{}ms", dur.as_millis());
    if status.is_client_error() || status.is_server_error() {
        log::warn!(%duration);
    } else {
        log::info!(%duration);
    }
}

/// Resolves once the process is asked to terminate.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
        future::pending::<()>().await;
    }
    log::info!("shutting down");
}
