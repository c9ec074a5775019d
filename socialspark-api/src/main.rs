use serde::Deserialize;
use server::ServerState;
use socialspark_client::{
    Coordinator, CoordinatorConfig, MockRemote,
    remote::mock::{FailureInjection, MockRemoteConfig},
};
use socialspark_common::{
    model::{
        Id, ModelValidationError,
        user::{Session, User, UserHandle, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ModelValidationError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_remote_latency_ms() -> u64 {
    300
}

fn default_remote_timeout_ms() -> u64 {
    10_000
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    session_user_id: Id<UserMarker>,
    session_user_handle: UserHandle,
    #[serde(default)]
    session_user_avatar: Option<String>,
    #[serde(default)]
    worker_id: WorkerId,
    #[serde(default)]
    process_id: ProcessId,
    #[serde(default = "default_remote_latency_ms")]
    remote_latency_ms: u64,
    /// Share of remote calls that fail on purpose, between 0 and 1.
    #[serde(default)]
    remote_failure_rate: f64,
    #[serde(default = "default_remote_timeout_ms")]
    remote_timeout_ms: u64,
}

impl Env {
    fn session(&self) -> Session {
        Session::new(User {
            id: self.session_user_id,
            handle: self.session_user_handle.clone(),
            avatar: self.session_user_avatar.clone(),
        })
    }

    fn remote_config(&self) -> MockRemoteConfig {
        let failures = if self.remote_failure_rate > 0.0 {
            FailureInjection::Random {
                rate: self.remote_failure_rate,
            }
        } else {
            FailureInjection::Never
        };

        MockRemoteConfig {
            worker_id: self.worker_id,
            process_id: self.process_id,
            latency: Duration::from_millis(self.remote_latency_ms),
            failures,
        }
    }

    fn coordinator_config(&self) -> Result<CoordinatorConfig, InitError> {
        let remote_timeout = PositiveDuration::from_millis(self.remote_timeout_ms)
            .map_err(ModelValidationError::from)?;

        Ok(CoordinatorConfig {
            remote_timeout,
            ..CoordinatorConfig::default()
        })
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "socialspark_api=debug,\
                socialspark_client=debug,\
                socialspark_store=debug,\
                tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Could not listen for shutdown signal");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let coordinator = Coordinator::new(
        MockRemote::new(env.remote_config()),
        env.coordinator_config()?,
    );
    let settlements = TaskTracker::new();
    let state = ServerState {
        coordinator,
        session: env.session(),
        settlements: settlements.clone(),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    settlements.close();
    debug!(pending = settlements.len(), "Waiting for outstanding mutations");
    settlements.wait().await;

    Ok(())
}
