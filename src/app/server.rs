//! Server lifecycle: bind, run, stop

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::config::Config;
use crate::game::arena::ArenaHandle;
use crate::game::simulation::run_simulation;
use crate::net::listener::accept_loop;
use crate::util::time::tick_period;

use super::state::AppState;

/// Faults that stop the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("arena task stopped unexpectedly")]
    ArenaStopped,

    #[error("server task panicked: {0}")]
    TaskPanicked(#[from] JoinError),
}

/// A running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: AppState,
    listener: JoinHandle<Result<(), ServerError>>,
    simulation: JoinHandle<()>,
}

/// Bind the listener and start the arena, simulation and admission tasks
pub async fn start(config: Config) -> Result<ServerHandle, ServerError> {
    let addr = config.server_addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let state = AppState::new(config);

    let simulation = tokio::spawn(run_simulation(
        state.arena.clone(),
        tick_period(state.config.tick_hz),
        state.shutdown.clone(),
    ));
    let listener = tokio::spawn(accept_loop(listener, state.clone()));

    info!(
        addr = %local_addr,
        tick_hz = state.config.tick_hz,
        "Server listening"
    );

    Ok(ServerHandle {
        local_addr,
        state,
        listener,
        simulation,
    })
}

impl ServerHandle {
    /// Address actually bound, useful when the port was 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn arena(&self) -> &ArenaHandle {
        &self.state.arena
    }

    /// Run until `signal` completes or admission fails, then stop
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let admission = tokio::select! {
            joined = &mut self.listener => Some(flatten(joined)),
            _ = signal => None,
        };

        match admission {
            Some(result) => {
                if let Err(e) = &result {
                    error!(error = %e, "Admission failed, shutting down");
                }
                self.state.shutdown.cancel();
                self.finish(result).await
            }
            None => self.stop().await,
        }
    }

    /// Stop accepting, close every connection and wait for all tasks
    pub async fn stop(self) -> Result<(), ServerError> {
        info!("Stopping server");
        let ServerHandle {
            state,
            listener,
            simulation,
            ..
        } = self;
        state.shutdown.cancel();
        let admission = flatten(listener.await);
        drain(state, simulation, admission).await
    }

    async fn finish(self, admission: Result<(), ServerError>) -> Result<(), ServerError> {
        drain(self.state, self.simulation, admission).await
    }
}

async fn drain(
    state: AppState,
    simulation: JoinHandle<()>,
    admission: Result<(), ServerError>,
) -> Result<(), ServerError> {
    state.tasks.close();
    state.tasks.wait().await;
    simulation.await?;

    info!(
        remaining_players = state.arena.player_count(),
        "Server stopped"
    );
    admission
}

fn flatten(joined: Result<Result<(), ServerError>, JoinError>) -> Result<(), ServerError> {
    joined.unwrap_or_else(|e| Err(ServerError::TaskPanicked(e)))
}
