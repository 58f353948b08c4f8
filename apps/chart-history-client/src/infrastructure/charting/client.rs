//! Chart Client
//!
//! Facade wiring sign-in, the socket fetch service and the REST endpoints
//! around one [`ClientSession`]. The session (token plus session ids) is
//! fixed for the client's lifetime.

use std::time::Instant;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::auth::SessionAuthenticator;
use super::rest::{RestClient, RestError};
use super::transport::{DEFAULT_USER_AGENT, WsConnector};
use crate::application::ports::ChartConnector;
use crate::application::services::{HistoryError, HistoryService};
use crate::domain::bar::Bar;
use crate::domain::request::HistoryRequest;
use crate::domain::search::{SearchParams, SearchResponse};
use crate::domain::session::ClientSession;
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::metrics::{self, FetchPath};

/// Errors building a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Market-data acquisition client.
///
/// `Send + Sync`; share it behind an `Arc` for concurrent fetches. Each
/// fetch owns its connection.
pub struct ChartClient<C = WsConnector> {
    session: ClientSession,
    history: HistoryService<C>,
    rest: RestClient,
}

impl ChartClient<WsConnector> {
    /// Sign in (falling back to anonymous) and build a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built. Sign-in
    /// failures are not errors.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = build_http_client()?;
        let authenticator = SessionAuthenticator::new(
            http.clone(),
            config.endpoints.signin_url(),
            config.endpoints.origin(),
        );
        let token = authenticator.authenticate(&config.credentials).await;
        let session = ClientSession::new(token);

        tracing::info!(
            anonymous = session.is_anonymous(),
            chart_session = %session.chart_session(),
            "Chart client ready"
        );

        Ok(Self::assemble(
            config,
            session,
            http,
            WsConnector::new(config.connector_config()),
        ))
    }
}

impl<C: ChartConnector> ChartClient<C> {
    /// Build a client over a custom connector with an existing session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_connector(
        config: &ClientConfig,
        session: ClientSession,
        connector: C,
    ) -> Result<Self, ClientError> {
        Ok(Self::assemble(config, session, build_http_client()?, connector))
    }

    fn assemble(config: &ClientConfig, session: ClientSession, http: Client, connector: C) -> Self {
        Self {
            session,
            history: HistoryService::new(connector, config.history_policy()),
            rest: RestClient::new(
                http,
                config.endpoints.search_endpoint(),
                config.endpoints.history_endpoint(),
                config.endpoints.origin(),
                config.fetch.http_timeout,
            ),
        }
    }

    /// Session used for every socket fetch.
    #[must_use]
    pub const fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Fetch historical bars over the streaming socket.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Exhausted`] once every attempt has failed,
    /// or [`HistoryError::Cancelled`] if `cancel` fires.
    pub async fn get_historical_data(
        &self,
        request: &HistoryRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Bar>, HistoryError> {
        self.history.fetch(&self.session, request, cancel).await
    }

    /// Fetch historical bars from the columnar REST endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, an
    /// undecodable body or unequal column lengths.
    pub async fn get_historical_data_rest(
        &self,
        symbol: &str,
        exchange: &str,
        interval: &str,
        bars: u32,
    ) -> Result<Vec<Bar>, RestError> {
        let started = Instant::now();
        metrics::record_fetch_attempt(FetchPath::Rest);

        let bars = self
            .rest
            .fetch_history(symbol, exchange, interval, bars)
            .await?;

        metrics::record_bars(FetchPath::Rest, bars.len());
        metrics::record_fetch_duration(FetchPath::Rest, started.elapsed());
        Ok(bars)
    }

    /// Search for symbols.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status or an
    /// undecodable body.
    pub async fn search_symbol(&self, params: &SearchParams) -> Result<SearchResponse, RestError> {
        let started = Instant::now();
        metrics::record_fetch_attempt(FetchPath::Search);

        let response = self.rest.search_symbol(params).await?;

        metrics::record_fetch_duration(FetchPath::Search, started.elapsed());
        Ok(response)
    }
}

fn build_http_client() -> Result<Client, ClientError> {
    Ok(Client::builder().user_agent(DEFAULT_USER_AGENT).build()?)
}
