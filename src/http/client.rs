use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::redirect;

use crate::error::{AppError, AppResult, RequestError};

/// Explicit HTTP client construction. Owned by the suite session and
/// passed down, never package-level state, so concurrent suites with
/// different TLS or timeout settings cannot collide. Connection pooling
/// stays the transport's responsibility.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub redirect_limit: usize,
    pub accept_invalid_certs: bool,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 32,
            redirect_limit: 10,
            accept_invalid_certs: false,
        }
    }
}

impl ClientFactory {
    /// Build a client, attaching `jar` when the owning suite keeps
    /// cookies across its tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn build(&self, follow_redirects: bool, jar: Option<Arc<Jar>>) -> AppResult<Client> {
        let policy = if follow_redirects {
            redirect::Policy::limited(self.redirect_limit)
        } else {
            redirect::Policy::none()
        };
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .redirect(policy)
            .danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }
        builder
            .build()
            .map_err(|err| AppError::request(RequestError::BuildClientFailed { source: err }))
    }
}
