use std::sync::Arc;

use async_trait::async_trait;
use config::ConfigError;
use tracing::debug;
use tracing::warn;

use super::clone_request;
use super::BlacklistingStrategy;
use super::FailoverStrategy;
use super::RoundRobinStrategy;
use crate::metrics::FAILOVER_ATTEMPT_COUNTER;
use crate::network::target_address;
use crate::Error;
use crate::FailoverConfig;
use crate::FailoverError;
use crate::FailoverStrategyKind;
use crate::HttpRequest;
use crate::HttpResponse;
use crate::Result;
use crate::Transport;
use crate::TransportError;

/// Retries a request across a host pool.
///
/// Only transport failures move to another host; any response the backend
/// sends, error statuses included, is returned to the caller unchanged.
pub struct FailoverRouter<T> {
    inner: T,
    strategy: Arc<dyn FailoverStrategy>,
    max_attempts: usize,
}

impl<T: Transport> FailoverRouter<T> {
    pub fn new(
        inner: T,
        strategy: Arc<dyn FailoverStrategy>,
        max_attempts: usize,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidArgument("max_attempts must be greater than 0".into()));
        }
        Ok(Self {
            inner,
            strategy,
            max_attempts,
        })
    }

    /// Builds the configured strategy over the configured pool
    pub fn from_config(
        inner: T,
        config: &FailoverConfig,
    ) -> Result<Self> {
        config.validate()?;

        let candidates = config.candidates()?;
        if candidates.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "failover hosts must not be empty".into(),
            )));
        }

        let strategy: Arc<dyn FailoverStrategy> = match config.strategy {
            FailoverStrategyKind::Blacklisting => {
                Arc::new(BlacklistingStrategy::new(candidates, config.blacklist_timeout())?)
            }
            FailoverStrategyKind::RoundRobin => {
                Arc::new(RoundRobinStrategy::new(candidates, config.round_robin_delay())?)
            }
        };

        Self::new(inner, strategy, config.max_attempts)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    async fn route(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        if !self.strategy.is_request_viable(&request) {
            return Err(FailoverError::NoViableHost {
                uri: request.uri().to_string(),
            }
            .into());
        }

        let mut previous = request;
        let mut attempts = 0;
        loop {
            let Some(stage) = self.strategy.compute_next_stage(&previous, None) else {
                return Err(FailoverError::NoViableHostRemaining { attempts }.into());
            };

            if !stage.delay.is_zero() {
                tokio::time::sleep(stage.delay).await;
            }

            let address = target_address(&stage.request);
            FAILOVER_ATTEMPT_COUNTER.with_label_values(&[&address]).inc();
            debug!(%address, attempts, "Sending request");

            match self.inner.send(clone_request(&stage.request)).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    self.strategy.mark_request_failed(&stage.request);
                    attempts += 1;
                    warn!(%address, attempts, error = %e, "Request failed, trying next host");

                    if attempts > self.max_attempts {
                        return Err(FailoverError::MaxAttemptsExceeded {
                            max: self.max_attempts,
                            source: e,
                        }
                        .into());
                    }
                    previous = stage.request;
                }
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for FailoverRouter<T> {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.strategy.reset();
        let _reset = ResetOnDrop(self.strategy.as_ref());
        self.route(request).await
    }
}

/// Clears the caller's strategy state when a call ends, including when the
/// call's future is dropped mid-flight.
struct ResetOnDrop<'a>(&'a dyn FailoverStrategy);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}
