use std::future::Future;

use async_trait::async_trait;

use super::QueryOptions;
use super::ResponseEnvelope;
use crate::Result;

/// Performs exactly one blocking query.
///
/// The cache hands in options that already carry `index` and `wait`; the
/// returned future resolves once, with either the result set or the error
/// that ends this attempt.
#[async_trait]
pub trait Poller<V>: Send + Sync + 'static {
    async fn poll(
        &self,
        options: &QueryOptions,
    ) -> Result<ResponseEnvelope<Vec<V>>>;
}

/// [`Poller`] backed by an async closure, see [`poll_fn`]
pub struct FnPoller<F> {
    f: F,
}

/// Adapts `Fn(QueryOptions) -> impl Future<Output = Result<ResponseEnvelope<Vec<V>>>>`
pub fn poll_fn<F>(f: F) -> FnPoller<F> {
    FnPoller { f }
}

#[async_trait]
impl<V, F, Fut> Poller<V> for FnPoller<F>
where
    V: Send + 'static,
    F: Fn(QueryOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResponseEnvelope<Vec<V>>>> + Send + 'static,
{
    async fn poll(
        &self,
        options: &QueryOptions,
    ) -> Result<ResponseEnvelope<Vec<V>>> {
        (self.f)(options.clone()).await
    }
}
