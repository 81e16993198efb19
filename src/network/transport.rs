use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;

use crate::TransportError;

pub type HttpRequest = http::Request<Bytes>;
pub type HttpResponse = http::Response<Bytes>;

/// One outbound HTTP exchange.
///
/// `Err` means no response was received at all. Any response, including
/// 4xx/5xx, is `Ok`: interpreting status codes is the caller's job.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// `host:port` of a request target, for logs and error messages
pub(crate) fn target_address(request: &HttpRequest) -> String {
    request
        .uri()
        .authority()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| "<no authority>".to_string())
}
