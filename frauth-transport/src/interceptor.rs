use crate::{Action, Request, Response, Transport, TransportError};

/// Rewrites outgoing requests before they are sent.
///
/// Use the [`Action`] to tell which protocol step a request belongs to, e.g. to add a custom header
/// only to `START_AUTHENTICATE` requests.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait RequestInterceptor: Send + Sync {
    /// Return the request to send in place of `request`.
    fn intercept(&self, request: Request, action: &Action) -> Request;
}

impl<F> RequestInterceptor for F
where
    F: Fn(Request, &Action) -> Request + Send + Sync,
{
    fn intercept(&self, request: Request, action: &Action) -> Request {
        self(request, action)
    }
}

/// A [`Transport`] that runs every registered [`RequestInterceptor`], in registration order,
/// before handing the request to the wrapped transport.
pub struct InterceptingTransport<T> {
    inner: T,
    interceptors: Vec<Box<dyn RequestInterceptor>>,
}

impl<T: Transport> InterceptingTransport<T> {
    /// Wrap `inner` with no interceptors.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            interceptors: Vec::new(),
        }
    }

    /// Register an interceptor after the existing ones.
    pub fn with_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    /// Access the wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for InterceptingTransport<T> {
    async fn invoke(&self, request: Request, action: Action) -> Result<Response, TransportError> {
        let request = self
            .interceptors
            .iter()
            .fold(request, |request, interceptor| {
                interceptor.intercept(request, &action)
            });
        self.inner.invoke(request, action).await
    }
}
