// src/server/handler.rs
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::health::{json_response, HealthAggregator, RequestInfo};

/// Routes the health path to the aggregator. Each request gets its own
/// evaluation; the aggregator itself is shared.
#[derive(Clone)]
pub struct RequestHandler {
    aggregator: Arc<HealthAggregator>,
    path: Arc<str>,
}

impl RequestHandler {
    pub fn new(aggregator: Arc<HealthAggregator>, path: impl Into<Arc<str>>) -> Self {
        Self {
            aggregator,
            path: path.into(),
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        if req.uri().path() != &*self.path {
            return json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not Found" }));
        }

        let head = match *req.method() {
            Method::GET => false,
            Method::HEAD => true,
            _ => {
                return json_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &json!({ "error": "Method Not Allowed" }),
                )
            }
        };

        let info = RequestInfo::from_headers(req.headers());
        let mut evaluation = self.aggregator.run(&info).await;

        let mut response = evaluation.render(None).unwrap_or_else(|| {
            json_response(StatusCode::INTERNAL_SERVER_ERROR, &json!({ "ok": false }))
        });

        if head {
            *response.body_mut() = Body::empty();
        }
        response
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        let span = info_span!(
            "request",
            request_id = %Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        );

        Box::pin(
            async move {
                let response = handler.handle(req).await;
                tracing::debug!(status = %response.status(), "Responded");
                Ok(response)
            }
            .instrument(span),
        )
    }
}
