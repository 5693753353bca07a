/// Prometheus instrumentation
///
/// Invocation outcomes plus per-route HTTP counters and latency, exposed on
/// `GET /metrics` from the default registry.
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, TextEncoder};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Route label for requests that matched no registered resource
pub const UNMATCHED_ROUTE: &str = "unmatched";

const HTTP_LABELS: &[&str] = &["method", "route", "status"];
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

fn register<C: Collector + Clone + 'static>(collector: C) -> C {
    prometheus::default_registry()
        .register(Box::new(collector.clone()))
        .expect("metric registered twice");
    collector
}

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    register(IntCounterVec::new(Opts::new(name, help), labels).expect("valid counter definition"))
}

static OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    counter(
        "arrival_notifier_outcomes_total",
        "Order update invocations by outcome",
        &["outcome"],
    )
});

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    counter(
        "arrival_notifier_http_requests_total",
        "HTTP requests handled, by route and status",
        HTTP_LABELS,
    )
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "arrival_notifier_http_request_duration_seconds",
        "HTTP request latency, by route and status",
    )
    .buckets(LATENCY_BUCKETS.to_vec());
    register(HistogramVec::new(opts, HTTP_LABELS).expect("valid histogram definition"))
});

pub fn record_outcome(outcome: &str) {
    OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Route pattern for a request, or [`UNMATCHED_ROUTE`]
///
/// Raw paths are never used as labels.
pub fn route_label(pattern: Option<String>) -> String {
    pattern.unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

pub fn observe_http_request(method: &str, route: &str, status: u16, elapsed: Duration) {
    let status = status.to_string();
    let labels = [method, route, status.as_str()];
    HTTP_REQUESTS_TOTAL.with_label_values(&labels).inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&labels)
        .observe(elapsed.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => HttpResponse::Ok()
            .content_type(encoder.format_type())
            .body(buffer),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

/// Records every request into the HTTP counter and histogram
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let route = route_label(req.match_pattern());
        let method = req.method().to_string();
        let started = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;
            let status = result
                .as_ref()
                .map(|response| response.status().as_u16())
                .unwrap_or(500);
            observe_http_request(&method, &route, status, started.elapsed());
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};

    #[::core::prelude::v1::test]
    fn test_outcome_counter_increments() {
        let before = OUTCOMES_TOTAL.with_label_values(&["sent"]).get();
        record_outcome("sent");
        assert_eq!(OUTCOMES_TOTAL.with_label_values(&["sent"]).get(), before + 1);
    }

    #[::core::prelude::v1::test]
    fn test_route_label_falls_back_to_unmatched() {
        assert_eq!(route_label(Some("/health".to_string())), "/health");
        assert_eq!(route_label(None), UNMATCHED_ROUTE);
    }

    #[actix_rt::test]
    async fn test_unknown_paths_share_one_label() {
        let app = test::init_service(
            App::new()
                .wrap(MetricsMiddleware)
                .route("/health", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let unmatched = |path: &str| {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["GET", path, "404"])
                .get()
        };
        let before = unmatched(UNMATCHED_ROUTE);

        for uri in ["/nope-1", "/nope-2/deeper"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 404);
        }

        assert!(unmatched(UNMATCHED_ROUTE) >= before + 2);
        assert_eq!(unmatched("/nope-1"), 0);
    }

    #[actix_rt::test]
    async fn test_serve_metrics_exposes_outcomes() {
        record_outcome("no_token");
        let response = serve_metrics().await;
        assert!(response.status().is_success());
    }
}
