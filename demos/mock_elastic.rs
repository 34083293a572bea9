//! demos/mock_elastic.rs
//! Stand-in for the dependency the health check pings.
//! Run: cargo run --example mock_elastic -- <port> [cluster]

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

#[derive(Clone)]
struct MockState {
    node_name:    String,
    cluster:      String,
    req_counter:  Arc<AtomicU64>,
    healthy_flag: Arc<AtomicBool>,
    delay_ms:     u64,
}

// ——————————————————————————————————————————
// Request handler
async fn handle(
    _req: Request<Body>,
    state: MockState,
) -> Result<Response<Body>, Infallible> {
    state.req_counter.fetch_add(1, Ordering::SeqCst);

    // Lets the 1500 ms dependency timeout be exercised
    if state.delay_ms > 0 {
        sleep(Duration::from_millis(state.delay_ms)).await;
    }

    if !state.healthy_flag.load(Ordering::SeqCst) {
        return Ok(json(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error":"cluster_block_exception","status":503}"#.to_string(),
        ));
    }

    let body = serde_json::json!({
        "name": state.node_name,
        "cluster_name": state.cluster,
        "version": { "number": "7.10.2" },
        "tagline": "You Know, for Search",
    });

    Ok(json(StatusCode::OK, body.to_string()))
}

fn json(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

// ——————————————————————————————————————————
// Main
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Parse args / env ─────────────────────────────────────────────
    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "9200".into())
        .parse()?;
    let cluster = std::env::args()
        .nth(2)
        .or_else(|| std::env::var("CLUSTER_NAME").ok())
        .unwrap_or_else(|| "docker-cluster".into());

    let delay_ms =
        std::env::var("DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(0);
    let flip_secs: u64 =
        std::env::var("FLIP_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30);

    // ── Shared state ────────────────────────────────────────────────
    let state = MockState {
        node_name: format!("mock-{port}"),
        cluster: cluster.clone(),
        req_counter: Arc::new(AtomicU64::new(0)),
        healthy_flag: Arc::new(AtomicBool::new(true)),
        delay_ms,
    };

    // Toggle health so the checker sees both verdicts
    {
        let st = state.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(flip_secs)).await;
                let cur = st.healthy_flag.load(Ordering::SeqCst);
                st.healthy_flag.store(!cur, Ordering::SeqCst);
                println!(
                    "[{}] now {} after {} requests",
                    st.node_name,
                    if !cur { "green" } else { "red" },
                    st.req_counter.load(Ordering::SeqCst)
                );
            }
        });
    }

    // ── Hyper server ────────────────────────────────────────────────
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                handle(req, st.clone())
            }))
        }
    });

    println!(
        "Mock dependency '{}' on http://{}  [delay={}ms flip={}s]",
        cluster, addr, delay_ms, flip_secs
    );

    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
