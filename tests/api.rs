use alloy_primitives::{Address, U256};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use ultra_route::router::{create_api_router, RouteBuilder, RouteProcessor, Router, SelectorRegistry};
use ultra_route::state::{Genesis, World};
use ultra_route::venues::PairSwapPayload;

const GENESIS: &str = r#"
timestamp: 1000
tokens:
  - address: "0x0101010101010101010101010101010101010101"
    symbol: AAA
    behavior: { kind: standard }
  - address: "0x0202020202020202020202020202020202020202"
    symbol: BBB
    behavior: { kind: standard }
balances:
  - asset: "0x0101010101010101010101010101010101010101"
    account: "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
    amount: "10000"
allowances:
  - token: "0x0101010101010101010101010101010101010101"
    owner: "0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1"
    spender: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
    amount: "1000000"
pairs:
  - address: "0x5050505050505050505050505050505050505050"
    token0: "0x0101010101010101010101010101010101010101"
    token1: "0x0202020202020202020202020202020202020202"
    reserve0: "1000000"
    reserve1: "1000000"
    fee: 3000
"#;

fn app() -> axum::Router {
    let genesis = Genesis::from_yaml(GENESIS).unwrap();
    let world = World::from_genesis(&genesis).unwrap();
    let processor = RouteProcessor::new(
        Address::repeat_byte(0xaa),
        Address::repeat_byte(0x0e),
        SelectorRegistry::with_defaults(),
    );
    create_api_router(Arc::new(Router::new(processor, world)))
}

fn route_request(route: &[u8], amount_out_min: &str) -> Request<Body> {
    let body = serde_json::json!({
        "caller": Address::repeat_byte(0xa1),
        "token_in": Address::repeat_byte(0x01),
        "amount_in": "1000",
        "token_out": Address::repeat_byte(0x02),
        "amount_out_min": amount_out_min,
        "to": Address::repeat_byte(0xb0),
        "route": format!("0x{}", hex::encode(route)),
    });
    Request::builder()
        .method("POST")
        .uri("/api/v1/route")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn pair_swap_route() -> Vec<u8> {
    let payload = PairSwapPayload {
        pool: Address::repeat_byte(0x50),
        zero_for_one: true,
        to: Address::repeat_byte(0xb0),
        fee: 3_000,
    }
    .encode();
    RouteBuilder::new()
        .pull_one(Address::repeat_byte(0x01), payload)
        .build()
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn balance_reads_genesis_state() {
    let uri = format!(
        "/api/v1/balance/{}/{}",
        Address::repeat_byte(0x01),
        Address::repeat_byte(0xa1)
    );
    let response = app()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["balance"], "10000");
}

#[tokio::test]
async fn malformed_balance_address_is_a_bad_request() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/balance/0x01/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn route_endpoint_processes_a_pair_swap() {
    let response = app()
        .oneshot(route_request(&pair_swap_route(), "990"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["amount_out"], "996");
    assert_eq!(body["steps"], 1);
}

#[tokio::test]
async fn rejected_route_reports_its_error_class() {
    let response = app()
        .oneshot(route_request(&pair_swap_route(), "997"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["class"], "invariant");

    let response = app().oneshot(route_request(&[0x09], "0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["class"], "decode");
}

#[tokio::test]
async fn stats_count_processed_routes() {
    let router = {
        let genesis = Genesis::from_yaml(GENESIS).unwrap();
        let processor = RouteProcessor::new(
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0x0e),
            SelectorRegistry::with_defaults(),
        );
        Arc::new(Router::new(processor, World::from_genesis(&genesis).unwrap()))
    };
    let app = create_api_router(router.clone());

    app.clone()
        .oneshot(route_request(&pair_swap_route(), "1"))
        .await
        .unwrap();
    let response = app
        .oneshot(Request::builder().uri("/api/v1/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total_routes"], 1);
    assert_eq!(body["successful_routes"], 1);
    assert_eq!(
        router
            .balance(Address::repeat_byte(0x02), Address::repeat_byte(0xb0))
            .await
            .unwrap(),
        U256::from(996u64)
    );
}
