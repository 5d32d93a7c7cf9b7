use tube_courier::config::DEFAULT_PROXY_LIST_URL;
use tube_courier::proxy::{ProxySource, ProxySupplier};

/// Hits the public proxy list. Run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore = "requires network access"]
async fn public_proxy_list_yields_a_proxy() {
    let endpoint =
        std::env::var("PROXY_LIST_URL").unwrap_or_else(|_| DEFAULT_PROXY_LIST_URL.to_string());

    let proxy = ProxySupplier::new(endpoint)
        .fetch_proxy()
        .await
        .expect("public proxy list should return at least one entry");

    assert!(proxy.as_str().contains("://"), "unexpected entry: {proxy}");
}
