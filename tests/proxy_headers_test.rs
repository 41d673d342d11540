// Header filtering and upstream URI composition, checked against the
// propagation invariants: no hop-by-hop or client X-User-* header crosses
// the gateway, and the identity headers always reflect the verified caller.

use pingora_http::RequestHeader;

use torii::identity::Identity;
use torii::proxy::headers::{inject_identity, is_ignored_header, sanitize_request};
use torii::proxy::upstream::UpstreamTarget;
use torii::registry::downstream_path;

fn client_request() -> RequestHeader {
    let mut req = RequestHeader::build("GET", b"/shop/items?page=2", None).unwrap();
    for (name, value) in [
        ("Host", "gateway.example.com"),
        ("Connection", "keep-alive"),
        ("Keep-Alive", "timeout=5"),
        ("Transfer-Encoding", "chunked"),
        ("Content-Length", "42"),
        ("Proxy-Authorization", "Basic xxx"),
        ("Proxy-Authenticate", "Basic"),
        ("X-User-Id", "forged-id"),
        ("X-User-Plan", "ENTERPRISE"),
        ("Accept", "application/json"),
        ("Authorization", "Bearer token"),
    ] {
        req.append_header(name.to_string(), value.to_string()).unwrap();
    }
    req
}

#[test]
fn forbidden_headers_never_reach_upstream() {
    let mut req = client_request();
    sanitize_request(&mut req);
    inject_identity(&mut req, &Identity::new("u1", "ROLE_USER", "PRO")).unwrap();

    for name in [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "content-length",
        "proxy-authorization",
        "proxy-authenticate",
        "host",
    ] {
        assert!(
            req.headers.get(name).is_none(),
            "{} must not be forwarded",
            name
        );
    }
}

#[test]
fn identity_headers_match_the_verified_identity() {
    let mut req = client_request();
    sanitize_request(&mut req);
    inject_identity(&mut req, &Identity::new("u1", "ROLE_USER", "PRO")).unwrap();

    assert_eq!(req.headers.get("x-user-id").unwrap().to_str().unwrap(), "u1");
    assert_eq!(
        req.headers.get("x-user-role").unwrap().to_str().unwrap(),
        "ROLE_USER"
    );
    assert_eq!(
        req.headers.get("x-user-plan").unwrap().to_str().unwrap(),
        "PRO"
    );

    // The forged client values are gone, not merged
    assert_eq!(req.headers.get_all("x-user-id").iter().count(), 1);
    assert_eq!(req.headers.get_all("x-user-plan").iter().count(), 1);
}

#[test]
fn ordinary_headers_are_preserved() {
    let mut req = client_request();
    sanitize_request(&mut req);

    assert!(req.headers.get("accept").is_some());
    assert!(req.headers.get("authorization").is_some());
}

#[test]
fn anonymous_identity_propagates_for_public_paths() {
    let mut req = client_request();
    sanitize_request(&mut req);
    inject_identity(&mut req, &Identity::anonymous()).unwrap();

    assert_eq!(
        req.headers.get("x-user-id").unwrap().to_str().unwrap(),
        "anonymous"
    );
    assert_eq!(
        req.headers.get("x-user-role").unwrap().to_str().unwrap(),
        "ROLE_ANONYMOUS"
    );
}

#[test]
fn filter_rule_is_case_insensitive() {
    assert!(is_ignored_header("CONNECTION"));
    assert!(is_ignored_header("x-USER-anything"));
    assert!(!is_ignored_header("X-Correlation-Id"));
}

#[test]
fn upstream_uri_is_target_plus_stripped_path_and_query() {
    let target = UpstreamTarget::parse("http://shop-backend:8081").unwrap();
    let stripped = downstream_path("/shop/items", "/shop");

    assert_eq!(
        target.upstream_uri(&stripped, Some("page=2")),
        "/items?page=2"
    );
}

#[test]
fn bare_prefix_maps_to_upstream_root() {
    let target = UpstreamTarget::parse("http://shop-backend:8081").unwrap();
    let stripped = downstream_path("/shop", "/shop");

    assert_eq!(target.upstream_uri(&stripped, None), "/");
}

#[test]
fn target_base_path_is_prepended() {
    let target = UpstreamTarget::parse("https://legacy.internal/api/v1").unwrap();
    let stripped = downstream_path("/legacy/orders", "/legacy");

    assert_eq!(target.upstream_uri(&stripped, None), "/api/v1/orders");
    assert_eq!(target.authority(), "legacy.internal");
    assert!(target.use_tls);
}
