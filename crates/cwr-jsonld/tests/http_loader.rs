//! HttpDocumentLoader against an in-process context host.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::header::{CONTENT_TYPE, LINK};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use cwr_jsonld::{DocumentLoader, HttpDocumentLoader, JsonLdError};

async fn plain() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/ld+json")],
        r#"{"@context": {"name": "http://schema.org/name"}}"#,
    )
}

async fn html_with_alternate() -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (
                LINK,
                "</docs/context.jsonld>; rel=\"alternate\"; type=\"application/ld+json\"",
            ),
        ],
        "<html><body>vocabulary</body></html>",
    )
}

async fn alternate() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/ld+json")],
        r#"{"@context": {"@vocab": "http://schema.org/"}}"#,
    )
}

async fn two_context_links() -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "application/json"),
            (
                LINK,
                "<a.jsonld>; rel=\"http://www.w3.org/ns/json-ld#context\", \
                 <b.jsonld>; rel=\"http://www.w3.org/ns/json-ld#context\"",
            ),
        ],
        "{}",
    )
}

async fn html_only() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/html")], "<html></html>")
}

async fn spawn_host() -> SocketAddr {
    let app = Router::new()
        .route("/plain", get(plain))
        .route("/vocab", get(html_with_alternate))
        .route("/docs/context.jsonld", get(alternate))
        .route("/double", get(two_context_links))
        .route("/html", get(html_only));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn loader() -> HttpDocumentLoader {
    HttpDocumentLoader::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn loads_json_ld_documents() {
    let addr = spawn_host().await;
    let doc = loader().load(&format!("http://{addr}/plain")).await.unwrap();
    assert_eq!(doc.content_type, "application/ld+json");
    assert_eq!(doc.context()["name"], "http://schema.org/name");
}

#[tokio::test]
async fn follows_alternate_link_for_html_answers() {
    let addr = spawn_host().await;
    let doc = loader().load(&format!("http://{addr}/vocab")).await.unwrap();
    assert_eq!(doc.document_url, format!("http://{addr}/docs/context.jsonld"));
    assert_eq!(doc.context()["@vocab"], "http://schema.org/");
}

#[tokio::test]
async fn rejects_multiple_context_links() {
    let addr = spawn_host().await;
    let err = loader()
        .load(&format!("http://{addr}/double"))
        .await
        .unwrap_err();
    assert!(matches!(err, JsonLdError::MultipleContextLinks(_)));
}

#[tokio::test]
async fn html_without_alternate_is_a_load_failure() {
    let addr = spawn_host().await;
    let err = loader().load(&format!("http://{addr}/html")).await.unwrap_err();
    assert!(matches!(err, JsonLdError::LoadFailed { .. }));
}

#[tokio::test]
async fn missing_documents_fail() {
    let addr = spawn_host().await;
    let err = loader()
        .load(&format!("http://{addr}/nothing"))
        .await
        .unwrap_err();
    assert!(matches!(err, JsonLdError::LoadFailed { .. }));
}
