use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use learning_portfolio::document::{DOCX_MIME, PHOTOS_HEADING};
use learning_portfolio::prompt::SECTION_LABELS;
use learning_portfolio::{router, AppState, GeminiClient, GeminiConfig};

const BOUNDARY: &str = "learning-portfolio-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_form(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(6, 3));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .unwrap();
    out
}

fn app_for(server: &MockServer) -> Router {
    let mut config = GeminiConfig::new("test-key");
    config.api_base = server.uri();
    config.timeout = Duration::from_secs(5);
    let gemini = GeminiClient::new(&config).unwrap();
    router(Arc::new(AppState { gemini }), 10 * 1024 * 1024)
}

struct Docx {
    document_xml: String,
    media_files: usize,
}

fn open_docx(bytes: &[u8]) -> Docx {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let media_files = archive
        .file_names()
        .filter(|name| name.contains("media/"))
        .count();
    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document_xml)
        .unwrap();
    Docx {
        document_xml,
        media_files,
    }
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn get_renders_upload_form() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("name=\"user_input\""));
    assert!(html.contains("name=\"images\""));
    assert!(html.contains("multipart/form-data"));
}

#[tokio::test]
async fn text_only_post_returns_docx_with_generated_sections() {
    let server = MockServer::start().await;
    let generated: String = SECTION_LABELS
        .iter()
        .map(|label| format!("**{label}**\n關於{label}的內容\n"))
        .collect();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": generated}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(post_form(&[Part::Text("user_input", "  test activity  ")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], DOCX_MIME);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"learning.docx\""
    );

    let docx = open_docx(&body_bytes(response).await);
    for label in SECTION_LABELS {
        assert!(docx.document_xml.contains(label), "missing {label}");
        assert!(docx.document_xml.contains(&format!("關於{label}的內容")));
    }
    assert!(!docx.document_xml.contains("**"));
    assert!(docx.document_xml.contains(PHOTOS_HEADING));
    assert_eq!(docx.media_files, 0);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    let parts = sent["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 1);
    assert!(parts[0]["text"].as_str().unwrap().ends_with("test activity\n"));
}

#[tokio::test]
async fn api_failure_and_bad_photo_still_produce_a_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(post_form(&[
            Part::File {
                name: "images",
                filename: "first.png",
                content_type: "image/png",
                bytes: png_bytes(),
            },
            Part::File {
                name: "images",
                filename: "broken.jpg",
                content_type: "image/jpeg",
                bytes: b"definitely not a jpeg".to_vec(),
            },
            Part::Text("user_input", "淨灘"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let docx = open_docx(&body_bytes(response).await);
    assert!(docx.document_xml.contains("[錯誤]"));
    assert!(docx.document_xml.contains("503"));
    assert!(docx.document_xml.contains("overloaded"));
    assert!(docx.document_xml.contains("[提醒] 無法插入圖片 broken.jpg"));
    assert_eq!(docx.media_files, 1);

    // Only the first upload goes to Gemini.
    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    let parts = sent["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
}

#[tokio::test]
async fn unnamed_first_file_is_not_sent_to_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "內容"}]}}]
        })))
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(post_form(&[
            Part::File {
                name: "images",
                filename: "",
                content_type: "application/octet-stream",
                bytes: Vec::new(),
            },
            Part::Text("user_input", "x"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let docx = open_docx(&body_bytes(response).await);
    assert!(!docx.document_xml.contains("[提醒]"));
    assert_eq!(docx.media_files, 0);

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(sent["contents"][0]["parts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_first_file_is_not_sent_to_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "內容"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(post_form(&[
            Part::File {
                name: "images",
                filename: "empty.jpg",
                content_type: "image/jpeg",
                bytes: Vec::new(),
            },
            Part::Text("user_input", "x"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let docx = open_docx(&body_bytes(response).await);
    assert!(docx.document_xml.contains("內容"));
    assert!(!docx.document_xml.contains("[錯誤]"));
    // Still named, so the document reports it as a photo that failed to embed.
    assert!(docx.document_xml.contains("[提醒] 無法插入圖片 empty.jpg"));

    let requests = server.received_requests().await.unwrap();
    let sent: serde_json::Value = requests[0].body_json().unwrap();
    let parts = sent["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 1);
    assert!(parts[0].get("inlineData").is_none());
}

#[tokio::test]
async fn unreachable_api_is_reported_in_the_document() {
    let mut config = GeminiConfig::new("test-key");
    config.api_base = "http://127.0.0.1:1".to_string();
    let gemini = GeminiClient::new(&config).unwrap();
    let app = router(Arc::new(AppState { gemini }), 1024 * 1024);

    let response = app
        .oneshot(post_form(&[Part::Text("user_input", "x")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let docx = open_docx(&body_bytes(response).await);
    assert!(docx.document_xml.contains("[錯誤] 連線至 Gemini 失敗"));
    assert!(!docx.document_xml.contains("test-key"));
}

#[tokio::test]
async fn non_multipart_post_is_rejected() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("user_input=x"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}
