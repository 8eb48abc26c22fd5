//! Caption generation against a local stub of the chat-completions API.
//!
//! The stub binds `127.0.0.1:0`, records every request and answers with a
//! canned status and body, so the real HTTP path runs without a network.

mod common;

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use common::*;
use edgequake_pdfcover::{
    create_cover, CaptionConfig, CaptionGenerator, CaptionSource, CoverRequest,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lopdf::{dictionary, Object, Stream};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Recorded {
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

async fn completions(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.seen.lock().unwrap().push(Recorded {
        authorization,
        body,
    });
    (stub.status, Json(stub.reply.clone()))
}

/// Start a stub; returns its endpoint URL and the request log.
async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(Stub {
            status,
            reply,
            seen: seen.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/chat/completions"), seen)
}

fn captioner(endpoint: &str, key: &str) -> CaptionGenerator {
    let config = CaptionConfig::builder()
        .api_key(key)
        .endpoint(endpoint)
        .api_timeout_secs(10)
        .build()
        .unwrap();
    CaptionGenerator::new(config).unwrap()
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_model_caption_is_embedded() {
    let (endpoint, seen) =
        spawn_stub(StatusCode::OK, completion("  A red cover with white lettering. \n")).await;
    let request = CoverRequest::new().with_title("Red Book");

    let cover = create_cover(simple_cover_pdf(), &request, &captioner(&endpoint, "sk-test"))
        .await
        .unwrap();

    assert_eq!(cover.alt_text, "A red cover with white lettering.");
    assert_eq!(cover.alt_text_source, CaptionSource::Model);
    assert_eq!(figure_alt(&load(&cover.pdf)), "A red cover with white lettering.");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "exactly one inference call per cover");
    let call = &seen[0];
    assert_eq!(call.authorization.as_deref(), Some("Bearer sk-test"));
    assert_eq!(call.body["model"], "gpt-4o");
    assert_eq!(call.body["max_tokens"], 300);

    let content = &call.body["messages"][0]["content"];
    assert_eq!(call.body["messages"][0]["role"], "user");
    assert!(content[0]["text"].as_str().unwrap().contains("\"Red Book\""));
    assert_eq!(content[1]["type"], "image_url");
    assert_eq!(content[1]["image_url"]["detail"], "low");
    assert!(content[1]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_jpeg_cover_is_sent_as_png() {
    let (endpoint, seen) = spawn_stub(StatusCode::OK, completion("Blue cover.")).await;
    let pdf = Fixture::with_image(jpeg_image(32, 48)).build();

    let cover = create_cover(pdf, &CoverRequest::new(), &captioner(&endpoint, "k"))
        .await
        .unwrap();
    assert_eq!(cover.alt_text, "Blue cover.");

    let seen = seen.lock().unwrap();
    let prompt = seen[0].body["messages"][0]["content"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("\"Book Cover\""), "default title is quoted: {prompt}");
}

#[tokio::test]
async fn test_server_error_falls_back() {
    let (endpoint, seen) =
        spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": {"message": "boom"}})).await;
    let cover = create_cover(simple_cover_pdf(), &CoverRequest::new(), &captioner(&endpoint, "k"))
        .await
        .unwrap();
    assert_eq!(cover.alt_text, "Book cover image");
    assert_eq!(cover.alt_text_source, CaptionSource::Fallback);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unauthorized_falls_back() {
    let (endpoint, _) =
        spawn_stub(StatusCode::UNAUTHORIZED, json!({"error": {"message": "bad key"}})).await;
    let cover = create_cover(simple_cover_pdf(), &CoverRequest::new(), &captioner(&endpoint, "bad"))
        .await
        .unwrap();
    assert_eq!(cover.alt_text_source, CaptionSource::Fallback);
}

#[tokio::test]
async fn test_blank_or_missing_content_falls_back() {
    for reply in [
        completion("   "),
        json!({"choices": []}),
        json!({"choices": [{"message": {"role": "assistant", "content": null}}]}),
        json!({"unexpected": true}),
    ] {
        let (endpoint, _) = spawn_stub(StatusCode::OK, reply.clone()).await;
        let cover =
            create_cover(simple_cover_pdf(), &CoverRequest::new(), &captioner(&endpoint, "k"))
                .await
                .unwrap();
        assert_eq!(cover.alt_text, "Book cover image", "reply: {reply}");
    }
}

#[tokio::test]
async fn test_blank_key_makes_no_call() {
    let (endpoint, seen) = spawn_stub(StatusCode::OK, completion("never used")).await;
    let cover = create_cover(simple_cover_pdf(), &CoverRequest::new(), &captioner(&endpoint, "  "))
        .await
        .unwrap();
    assert_eq!(cover.alt_text, "Book cover image");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_undecodable_image_falls_back_without_call() {
    let (endpoint, seen) = spawn_stub(StatusCode::OK, completion("never used")).await;
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 4,
            "Height" => 4,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "JPXDecode",
        },
        vec![0; 16],
    );
    let pdf = Fixture::with_image(stream).build();

    let cover = create_cover(pdf, &CoverRequest::new(), &captioner(&endpoint, "k"))
        .await
        .unwrap();
    assert_eq!(cover.alt_text_source, CaptionSource::Fallback);
    assert!(seen.lock().unwrap().is_empty());
    // The image is still copied as-is.
    assert_eq!(image_count(&load(&cover.pdf)), 1);
}

#[tokio::test]
async fn test_indirect_icc_colour_space_is_sent_in_colour() {
    let (endpoint, seen) = spawn_stub(StatusCode::OK, completion("Red and blue.")).await;
    let profile = (100, 0);
    let space = (101, 0);
    let pdf = Fixture {
        objects: vec![
            (
                profile,
                Object::Stream(Stream::new(dictionary! { "N" => 3 }, vec![0; 16])),
            ),
            (
                space,
                Object::Array(vec![
                    Object::Name(b"ICCBased".to_vec()),
                    Object::Reference(profile),
                ]),
            ),
        ],
        ..Fixture::with_image(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => Object::Reference(space),
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        ))
    }
    .build();

    let cover = create_cover(pdf, &CoverRequest::new(), &captioner(&endpoint, "k"))
        .await
        .unwrap();
    assert_eq!(cover.alt_text_source, CaptionSource::Model);

    let seen = seen.lock().unwrap();
    let url = seen[0].body["messages"][0]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap();
    let png = STANDARD
        .decode(url.strip_prefix("data:image/png;base64,").unwrap())
        .unwrap();
    let rgb = image::load_from_memory(&png).unwrap().to_rgb8();
    assert_eq!(rgb.dimensions(), (2, 1));
    assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 255]);
}

#[tokio::test]
async fn test_missing_colour_space_falls_back_without_call() {
    let (endpoint, seen) = spawn_stub(StatusCode::OK, completion("never used")).await;
    let pdf = Fixture::with_image(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 1,
            "ColorSpace" => Object::Reference((77, 0)),
            "BitsPerComponent" => 8,
        },
        vec![255, 0, 0, 0, 0, 255],
    ))
    .build();

    let cover = create_cover(pdf, &CoverRequest::new(), &captioner(&endpoint, "k"))
        .await
        .unwrap();
    assert_eq!(cover.alt_text_source, CaptionSource::Fallback);
    assert!(seen.lock().unwrap().is_empty());
}
