use httpmock::prelude::*;
use llm::{GeminiModel, GeminiOptions, LanguageModel, StaticModel, UnavailableModel};
use serde_json::json;

fn options_for(server: &MockServer) -> GeminiOptions {
    let mut options = GeminiOptions::new("test-key");
    options.base_url = server.base_url();
    options
}

#[tokio::test]
async fn test_gemini_concatenates_candidate_parts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/models/gemini-2.5-flash:generateContent")
                .query_param("key", "test-key");
            then.status(200).json_body(json!({
                "candidates": [{
                    "content": {
                        "parts": [{"text": "{\"bucket\":"}, {"text": "\"backend\"}"}]
                    }
                }]
            }));
        })
        .await;

    let model = GeminiModel::new(options_for(&server)).unwrap();
    let reply = model.generate("강남구 백엔드").await.unwrap();
    assert_eq!(reply, "{\"bucket\":\"backend\"}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_http_error_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(403).body("API key not valid");
        })
        .await;

    let model = GeminiModel::new(options_for(&server)).unwrap();
    let err = model.generate("백엔드").await.unwrap_err();
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_gemini_without_candidates_yields_empty_text() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({}));
        })
        .await;

    let model = GeminiModel::new(options_for(&server)).unwrap();
    assert_eq!(model.generate("백엔드").await.unwrap(), "");
}

#[test]
fn test_gemini_requires_api_key() {
    assert!(GeminiModel::new(GeminiOptions::new("  ")).is_err());
}

#[tokio::test]
async fn test_static_and_unavailable_models() {
    let model = StaticModel::new("{}");
    assert_eq!(model.generate("anything").await.unwrap(), "{}");
    assert!(UnavailableModel.generate("anything").await.is_err());
}
