//! HTTP engine behaviour against a mock speech service.

mod common;

use common::{config_in, tone_wav};
use narrate_core::{
    AudioFormat, EngineConfig, FailurePolicy, HttpSpeechEngine, NarrateError, OutcomeStatus,
    Pipeline, Prosody, SpeechEngine, SpeechInput, SpeechRequest, SynthesisRequest,
};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "secret-key";
const RIFF_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

fn engine_config(server: &MockServer, output_format: &str) -> EngineConfig {
    EngineConfig {
        endpoint: server.uri(),
        api_key: KEY.to_string(),
        output_format: output_format.to_string(),
        timeout_secs: 5,
        ..EngineConfig::default()
    }
}

fn text_request(text: &str) -> SpeechRequest {
    SpeechRequest {
        input: SpeechInput::Text(text.to_string()),
        voice_id: "en-GB-RyanNeural".to_string(),
        prosody: Prosody::for_speed(0.5, 100),
    }
}

#[tokio::test]
async fn test_synthesize_posts_ssml() {
    let server = MockServer::start().await;
    let (wav, _) = tone_wav(0.3, 24_000);
    Mock::given(method("POST"))
        .and(path("/cognitiveservices/v1"))
        .and(header(HttpSpeechEngine::KEY_HEADER, KEY))
        .and(header(HttpSpeechEngine::FORMAT_HEADER, RIFF_FORMAT))
        .and(header("content-type", "application/ssml+xml"))
        .and(body_string_contains("<voice name='en-GB-RyanNeural'>"))
        .and(body_string_contains("<prosody rate='+100%' pitch='+0Hz'>Fish &amp; chips</prosody>"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let engine = HttpSpeechEngine::new(&engine_config(&server, RIFF_FORMAT)).unwrap();
    let audio = engine.synthesize(&text_request("Fish & chips")).await.unwrap();

    assert_eq!(audio.format, AudioFormat::Wav);
    assert_eq!(audio.bytes, wav);
}

#[tokio::test]
async fn test_server_error_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let engine = HttpSpeechEngine::new(&engine_config(&server, RIFF_FORMAT)).unwrap();
    let err = engine.synthesize(&text_request("Hello")).await.unwrap_err();

    assert!(matches!(err, NarrateError::NetworkError { .. }));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_rejected_key_is_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let engine = HttpSpeechEngine::new(&engine_config(&server, RIFF_FORMAT)).unwrap();
    let err = engine.synthesize(&text_request("Hello")).await.unwrap_err();
    assert!(matches!(err, NarrateError::ConfigurationError { .. }));
}

#[tokio::test]
async fn test_empty_body_is_synthesis_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let engine = HttpSpeechEngine::new(&engine_config(&server, RIFF_FORMAT)).unwrap();
    let err = engine.synthesize(&text_request("Hello")).await.unwrap_err();
    assert!(matches!(err, NarrateError::SynthesisError { .. }));
}

#[tokio::test]
async fn test_list_voices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cognitiveservices/voices/list"))
        .and(header(HttpSpeechEngine::KEY_HEADER, KEY))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[
                {"ShortName":"en-US-JennyNeural","DisplayName":"Jenny","Gender":"Female","Locale":"en-US"},
                {"ShortName":"de-DE-ConradNeural","DisplayName":"Conrad","Gender":"Male","Locale":"de-DE"}
            ]"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let engine = HttpSpeechEngine::new(&engine_config(&server, RIFF_FORMAT)).unwrap();
    let voices = engine.list_voices().await.unwrap();

    assert_eq!(voices.len(), 2);
    assert_eq!(voices[1].short_name, "de-DE-ConradNeural");
    assert_eq!(voices[1].locale, "de-DE");
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let server = MockServer::start().await;
    let (wav, frames) = tone_wav(0.4, 24_000);
    Mock::given(method("POST"))
        .and(path("/cognitiveservices/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(wav))
        .mount(&server)
        .await;

    let scratch = TempDir::new().unwrap();
    let mut config = config_in(&scratch);
    config.engine = engine_config(&server, RIFF_FORMAT);
    let engine = Arc::new(HttpSpeechEngine::new(&config.engine).unwrap());
    let pipeline = Pipeline::new(config, engine).unwrap();

    let outcome = pipeline
        .synthesize(
            &SynthesisRequest::text("Good evening."),
            &scratch.path().join("evening.wav"),
        )
        .await
        .unwrap();

    assert!(!outcome.is_fallback());
    assert_eq!(outcome.artifact.load().unwrap().len(), frames);
}

#[tokio::test]
async fn test_pipeline_fallback_and_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("outage"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let scratch = TempDir::new().unwrap();
    let mut config = config_in(&scratch);
    config.engine = engine_config(&server, RIFF_FORMAT);
    let engine = Arc::new(HttpSpeechEngine::new(&config.engine).unwrap());
    let pipeline = Pipeline::new(config, engine).unwrap();

    let outcome = pipeline
        .synthesize(
            &SynthesisRequest::text("An outage happens."),
            &scratch.path().join("outage.wav"),
        )
        .await
        .unwrap();
    assert!(outcome.is_fallback());
    assert!(outcome.artifact.load().unwrap().is_silent());

    let outcome = pipeline
        .synthesize(
            &SynthesisRequest::text("A forbidden request."),
            &scratch.path().join("forbidden.wav"),
        )
        .await
        .unwrap();
    match &outcome.status {
        OutcomeStatus::Fallback { reason } => {
            assert!(matches!(reason, NarrateError::ConfigurationError { .. }));
        }
        OutcomeStatus::Rendered => panic!("forbidden request reported as rendered"),
    }

    let mut strict = config_in(&scratch);
    strict.engine = engine_config(&server, RIFF_FORMAT);
    strict.failure_policy = FailurePolicy::Propagate;
    let engine = Arc::new(HttpSpeechEngine::new(&strict.engine).unwrap());
    let pipeline = Pipeline::new(strict, engine).unwrap();
    let err = pipeline
        .synthesize(
            &SynthesisRequest::text("A forbidden request."),
            &scratch.path().join("forbidden_strict.wav"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NarrateError::ConfigurationError { .. }));
}
