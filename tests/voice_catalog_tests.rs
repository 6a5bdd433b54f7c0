//! Voice catalog download against a wiremock HTTP server
//!
//! Run with: cargo test --test voice_catalog_tests

use waav_edge_tts::{EdgeConnectionConfig, EdgeTts, TTSError};
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOG: &str = r#"[
  {
    "Name": "Microsoft Server Speech Text to Speech Voice (en-US, AvaNeural)",
    "ShortName": "en-US-AvaNeural",
    "Gender": "Female",
    "Locale": "en-US",
    "SuggestedCodec": "audio-24khz-48kbitrate-mono-mp3",
    "FriendlyName": "Microsoft Ava Online (Natural) - English (United States)",
    "Status": "GA",
    "VoiceTag": {
      "ContentCategories": ["Conversation", "Copilot"],
      "VoicePersonalities": ["Expressive", "Caring"]
    }
  },
  {
    "Name": "Microsoft Server Speech Text to Speech Voice (de-DE, KatjaNeural)",
    "ShortName": "de-DE-KatjaNeural",
    "Gender": "Female",
    "Locale": "de-DE"
  }
]"#;

fn client_for(server: &MockServer) -> EdgeTts {
    let config = EdgeConnectionConfig::default().with_voice_list_url(format!(
        "{}/consumer/speech/synthesize/readaloud/voices/list",
        server.uri()
    ));
    EdgeTts::new(config).unwrap()
}

#[tokio::test]
async fn test_list_voices_parses_catalog() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/consumer/speech/synthesize/readaloud/voices/list"))
        .and(query_param("Ocp-Apim-Subscription-Key", "6A5AA1D4EAFF4E9FB37E23D68491D6F4"))
        .and(query_param("Sec-MS-GEC-Version", "1-140.0.3485.14"))
        .and(query_param_is_missing("ConnectionId"))
        .and(header("Sec-Fetch-Mode", "cors"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(CATALOG, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let voices = client_for(&server).list_voices().await.unwrap();

    assert_eq!(voices.len(), 2);
    let ava = &voices[0];
    assert_eq!(ava.short_name, "en-US-AvaNeural");
    assert_eq!(ava.gender, "Female");
    assert_eq!(ava.suggested_codec, "audio-24khz-48kbitrate-mono-mp3");
    assert_eq!(ava.status, "GA");
    assert_eq!(ava.voice_tag.content_categories, vec!["Conversation", "Copilot"]);
    assert!(ava.matches_locale("en"));
    assert!(!ava.matches_locale("de"));

    // Missing fields fall back to defaults
    let katja = &voices[1];
    assert_eq!(katja.locale, "de-DE");
    assert!(katja.friendly_name.is_empty());
    assert!(katja.voice_tag.voice_personalities.is_empty());
}

#[tokio::test]
async fn test_list_voices_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_voices().await.unwrap_err();
    match err {
        TTSError::VoiceCatalog(msg) => {
            assert!(msg.contains("500"));
            assert!(msg.contains("upstream down"));
        }
        other => panic!("expected VoiceCatalog, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_voices_invalid_json() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_voices().await.unwrap_err();
    assert!(matches!(err, TTSError::VoiceCatalog(_)));
}
