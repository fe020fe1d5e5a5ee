use runstream::config::{AssistantProfile, Config, ProfileSelection};
use std::path::PathBuf;

fn config(api_url: &str, api_key: Option<&str>) -> Config {
    Config {
        api_key: api_key.map(str::to_string),
        api_url: api_url.to_string(),
        azure: None,
        profiles: ProfileSelection::Single(AssistantProfile {
            id: "asst_1".to_string(),
            title: "Analyst".to_string(),
        }),
        instructions: String::new(),
        upload_message: "Upload a file".to_string(),
        uploads_enabled: false,
        authentication_required: false,
        max_tool_rounds: 8,
        transcript_dir: PathBuf::from("."),
        working_dir: std::env::current_dir().expect("cwd"),
    }
}

#[test]
fn test_config_validation_rejects_remote_api_without_key() {
    assert!(config("https://api.openai.com/v1", None).validate().is_err());
}

#[test]
fn test_config_validation_allows_local_endpoint_without_api_key() {
    assert!(config("http://localhost:8000/v1", None).validate().is_ok());
}

#[test]
fn test_config_validation_rejects_non_http_urls() {
    let error = config("ftp://api.openai.com/v1", Some("sk-test"))
        .validate()
        .expect_err("ftp url");
    assert!(error.to_string().contains("RUNSTREAM_API_URL"));
}

#[test]
fn test_config_validation_rejects_empty_profile_list() {
    let mut config = config("https://api.openai.com/v1", Some("sk-test"));
    config.profiles = ProfileSelection::Multiple(Vec::new());
    assert!(config.validate().is_err());
}
