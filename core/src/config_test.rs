use super::*;
use tempfile::TempDir;

#[test]
fn test_default_config_values() {
    let config = Config::default();

    // Model defaults
    assert_eq!(config.model.transcription, WhisperModel::WhisperSmall);
    assert_eq!(config.model.language, "auto");
    assert_eq!(config.model.device, Device::Cpu);

    // Extraction defaults
    assert_eq!(config.extraction.mode, ExtractionMode::Auto);
    assert_eq!(config.extraction.llm_model, "llama3.2");
    assert_eq!(config.extraction.ollama_url, "http://localhost:11434");
    assert!(config.extraction.prompt_file.is_none());
    assert_eq!(config.extraction.max_output_tokens, 256);

    // Normalizer defaults
    assert!(config.normalizer.duplicate_value_guard);

    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_load_valid_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
[model]
transcription = "whisper-large-v3-turbo"
language = "en"
device = "gpu"

[extraction]
mode = "llm"
llm_model = "mistral"
ollama_url = "http://127.0.0.1:9999"
max_output_tokens = 512

[normalizer]
duplicate_value_guard = false

[logging]
level = "debug"
"#;

    std::fs::write(&config_path, toml_content).unwrap();

    let config = Config::load_from(&config_path).unwrap();

    assert_eq!(config.model.transcription, WhisperModel::WhisperLargeV3Turbo);
    assert_eq!(config.model.language, "en");
    assert_eq!(config.model.device, Device::Gpu);
    assert_eq!(config.extraction.mode, ExtractionMode::Llm);
    assert_eq!(config.extraction.llm_model, "mistral");
    assert_eq!(config.extraction.ollama_url, "http://127.0.0.1:9999");
    assert_eq!(config.extraction.max_output_tokens, 512);
    assert!(!config.normalizer.duplicate_value_guard);
    assert_eq!(config.logging.level, LogLevel::Debug);
}

#[test]
fn test_missing_config_file_returns_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nonexistent.toml");

    let config = Config::load_from(&config_path).unwrap();

    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_config_fills_defaults() {
    let config = Config::parse(
        r#"
[extraction]
mode = "regex"
"#,
    )
    .unwrap();

    assert_eq!(config.extraction.mode, ExtractionMode::Regex);
    // Unspecified sections and fields come from defaults
    assert_eq!(config.extraction.llm_model, "llama3.2");
    assert_eq!(config.model.transcription, WhisperModel::WhisperSmall);
    assert!(config.normalizer.duplicate_value_guard);
}

#[test]
fn test_invalid_toml_is_an_error() {
    assert!(Config::parse("model = [broken").is_err());
}

#[test]
fn test_unknown_mode_is_an_error() {
    let result = Config::parse(
        r#"
[extraction]
mode = "psychic"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_save_and_reload_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.model.transcription = WhisperModel::WhisperMedium;
    config.extraction.mode = ExtractionMode::Llm;
    config.extraction.prompt_file = Some(PathBuf::from("/tmp/prompt.txt"));
    config.normalizer.duplicate_value_guard = false;

    config.save_to(&config_path).unwrap();
    let reloaded = Config::load_from(&config_path).unwrap();

    assert_eq!(reloaded, config);
}

#[test]
fn test_log_level_directives() {
    assert_eq!(LogLevel::Info.as_directive(), "tickerscribe_core=info");
    assert_eq!(LogLevel::Trace.as_directive(), "tickerscribe_core=trace");
}
