use super::*;
use tempfile::TempDir;

#[test]
fn test_model_info() {
    let info = WhisperModel::WhisperSmall.info();
    assert_eq!(info.filename, "ggml-small.bin");
    assert!(info.url.contains("ggml-small.bin"));
    assert!(info.size_bytes.is_some());
}

#[test]
fn test_model_str_roundtrip() {
    for model in WhisperModel::all() {
        let parsed: WhisperModel = model.as_str().parse().unwrap();
        assert_eq!(parsed, *model);
        assert_eq!(model.to_string(), model.as_str());
    }
}

#[test]
fn test_unknown_model_name_lists_alternatives() {
    let err = "whisper-gigantic".parse::<WhisperModel>().unwrap_err();
    assert!(err.contains("whisper-small"));
}

#[test]
fn test_model_manager_custom_dir() {
    let temp = TempDir::new().unwrap();
    let manager = ModelManager::with_dir(temp.path());
    assert_eq!(manager.models_dir(), temp.path());
}

#[test]
fn test_is_cached_reflects_filesystem() {
    let temp = TempDir::new().unwrap();
    let manager = ModelManager::with_dir(temp.path());

    assert!(!manager.is_cached(WhisperModel::WhisperTiny));

    let path = temp.path().join(WhisperModel::WhisperTiny.info().filename);
    std::fs::write(&path, b"stub").unwrap();
    assert!(manager.is_cached(WhisperModel::WhisperTiny));
}

#[tokio::test]
async fn test_ensure_model_uses_cached_file() {
    let temp = TempDir::new().unwrap();
    let manager = ModelManager::with_dir(temp.path());

    // A file with the expected size passes validation without touching
    // the network. Sparse so the test stays cheap.
    let info = WhisperModel::WhisperTiny.info();
    let path = temp.path().join(info.filename);
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(info.size_bytes.unwrap()).unwrap();

    let resolved = manager.ensure_model(WhisperModel::WhisperTiny).await.unwrap();
    assert_eq!(resolved, path);
}

#[tokio::test]
async fn test_ensure_model_removes_wrong_size_file() {
    let temp = TempDir::new().unwrap();
    let manager = ModelManager::with_dir(temp.path());

    let info = WhisperModel::WhisperTiny.info();
    let path = temp.path().join(info.filename);
    std::fs::write(&path, b"truncated download").unwrap();

    // The corrupted artifact is deleted before the re-download attempt.
    // Whether the download itself succeeds depends on the environment,
    // but the truncated file must never survive as-is.
    let _ = manager.ensure_model(WhisperModel::WhisperTiny).await;
    if path.exists() {
        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, info.size_bytes.unwrap());
    }
}
