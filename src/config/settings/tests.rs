use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.ollama.batch_size, 16);
    assert_eq!(config.chunking.chunk_size, 750);
    assert_eq!(config.chunking.chunk_overlap, 0);
    assert!(config.retrieval.compress);
    assert!(!config.generation.keyword_prefilter);
    assert_eq!(config.storage.default_backend, Backend::Lance);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.chat_model = "   ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.temperature = 3.5;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn chunking_validation() {
    let mut config = Config::default();
    config.chunking.chunk_size = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(0))
    ));

    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 100;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));

    config.chunking.chunk_overlap = 20;
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        [ollama]
        host = "gpu-box"

        [storage]
        default_backend = "flat"
    "#;
    let parsed: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(parsed.ollama.host, "gpu-box");
    assert_eq!(parsed.ollama.port, 11434);
    assert_eq!(parsed.storage.default_backend, Backend::Flat);
    assert_eq!(parsed.chunking, ChunkingConfig::default());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_embedding_model("new-model".to_string()).is_ok());
    assert!(config.set_chat_model("chat-model".to_string()).is_ok());
    assert!(config.set_batch_size(128).is_ok());
    assert!(config.set_embedding_dimension(1024).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_chat_model(String::new()).is_err());
    assert!(config.set_batch_size(0).is_err());
    assert!(config.set_batch_size(1001).is_err());
    assert!(config.set_embedding_dimension(8).is_err());
}

#[test]
fn storage_paths_default_to_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load default config");

    assert_eq!(config.docs_dir(), temp_dir.path().join("docs"));
    assert_eq!(config.index_root(), temp_dir.path().join("vector_storage"));
    assert_eq!(
        config.backend_path(Backend::Lance),
        temp_dir.path().join("vector_storage").join("lancedb")
    );
    assert_eq!(
        config.backend_path(Backend::Flat),
        temp_dir.path().join("vector_storage").join("flat_index")
    );
}

#[test]
fn storage_paths_respect_overrides() {
    let mut config = Config::default();
    config.storage.docs_dir = Some(PathBuf::from("/srv/mrm/docs"));
    config.storage.index_dir = Some(PathBuf::from("/srv/mrm/index"));

    assert_eq!(config.docs_dir(), PathBuf::from("/srv/mrm/docs"));
    assert_eq!(
        config.backend_path(Backend::Flat),
        PathBuf::from("/srv/mrm/index/flat_index")
    );
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load default config");
    config.ollama.chat_model = "qwen2.5:7b".to_string();
    config.chunking.chunk_size = 500;
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[ollama]\nbatch_size = 0\n",
    )
    .expect("should write config file");

    assert!(Config::load(temp_dir.path()).is_err());
}
