use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.dataset.base_name, "NYTimes");
    assert_eq!(config.dataset.partition_size, 990);
    assert_eq!(config.dataset.partition_count, 10);
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.search.top_k, 5);
    assert_eq!(config.search.min_passage_chars, 100);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.dataset.partition_size = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidPartitionSize(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.dataset.base_name = "nested/name".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.ollama.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.search.top_k = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidTopK(0))
    ));
}

#[test]
fn bucket_settings_only_checked_for_bucket_backend() {
    let mut config = Config::default();
    config.storage.bucket.name = String::new();
    assert!(config.validate().is_ok());

    config.storage.backend = StorageBackend::Bucket;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBucketName(_))
    ));

    config.storage.bucket.name = "articles".to_string();
    config.storage.bucket.timeout_seconds = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTimeout(0))
    ));
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama
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
    let parsed: Config = toml::from_str(
        r#"
        [dataset]
        partition_size = 50

        [storage]
        backend = "bucket"
        "#,
    )
    .expect("should parse partial toml");

    assert_eq!(parsed.dataset.partition_size, 50);
    assert_eq!(parsed.dataset.base_name, "NYTimes");
    assert_eq!(parsed.storage.backend, StorageBackend::Bucket);
    assert_eq!(parsed.storage.bucket, BucketConfig::default());
}

#[test]
fn partition_file_name_convention() {
    let dataset = DatasetConfig::default();
    assert_eq!(dataset.partition_file_name(1), "NYTimes_part_1.csv");
    assert_eq!(dataset.partition_file_name(10), "NYTimes_part_10.csv");
}

#[test]
fn resolved_dataset_paths() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load default config");
    let absolute = temp_dir.path().join("elsewhere").join("vectors.npy");
    config.dataset.embedding_cache_path = absolute.clone();

    let resolved = config.resolved_dataset();
    assert_eq!(resolved.embedding_cache_path, absolute);
    assert_eq!(
        resolved.partition_dir,
        temp_dir.path().join("dataset/partitioned_nyt")
    );
}

#[test]
fn load_missing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load config successfully");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.dataset, DatasetConfig::default());
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::load(temp_dir.path()).expect("should load config successfully");
    config.dataset.partition_size = 25;
    config.search.top_k = 3;
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[dataset]\npartition_size = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}
