use resource_sdk::schema::AssociationKind;
use resource_sdk::{load_from_dir, resolve, ConfigError};
use std::path::PathBuf;

fn sample_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("example_consumer/sample")
}

#[tokio::test]
async fn sample_config_resolves() {
    let config = load_from_dir(sample_dir()).await.unwrap();
    assert_eq!(config.tables.len(), 4);
    let model = resolve(&config).unwrap();

    let authors = model.resource_by_path("authors").unwrap();
    assert_eq!(authors.hidden, ["password_hash"]);
    assert_eq!(authors.associations.of_kind(AssociationKind::HasMany).count(), 1);
    let name = authors.validator.field("name").unwrap();
    assert!(name.presence_required);

    let articles = model.resource_by_path("articles").unwrap();
    assert_eq!(articles.schema.column("title").unwrap().length, Some(120));
    let rules: Vec<_> = articles
        .validator
        .field("title")
        .unwrap()
        .rules
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(rules, ["maxLength", "minLength"]);
    assert!(model.resource_by_path("articles_tags").is_none());
}

#[tokio::test]
async fn missing_directory_loads_as_empty_config() {
    let config = load_from_dir(sample_dir().join("absent")).await.unwrap();
    assert!(config.tables.is_empty());
    assert_eq!(config.schemas[0].name, "public");
    assert!(resolve(&config).unwrap().resources.is_empty());
}

#[tokio::test]
async fn malformed_documents_are_load_errors() {
    let dir = std::env::temp_dir().join(format!("resource-sdk-bad-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("tables.json"), "{ not json").await.unwrap();
    let err = load_from_dir(&dir).await.unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
