//! End-to-end resolution through the public API

use std::fs;
use std::sync::Arc;

use layerconf_core::vault::KvVersion;
use layerconf_core::{
    BackendError, DotenvOptions, DotenvSource, EnvSource, Field, FieldKind, FieldProblem,
    KeyNormalizer, MemoryBackend, NestedKeyDecoder, OverrideSource, RawValue, Schema,
    SettingsBuilder, SettingsError, VaultKvClient, VaultSource,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tempfile::tempdir;

fn credentials_schema() -> Schema {
    Schema::new()
        .field(Field::secret("api_key"))
        .field(Field::string("app_name"))
}

#[test]
fn test_overrides_win_over_env() {
    let settings = SettingsBuilder::new(credentials_schema())
        .overrides(OverrideSource::new().set("api_key", "X"))
        .source(EnvSource::from_vars([("API_KEY", "Y"), ("APP_NAME", "svc")]))
        .build()
        .unwrap();

    assert_eq!(settings.secret("api_key").unwrap().expose_secret(), "X");
    assert_eq!(settings.get_str("app_name"), Some("svc"));
    assert_eq!(settings.source_of("api_key").unwrap().source, "overrides");
    assert_eq!(settings.source_of("app_name").unwrap().source, "env");
}

#[test]
fn test_nested_env_decoding() {
    let vars = [
        ("V0", "0"),
        ("SUB_MODEL__V1", "json-1"),
        ("SUB_MODEL__DEEP__V4", "v4"),
    ];

    let keys = KeyNormalizer::new();
    let decoded = NestedKeyDecoder::new("__")
        .decode(vars.iter().filter_map(|(k, v)| keys.normalize(k).map(|k| (k, *v))))
        .unwrap();
    assert_eq!(
        serde_json::to_value(&decoded).unwrap(),
        json!({"v0": "0", "sub_model": {"v1": "json-1", "deep": {"v4": "v4"}}})
    );

    let schema = Schema::new().field(Field::string("v0")).field(Field::object(
        "sub_model",
        Schema::new()
            .field(Field::string("v1"))
            .field(Field::object("deep", Schema::new().field(Field::string("v4")))),
    ));
    let settings = SettingsBuilder::new(schema)
        .source(EnvSource::from_vars(vars).with_nested_delimiter("__"))
        .build()
        .unwrap();

    assert_eq!(
        settings.to_json(),
        json!({"v0": "0", "sub_model": {"v1": "json-1", "deep": {"v4": "v4"}}})
    );
    assert_eq!(settings.source_of("sub_model.deep.v4").unwrap().source, "env");
}

#[test]
fn test_env_json_merges_with_nested_keys() {
    let schema = Schema::new().field(Field::object(
        "db",
        Schema::new()
            .field(Field::string("host"))
            .field(Field::integer("port")),
    ));
    let settings = SettingsBuilder::new(schema)
        .source(
            EnvSource::from_vars([
                ("DB", r#"{"host": "json-host", "port": 5432}"#),
                ("DB__HOST", "nested-host"),
            ])
            .with_nested_delimiter("__"),
        )
        .build()
        .unwrap();

    assert_eq!(settings.get_str("db.host"), Some("nested-host"));
    assert_eq!(settings.get("db.port").unwrap().as_i64(), Some(5432));
}

#[test]
fn test_backend_forbidden_falls_back_to_dotenv() {
    let dir = tempdir().unwrap();
    let env_file = dir.path().join("app.prod.conf");
    fs::write(&env_file, "API_KEY=from-dotenv\nAPP_NAME=svc\n").unwrap();

    let backend = Arc::new(MemoryBackend::new().failing(BackendError::Forbidden {
        path: "app/prod".to_string(),
    }));
    let settings = SettingsBuilder::new(credentials_schema())
        .source(VaultSource::with_backend(backend.clone(), "app/prod", None))
        .source(DotenvSource::load(&env_file, DotenvOptions::default()).unwrap())
        .build()
        .unwrap();

    assert_eq!(settings.secret("api_key").unwrap().expose_secret(), "from-dotenv");
    assert_eq!(settings.get_str("app_name"), Some("svc"));
    assert_eq!(settings.source_of("api_key").unwrap().source, "dotenv");
    // one read shared by every field
    assert_eq!(backend.reads(), 1);
}

#[test]
fn test_vault_http_forbidden_is_contained() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/v1/secret/data/app")
        .with_status(403)
        .with_body(r#"{"errors": ["permission denied"]}"#)
        .expect(1)
        .create();

    let client = VaultKvClient::builder(server.url(), SecretString::new("token".into()))
        .kv_version(KvVersion::V2)
        .build()
        .unwrap();
    let settings = SettingsBuilder::new(credentials_schema())
        .source(VaultSource::with_backend(client, "app", None))
        .source(EnvSource::from_vars([("API_KEY", "env-key"), ("APP_NAME", "svc")]))
        .build()
        .unwrap();

    mock.assert();
    assert_eq!(settings.secret("api_key").unwrap().expose_secret(), "env-key");
}

#[test]
fn test_vault_values_take_priority_over_dotenv() {
    let dir = tempdir().unwrap();
    let env_file = dir.path().join(".env");
    fs::write(&env_file, "API_KEY=from-dotenv\nAPP_NAME=svc\n").unwrap();

    let backend = MemoryBackend::new().with_secret("app", [("API_KEY", "from-vault")]);
    let settings = SettingsBuilder::new(credentials_schema())
        .source(VaultSource::with_backend(backend, "app", None))
        .source(DotenvSource::load(&env_file, DotenvOptions::default()).unwrap())
        .build()
        .unwrap();

    assert_eq!(settings.secret("api_key").unwrap().expose_secret(), "from-vault");
    assert_eq!(settings.source_of("app_name").unwrap().source, "dotenv");
}

#[test]
fn test_required_field_missing_everywhere() {
    let backend = MemoryBackend::new().failing(BackendError::Transport("connection refused".into()));
    let err = SettingsBuilder::new(credentials_schema())
        .source(VaultSource::with_backend(backend, "app", None))
        .source(EnvSource::from_vars([("APP_NAME", "svc")]))
        .build()
        .unwrap_err();

    let SettingsError::Validation(errors) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.paths(), vec!["api_key"]);
    assert!(matches!(errors.errors()[0].problem, FieldProblem::Missing));
}

#[test]
fn test_all_validation_errors_reported() {
    let schema = Schema::new()
        .field(Field::integer("port"))
        .field(Field::boolean("debug"))
        .field(Field::list("ports", FieldKind::Integer))
        .field(Field::string("name"));
    let err = SettingsBuilder::new(schema)
        .set("port", "eighty")
        .set("debug", "maybe")
        .set("ports", RawValue::List(vec!["80".into(), "x".into()]))
        .build()
        .unwrap_err();

    let SettingsError::Validation(errors) = err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(errors.paths(), vec!["port", "debug", "ports.1", "name"]);
}

#[test]
fn test_complex_value_with_invalid_json_fails() {
    let schema = Schema::new().field(Field::list("hosts", FieldKind::String));
    let result = SettingsBuilder::new(schema)
        .source(EnvSource::from_vars([("HOSTS", "[not json")]))
        .build();
    assert!(matches!(result, Err(SettingsError::Decode(_))));
}

#[test]
fn test_nested_key_through_scalar_fails() {
    let db = Schema::new().field(Field::string("host"));
    let result = SettingsBuilder::new(Schema::new().field(Field::object("db", db)))
        .source(
            EnvSource::from_vars([("DB__HOST", "h"), ("DB__HOST__X", "x")])
                .with_nested_delimiter("__"),
        )
        .build();
    assert!(matches!(result, Err(SettingsError::Decode(_))));
}

#[test]
fn test_required_dotenv_missing_is_error() {
    let dir = tempdir().unwrap();
    let result = DotenvSource::load(
        dir.path().join("missing.env"),
        DotenvOptions::default().required(true),
    );
    assert!(matches!(result, Err(SettingsError::SourceUnavailable { .. })));
}

#[test]
fn test_deserialize_into_struct() {
    #[derive(serde::Deserialize)]
    struct Db {
        host: String,
        port: u16,
    }

    #[derive(serde::Deserialize)]
    struct AppSettings {
        api_key: String,
        debug: bool,
        db: Db,
    }

    let schema = Schema::new()
        .field(Field::secret("api_key"))
        .field(Field::boolean("debug").with_default(false))
        .field(Field::object(
            "db",
            Schema::new()
                .field(Field::string("host"))
                .field(Field::integer("port").with_default(5432)),
        ));
    let settings = SettingsBuilder::new(schema)
        .source(
            EnvSource::from_vars([("APP_API_KEY", "sk"), ("APP_DB__HOST", "db.local")])
                .with_prefix("APP_")
                .with_nested_delimiter("__"),
        )
        .build()
        .unwrap();

    assert_eq!(settings.to_json()["api_key"], "**********");
    let app: AppSettings = settings.deserialize().unwrap();
    assert_eq!(app.api_key, "sk");
    assert!(!app.debug);
    assert_eq!(app.db.host, "db.local");
    assert_eq!(app.db.port, 5432);
}
