use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use mail_proxy::core::config::ProxyConfig;
use mail_proxy::core::error::ProxyError;
use mail_proxy::infrastructure::memory::{MemoryConnector, MemoryMailbox, MemoryMessage};
use mail_proxy::services::proxy::Proxy;
use mail_proxy::services::source::storage::MailFlag;

fn message(text: &str) -> MemoryMessage {
    MemoryMessage::new(format!(
        "From: sender@example.com\r\nSubject: test\r\n\r\n{text}\r\n"
    ))
}

fn seen_message(text: &str) -> MemoryMessage {
    MemoryMessage::with_flags(
        format!("From: sender@example.com\r\nSubject: test\r\n\r\n{text}\r\n"),
        &[MailFlag::Seen],
    )
}

fn source_entry(kind: &str) -> serde_json::Value {
    json!({
        "type": kind,
        "connection": { "username": "user@example.com", "password": "secret" }
    })
}

fn config(output_folder: &Path, sources: serde_json::Value) -> ProxyConfig {
    serde_json::from_value(json!({
        "global": {
            "host": "mail.example.com",
            "port": 143,
            "ssl": "none",
            "output_folder": output_folder
        },
        "sources": sources
    }))
    .unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().into_string().unwrap())
        .collect()
}

#[tokio::test]
async fn test_all_sources_processed_and_persisted() {
    let out = tempdir().unwrap();
    let alpha = MemoryMailbox::new(vec![message("first"), message("second")]);
    let beta = MemoryMailbox::new(vec![message("third")]);

    let mut connector = MemoryConnector::new();
    connector.register("alpha", Arc::clone(&alpha));
    connector.register("beta", Arc::clone(&beta));

    let config = config(
        out.path(),
        json!({ "alpha": source_entry("imap"), "beta": source_entry("pop") }),
    );
    let mut proxy = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .unwrap();

    proxy.process_resources().await.unwrap();

    assert_eq!(file_names(&out.path().join("imap")).len(), 2);
    assert_eq!(file_names(&out.path().join("pop")).len(), 1);

    // Per-unit acknowledgement flagged the IMAP messages as seen.
    let alpha = alpha.lock().unwrap();
    assert!(alpha.messages[0].flags.contains(&MailFlag::Seen));
    assert!(alpha.messages[1].flags.contains(&MailFlag::Seen));
}

#[tokio::test]
async fn test_missing_output_folder_fails_before_any_connection() {
    let connector = Arc::new(MemoryConnector::new());
    let config: ProxyConfig = serde_json::from_value(json!({
        "global": { "host": "mail.example.com", "port": 143, "ssl": "none" },
        "sources": { "alpha": source_entry("imap") }
    }))
    .unwrap();

    let err = Proxy::with_connector("main", config, connector.clone())
        .await
        .err()
        .expect("construction must fail");

    match err {
        ProxyError::BadProxyConfiguration(message) => {
            assert!(message.contains("output_folder"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(connector.opened(), 0);
}

#[tokio::test]
async fn test_unsupported_crypt_protocol_fails_construction() {
    let out = tempdir().unwrap();
    let mut connector = MemoryConnector::new();
    connector.register("alpha", MemoryMailbox::new(vec![]));

    let config = config(
        out.path(),
        json!({
            "alpha": {
                "type": "imap",
                "connection": {
                    "username": "user@example.com",
                    "password": "secret",
                    "ssl": "SSLv3"
                }
            }
        }),
    );

    let err = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .err()
        .expect("construction must fail");
    match err {
        ProxyError::BadProxyConfiguration(message) => {
            assert!(message.contains("SSLv3"));
            assert!(message.contains("cryptographic"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_sources_table_fails_construction() {
    let out = tempdir().unwrap();
    let config: ProxyConfig = serde_json::from_value(json!({
        "global": { "output_folder": out.path() }
    }))
    .unwrap();

    let err = Proxy::with_connector("main", config, Arc::new(MemoryConnector::new()))
        .await
        .err()
        .expect("construction must fail");
    assert!(matches!(err, ProxyError::MissingSourcesConfig));
}

#[tokio::test]
async fn test_failing_unit_action_still_processes_every_item() {
    let out = tempdir().unwrap();
    let gamma = MemoryMailbox::new(vec![message("one"), message("two"), message("three")]);
    gamma.lock().unwrap().fail_flag_updates.insert(2);

    let mut connector = MemoryConnector::new();
    connector.register("gamma", Arc::clone(&gamma));

    let config = config(out.path(), json!({ "gamma": source_entry("imap") }));
    let mut proxy = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .unwrap();

    let err = proxy
        .process_resources_by_source_name("gamma")
        .await
        .err()
        .expect("the failing acknowledgement must surface");

    match err {
        ProxyError::PostParse { errors, .. } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("message 2"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Every message was still persisted.
    assert_eq!(file_names(&out.path().join("imap")).len(), 3);
    // The messages whose acknowledgement worked are flagged seen.
    let gamma = gamma.lock().unwrap();
    assert!(gamma.messages[0].flags.contains(&MailFlag::Seen));
    assert!(!gamma.messages[1].flags.contains(&MailFlag::Seen));
    assert!(gamma.messages[2].flags.contains(&MailFlag::Seen));
}

#[tokio::test]
async fn test_failing_source_does_not_stop_the_others() {
    let out = tempdir().unwrap();
    let alpha = MemoryMailbox::new(vec![message("a1"), message("a2")]);
    let beta = MemoryMailbox::new(vec![message("b1")]);
    beta.lock().unwrap().fail_flag_updates.insert(1);

    let mut connector = MemoryConnector::new();
    connector.register("alpha", Arc::clone(&alpha));
    connector.register("beta", Arc::clone(&beta));

    let config = config(
        out.path(),
        json!({ "alpha": source_entry("imap"), "beta": source_entry("imap") }),
    );
    let mut proxy = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .unwrap();

    let err = proxy
        .process_resources()
        .await
        .err()
        .expect("the failing source must surface");

    match err {
        ProxyError::GlobalProcess { proxy, errors } => {
            assert_eq!(proxy, "main");
            assert_eq!(errors.len(), 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Both of alpha's messages and beta's message are on disk regardless.
    let imap_files = file_names(&out.path().join("imap"));
    assert_eq!(imap_files.len(), 3);
    assert_eq!(
        imap_files
            .iter()
            .filter(|name| name.starts_with("imap_resource_alpha_"))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_unknown_source_name_writes_nothing() {
    let out = tempdir().unwrap();
    let mut connector = MemoryConnector::new();
    connector.register("alpha", MemoryMailbox::new(vec![message("a1")]));

    let config = config(out.path(), json!({ "alpha": source_entry("imap") }));
    let mut proxy = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .unwrap();

    let err = proxy
        .process_resources_by_source_name("nonexistent")
        .await
        .err()
        .expect("lookup must fail");
    match err {
        ProxyError::SourceNotFound(name) => assert_eq!(name, "nonexistent"),
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unread_only_filter_skips_seen_messages() {
    let out = tempdir().unwrap();
    let alpha = MemoryMailbox::new(vec![
        message("m1"),
        seen_message("m2"),
        message("m3"),
        seen_message("m4"),
        message("m5"),
    ]);

    let mut connector = MemoryConnector::new();
    connector.register("alpha", Arc::clone(&alpha));

    let config = config(
        out.path(),
        json!({
            "alpha": {
                "type": "imap",
                "connection": {
                    "username": "user@example.com",
                    "password": "secret",
                    "filter": { "message_status": "unread_only" }
                }
            }
        }),
    );
    let mut proxy = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .unwrap();

    proxy.process_resources().await.unwrap();

    assert_eq!(file_names(&out.path().join("imap")).len(), 3);
}

#[tokio::test]
async fn test_disabled_source_is_skipped_entirely() {
    let out = tempdir().unwrap();
    let mut connector = MemoryConnector::new();
    connector.register("alpha", MemoryMailbox::new(vec![message("a1")]));
    connector.register("beta", MemoryMailbox::new(vec![message("b1")]));
    let connector = Arc::new(connector);

    let config = config(
        out.path(),
        json!({
            "alpha": source_entry("imap"),
            "beta": {
                "type": "pop",
                "status": "disabled",
                "connection": { "username": "user@example.com", "password": "secret" }
            }
        }),
    );
    let mut proxy = Proxy::with_connector("main", config, connector.clone())
        .await
        .unwrap();

    proxy.process_resources().await.unwrap();

    assert_eq!(connector.opened(), 1);
    assert_eq!(file_names(&out.path().join("imap")).len(), 1);
    assert!(file_names(&out.path().join("pop")).is_empty());
    assert!(proxy.source_by_name("beta").is_none());
}

#[tokio::test]
async fn test_any_failing_source_aborts_construction() {
    let out = tempdir().unwrap();
    let mut connector = MemoryConnector::new();
    connector.register("alpha", MemoryMailbox::new(vec![]));
    // "ghost" is intentionally not registered.

    let config = config(
        out.path(),
        json!({ "alpha": source_entry("imap"), "ghost": source_entry("imap") }),
    );
    let err = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .err()
        .expect("construction must fail for the unknown account");
    match err {
        ProxyError::BadProxyConfiguration(message) => {
            assert!(message.contains("ghost"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_cursor_walks_sources_in_configuration_order() {
    let out = tempdir().unwrap();
    let mut connector = MemoryConnector::new();
    connector.register("beta", MemoryMailbox::new(vec![]));
    connector.register("alpha", MemoryMailbox::new(vec![]));

    let config = config(
        out.path(),
        json!({ "beta": source_entry("pop"), "alpha": source_entry("imap") }),
    );
    let mut proxy = Proxy::with_connector("main", config, Arc::new(connector))
        .await
        .unwrap();

    let mut walked = Vec::new();
    while proxy.has_more_sources() {
        walked.push(proxy.current_source().unwrap().name().to_string());
        proxy.advance();
    }
    assert_eq!(walked, vec!["beta", "alpha"]);
    assert!(proxy.current_source().is_none());
}
