//! End-to-end scenarios through the public API

use topoforge::export::{ExportIssue, ExportReport};
use topoforge::prelude::*;

fn web_and_db(store: &mut TopologyStore) -> (DeviceId, DeviceId) {
    let web = store
        .add_device_from_template(DeviceKind::Computer, "web", Position::new(0.0, 0.0))
        .unwrap();
    let db = store
        .add_device_from_template(DeviceKind::Database, "db", Position::new(200.0, 0.0))
        .unwrap();
    store
        .update_device(
            web,
            &DeviceUpdate::new()
                .image(Some("nginx:latest"))
                .ports(vec![PortMapping::tcp(8080, 80)]),
        )
        .unwrap();
    store
        .update_device(db, &DeviceUpdate::new().image(Some("postgres:15")))
        .unwrap();
    (web, db)
}

#[test]
fn test_web_and_database_on_backend() {
    let mut store = TopologyStore::new();
    let (web, db) = web_and_db(&mut store);
    store.add_connection(web, db, Some("backend")).unwrap();

    let bundle = topoforge::export(store.topology()).unwrap();
    let compose: serde_yaml::Value = serde_yaml::from_str(&bundle.compose).unwrap();

    let networks = compose["networks"].as_mapping().unwrap();
    assert_eq!(networks.len(), 1);
    assert!(compose["networks"]["backend"].is_mapping());

    let services = compose["services"].as_mapping().unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(compose["services"]["web"]["ports"][0].as_str(), Some("8080:80"));
    assert!(compose["services"]["web"]["networks"]["backend"].is_mapping());
    assert!(compose["services"]["db"]["networks"]["backend"].is_mapping());
    assert!(compose["services"]["db"].get("ports").is_none());

    let tf = &bundle.terraform;
    assert_eq!(tf.matches("resource \"docker_network\"").count(), 1);
    assert_eq!(tf.matches("resource \"docker_container\"").count(), 2);
    assert_eq!(tf.matches("name = docker_network.backend.name").count(), 2);
    assert!(tf.contains("external = 8080"));
    assert!(tf.contains("internal = 80"));
    assert!(bundle.warnings.is_empty());
}

/// Undo compose's `$$` escape
fn compose_literal(value: &str) -> String {
    value.replace("$$", "$")
}

/// Items of a single-line Terraform string list, with template escapes undone
fn terraform_strings(tf: &str, key: &str) -> Vec<String> {
    let line = tf
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with(key) && l[key.len()..].trim_start().starts_with("= ["))
        .unwrap_or_else(|| panic!("no {} list in:\n{}", key, tf));
    let items = line.split_once("= [").unwrap().1.strip_suffix(']').unwrap();
    items
        .split(", ")
        .map(|item| item.trim_matches('"').replace("$${", "${"))
        .collect()
}

#[test]
fn test_artifacts_agree_on_literal_values() {
    let mut store = TopologyStore::new();
    let (web, _) = web_and_db(&mut store);
    let environment = [
        ("GREETING".to_string(), "${HOME}".to_string()),
        ("PASSWORD".to_string(), "pa$word".to_string()),
    ]
    .into();
    store
        .update_device(
            web,
            &DeviceUpdate::new()
                .environment(environment)
                .command(Some(r#"sh -c "echo hello world""#)),
        )
        .unwrap();

    let bundle = topoforge::export(store.topology()).unwrap();
    let compose: serde_yaml::Value = serde_yaml::from_str(&bundle.compose).unwrap();
    let service = &compose["services"]["web"];

    let compose_env: Vec<String> = service["environment"]
        .as_mapping()
        .unwrap()
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_str().unwrap(), compose_literal(v.as_str().unwrap())))
        .collect();
    let expected_env = vec!["GREETING=${HOME}".to_string(), "PASSWORD=pa$word".to_string()];
    assert_eq!(compose_env, expected_env);
    assert_eq!(terraform_strings(&bundle.terraform, "env"), expected_env);

    let compose_command: Vec<String> = service["command"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| compose_literal(v.as_str().unwrap()))
        .collect();
    let expected_command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo hello world".to_string(),
    ];
    assert_eq!(compose_command, expected_command);
    assert_eq!(terraform_strings(&bundle.terraform, "command"), expected_command);
}

#[test]
fn test_unbalanced_command_quotes_block_export() {
    let mut store = TopologyStore::new();
    let (web, _) = web_and_db(&mut store);
    store
        .update_device(web, &DeviceUpdate::new().entrypoint(Some("sh -c \"oops")))
        .unwrap();

    let err = topoforge::export(store.topology()).unwrap_err();
    let TopologyError::Export(report) = err else {
        panic!("expected export error, got {:?}", err);
    };
    assert!(matches!(
        report.issues.as_slice(),
        [ExportIssue::UnsplittableCommand { field: "entrypoint", .. }]
    ));
}

#[test]
fn test_missing_image_produces_no_artifacts() {
    let mut store = TopologyStore::new();
    let (web, db) = web_and_db(&mut store);
    store.add_connection(web, db, Some("backend")).unwrap();
    store
        .update_device(web, &DeviceUpdate::new().image(None))
        .unwrap();

    let err = topoforge::export(store.topology()).unwrap_err();
    let TopologyError::Export(report) = err else {
        panic!("expected export error, got {:?}", err);
    };
    assert_eq!(report.offending_devices(), vec![web]);
    assert!(matches!(
        report.issues.as_slice(),
        [ExportIssue::MissingImage { device, .. }] if *device == web
    ));
}

#[test]
fn test_every_offending_device_is_reported() {
    let mut store = TopologyStore::new();
    let a = store
        .add_device_from_template(DeviceKind::Computer, "a", Position::default())
        .unwrap();
    let b = store
        .add_device_from_template(DeviceKind::Database, "b", Position::default())
        .unwrap();
    let c = store
        .add_device_from_template(DeviceKind::Computer, "c", Position::default())
        .unwrap();
    for id in [b, c] {
        store
            .update_device(
                id,
                &DeviceUpdate::new()
                    .image(Some("alpine"))
                    .ports(vec![PortMapping::tcp(80, 80)]),
            )
            .unwrap();
    }

    let err = ExportEngine::default().plan(store.topology()).unwrap_err();
    let TopologyError::Export(ExportReport { issues }) = err else {
        panic!("expected export error");
    };
    assert_eq!(issues.len(), 2);
    assert!(issues
        .iter()
        .any(|i| matches!(i, ExportIssue::MissingImage { device, .. } if *device == a)));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ExportIssue::HostPortConflict { device, port: 80, .. } if *device == c)));
}

#[test]
fn test_delete_cascades() {
    let mut store = TopologyStore::new();
    let a = store
        .add_device_from_template(DeviceKind::Computer, "a", Position::default())
        .unwrap();
    let b = store
        .add_device_from_template(DeviceKind::Computer, "b", Position::default())
        .unwrap();
    let conn = store.add_connection(a, b, None).unwrap();

    let removed = store.delete_device(a).unwrap();
    assert_eq!(removed, vec![conn]);
    assert_eq!(store.topology().device_count(), 1);
    assert_eq!(store.topology().connection_count(), 0);
    assert!(store.topology().device(b).is_some());
}

#[test]
fn test_connection_rejections() {
    let mut store = TopologyStore::new();
    let a = store
        .add_device_from_template(DeviceKind::Router, "r1", Position::default())
        .unwrap();
    let b = store
        .add_device_from_template(DeviceKind::Router, "r2", Position::default())
        .unwrap();

    let err = store.add_connection(a, a, None).unwrap_err();
    assert_eq!(err.tag(), ErrorTag::SelfConnection);

    store.add_connection(a, b, Some("core")).unwrap();
    let err = store.add_connection(b, a, Some("core")).unwrap_err();
    assert_eq!(err.tag(), ErrorTag::DuplicateConnection);

    // same pair on another network is a separate link
    store.add_connection(b, a, Some("mgmt")).unwrap();
    assert_eq!(store.topology().connection_count(), 2);
}

#[test]
fn test_default_network_is_order_independent() {
    let mut store = TopologyStore::new();
    let a = store
        .add_device_from_template(DeviceKind::Switch, "Edge Switch", Position::default())
        .unwrap();
    let b = store
        .add_device_from_template(DeviceKind::Firewall, "fw", Position::default())
        .unwrap();
    let conn = store.add_connection(b, a, None).unwrap();
    assert_eq!(
        store.topology().connection(conn).map(|c| c.network.as_str()),
        Some("net-edge-switch-fw")
    );
    let err = store.add_connection(a, b, None).unwrap_err();
    assert_eq!(err.tag(), ErrorTag::DuplicateConnection);
}

#[test]
fn test_move_device_is_idempotent() {
    let mut store = TopologyStore::new();
    let a = store
        .add_device_from_template(DeviceKind::Computer, "a", Position::default())
        .unwrap();
    store.move_device(a, Position::new(10.0, 20.0)).unwrap();
    let once = store.snapshot();
    store.move_device(a, Position::new(10.0, 20.0)).unwrap();
    assert_eq!(*store.snapshot(), *once);
}

#[test]
fn test_failed_update_leaves_store_untouched() {
    let mut store = TopologyStore::new();
    let a = store
        .add_device_from_template(DeviceKind::Computer, "a", Position::default())
        .unwrap();
    let before = store.snapshot();
    let revision = store.revision();

    let update = DeviceUpdate::new()
        .name("renamed")
        .ports(vec![PortMapping::tcp(80, 80), PortMapping::tcp(80, 81)]);
    let err = store.update_device(a, &update).unwrap_err();
    assert_eq!(err.tag(), ErrorTag::InvalidConfig);
    assert_eq!(*store.snapshot(), *before);
    assert_eq!(store.revision(), revision);
}

#[test]
fn test_snapshot_is_isolated_from_worker() {
    let mut store = TopologyStore::new();
    let (web, db) = web_and_db(&mut store);
    store.add_connection(web, db, Some("backend")).unwrap();

    let engine = ExportEngine::default();
    let expected = engine.export(store.topology()).unwrap();
    let handle = engine.spawn(store.snapshot());

    store.delete_device(db).unwrap();
    store
        .update_device(web, &DeviceUpdate::new().image(None))
        .unwrap();

    let bundle = handle.join().unwrap().unwrap();
    assert_eq!(bundle, expected);
}
