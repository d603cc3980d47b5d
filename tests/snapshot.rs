//! Snapshot export/import round trips.

#![cfg(feature = "serde")]

use reg_access::snapshot::{export, import, KeySnapshot};
use reg_access::{Access, Registry, RegistryConfig, RootKey, ValueData, ValueType, View};

fn populate(registry: &Registry) {
    let app = registry
        .create_key(RootKey::CurrentUser, "Software\\App", Access::ALL_ACCESS)
        .unwrap();
    app.write_string("", "default").unwrap();
    app.write_u32("Count", 3).unwrap();
    app.write_i64("Big", -1).unwrap();
    app.write_expand_string("Home", "%USERPROFILE%\\app").unwrap();
    app.write_multi_string("List", &["one", "two"]).unwrap();
    app.write_raw("Blob", ValueType::Binary, &[0, 1, 0xfe, 0xff]).unwrap();
    app.write_raw("Odd", ValueType::Unknown(0x99), b"xyz").unwrap();

    app.create_child("Window\\Position", Access::ALL_ACCESS)
        .unwrap()
        .write_u32("X", 10)
        .unwrap();
    app.create_child("Plugins", Access::ALL_ACCESS).unwrap();
}

#[test]
fn test_round_trip_through_json() {
    let source = Registry::in_memory();
    populate(&source);

    let snapshot = export(&source, RootKey::CurrentUser, "Software\\App", View::Default).unwrap();
    assert_eq!(snapshot.name, "App");
    assert_eq!(snapshot.key_count(), 4);
    assert_eq!(snapshot.values.len(), 7);

    let json = snapshot.to_json().unwrap();
    let parsed = KeySnapshot::from_json(&json).unwrap();
    assert_eq!(parsed, snapshot);

    let target = Registry::in_memory();
    import(&target, RootKey::CurrentUser, "Restored", &parsed, View::Default).unwrap();
    let again = export(&target, RootKey::CurrentUser, "Restored", View::Default).unwrap();
    assert_eq!(again.values, snapshot.values);
    assert_eq!(again.subkeys, snapshot.subkeys);

    let key = target
        .open_key(RootKey::CurrentUser, "Restored", Access::READ)
        .unwrap();
    assert_eq!(key.read_string("").unwrap(), "default");
    assert_eq!(key.read_i64("Big").unwrap(), -1);
    assert_eq!(key.read_multi_string("List").unwrap(), ["one", "two"]);
    assert_eq!(
        key.read_value("Home").unwrap(),
        ValueData::ExpandString("%USERPROFILE%\\app".to_string())
    );
    assert_eq!(key.read_raw("Odd").unwrap(), (ValueType::Unknown(0x99), b"xyz".to_vec()));

    let position = target
        .open_key(RootKey::CurrentUser, "Restored\\Window\\Position", Access::READ)
        .unwrap();
    assert_eq!(position.read_u32("X").unwrap(), 10);
}

#[test]
fn test_binary_data_is_hex_in_json() {
    let registry = Registry::in_memory();
    populate(&registry);

    let snapshot = export(&registry, RootKey::CurrentUser, "Software\\App", View::Default).unwrap();
    assert_eq!(snapshot.value("blob").unwrap().data, "0001feff");
    assert!(snapshot.to_json().unwrap().contains("\"0001feff\""));
}

#[test]
fn test_import_merges_into_existing() {
    let registry = Registry::in_memory();
    let key = registry
        .create_key(RootKey::CurrentUser, "Merge", Access::ALL_ACCESS)
        .unwrap();
    key.write_u32("Keep", 1).unwrap();
    key.write_u32("Count", 99).unwrap();

    let json = r#"{
        "name": "Merge",
        "values": [{ "name": "Count", "value_type": "Dword", "data": "05000000" }],
        "subkeys": [{ "name": "New" }]
    }"#;
    let snapshot = KeySnapshot::from_json(json).unwrap();
    import(&registry, RootKey::CurrentUser, "Merge", &snapshot, View::Default).unwrap();

    assert_eq!(key.read_u32("Keep").unwrap(), 1);
    assert_eq!(key.read_u32("Count").unwrap(), 5);
    assert_eq!(key.subkey_count(), 1);
}

#[test]
fn test_config_serializes_with_defaults() {
    let config: RegistryConfig = serde_json::from_str(r#"{ "max_string_len": 64 }"#).unwrap();
    assert_eq!(config.max_string_len, 64);
    assert_eq!(config.max_name_len, RegistryConfig::DEFAULT_MAX_NAME_LEN);

    let json = serde_json::to_string(&RegistryConfig::default()).unwrap();
    let back: RegistryConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, RegistryConfig::default());
}
