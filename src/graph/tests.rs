//! Graph model tests

use super::*;
use serde_json::json;

#[test]
fn test_label_names() {
    assert_eq!(Label::UmlFile.as_str(), "UMLFile");
    assert_eq!(Label::CodeFile.to_string(), "CodeFile");
    assert_eq!(serde_json::to_value(Label::UmlFile).unwrap(), json!("UMLFile"));
}

#[test]
fn test_composite_keys() {
    let attr = NodeKey::attribute("value", "float");
    assert_eq!(attr.label, Label::Attribute);
    assert_eq!(attr.key_json(), r#"["value","float"]"#);

    let file = NodeKey::uml_file("docs/UC01_activity.puml", ACTIVITY_DIAGRAM);
    assert_eq!(file.key[1], ("type", "ActivityDiagram".to_string()));
}

#[test]
fn test_key_json_distinguishes_values() {
    // Attribute ("a b", "c") must not collide with ("a", "b c")
    assert_ne!(
        NodeKey::attribute("a b", "c").key_json(),
        NodeKey::attribute("a", "b c").key_json()
    );
}

#[test]
fn test_key_validity() {
    assert!(NodeKey::class("S01").is_valid());
    assert!(!NodeKey::class("").is_valid());
    assert!(!NodeKey::attribute("value", "  ").is_valid());
}

#[test]
fn test_key_display() {
    assert_eq!(
        NodeKey::attribute("value", "float").to_string(),
        "Attribute{name: value, type: float}"
    );
}

#[test]
fn test_merge_node_collects_properties() {
    let stmt = Statement::merge_node(NodeKey::class("S01"), [("name", "Sensor")]);
    let Statement::MergeNode { key, properties } = stmt else {
        panic!("expected node merge");
    };
    assert_eq!(key, NodeKey::class("S01"));
    assert_eq!(properties.get("name"), Some(&"Sensor".to_string()));
}

#[test]
fn test_graph_node_get_str() {
    let mut properties = Properties::new();
    properties.insert("name".into(), "core".into());
    let node = GraphNode {
        label: Label::Component,
        properties,
    };
    assert_eq!(node.get_str("name"), Some("core"));
    assert_eq!(node.get_str("id"), None);
}

#[test]
fn test_write_summary_sums() {
    let mut total = WriteSummary::default();
    total += WriteSummary {
        nodes_created: 1,
        relationships_created: 2,
        properties_set: 3,
    };
    let total = total
        + WriteSummary {
            nodes_created: 1,
            ..Default::default()
        };
    assert_eq!(total.nodes_created, 2);
    assert_eq!(total.relationships_created, 2);
    assert!(!total.created_nothing());
    assert!(WriteSummary::default().created_nothing());
}
