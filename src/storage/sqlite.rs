//! SQLite storage backend
//!
//! An embedded property graph: one table of nodes keyed by (label, key) and
//! one table of edges keyed by relation plus both endpoint identities.
//! Properties are kept as a JSON object and merged with `json_patch`, so a
//! node upsert overwrites the supplied properties and keeps the rest.

use super::traits::{
    ChainCounts, GraphStore, OpenStore, Orphans, StorageError, StorageResult, TraceChain,
};
use crate::graph::{
    GraphNode, Label, NodeKey, Properties, RelationType, Statement, WriteSummary,
};
use rusqlite::{named_params, params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed graph store
///
/// Thread-safe via internal mutex on the connection. Each operation holds
/// the guard for its whole duration.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Nodes: key is the JSON array of key property values
            CREATE TABLE IF NOT EXISTS nodes (
                label TEXT NOT NULL,
                key TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (label, key)
            );

            -- Edges: at most one per (relation, source, target)
            CREATE TABLE IF NOT EXISTS edges (
                relation TEXT NOT NULL,
                source_label TEXT NOT NULL,
                source_key TEXT NOT NULL,
                target_label TEXT NOT NULL,
                target_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (relation, source_label, source_key, target_label, target_key)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target
                ON edges(target_label, target_key, relation);

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Scoped access to the connection; released when the guard drops
    fn session(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn check_key(key: &NodeKey) -> StorageResult<()> {
        if key.is_valid() {
            Ok(())
        } else {
            Err(StorageError::InvalidStatement(format!("empty key in {}", key)))
        }
    }

    fn apply(conn: &Connection, statement: &Statement) -> StorageResult<WriteSummary> {
        match statement {
            Statement::MergeNode { key, properties } => Self::merge_node(conn, key, properties),
            Statement::MergeEdge { from, relation, to } => {
                Self::merge_edge(conn, from, *relation, to)
            }
        }
    }

    fn merge_node(
        conn: &Connection,
        key: &NodeKey,
        properties: &Properties,
    ) -> StorageResult<WriteSummary> {
        Self::check_key(key)?;
        let key_json = key.key_json();

        let exists = conn
            .query_row(
                "SELECT 1 FROM nodes WHERE label = ?1 AND key = ?2",
                params![key.label.as_str(), key_json],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        // Key properties always win over a same-named supplied property
        let mut merged = properties.clone();
        merged.extend(key.key_properties());
        let properties_json = serde_json::to_string(&merged)?;

        conn.execute(
            r#"
            INSERT INTO nodes (label, key, properties_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(label, key) DO UPDATE SET
                properties_json = json_patch(nodes.properties_json, excluded.properties_json)
            "#,
            params![
                key.label.as_str(),
                key_json,
                properties_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        let properties_set = if exists {
            properties.len()
        } else {
            merged.len()
        };
        Ok(WriteSummary {
            nodes_created: u64::from(!exists),
            relationships_created: 0,
            properties_set: properties_set as u64,
        })
    }

    fn merge_edge(
        conn: &Connection,
        from: &NodeKey,
        relation: RelationType,
        to: &NodeKey,
    ) -> StorageResult<WriteSummary> {
        Self::check_key(from)?;
        Self::check_key(to)?;

        // Inserts nothing when either endpoint is missing or the edge exists
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO edges
                (relation, source_label, source_key, target_label, target_key, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6
            WHERE EXISTS (SELECT 1 FROM nodes WHERE label = ?2 AND key = ?3)
              AND EXISTS (SELECT 1 FROM nodes WHERE label = ?4 AND key = ?5)
            "#,
            params![
                relation.as_str(),
                from.label.as_str(),
                from.key_json(),
                to.label.as_str(),
                to.key_json(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(WriteSummary {
            relationships_created: inserted as u64,
            ..Default::default()
        })
    }

    fn query_strings(
        conn: &Connection,
        sql: &str,
        params: &[(&str, &dyn rusqlite::ToSql)],
    ) -> StorageResult<Vec<String>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl GraphStore for SqliteStore {
    fn execute(&self, statement: &Statement) -> StorageResult<WriteSummary> {
        let conn = self.session()?;
        Self::apply(&conn, statement)
    }

    fn transaction(&self, statements: &[Statement]) -> StorageResult<WriteSummary> {
        let mut conn = self.session()?;
        let tx = conn.transaction()?;

        let mut total = WriteSummary::default();
        for statement in statements {
            match Self::apply(&tx, statement) {
                Ok(summary) => total += summary,
                Err(e) => {
                    // Dropping `tx` rolls the batch back
                    tracing::warn!(error = %e, "transaction rolled back");
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        Ok(total)
    }

    fn find_nodes(
        &self,
        label: Label,
        any_of: &[(&'static str, &str)],
    ) -> StorageResult<Vec<GraphNode>> {
        let conn = self.session()?;

        let mut sql = String::from("SELECT properties_json FROM nodes WHERE label = ?1");
        let mut values: Vec<String> = vec![label.as_str().to_string()];
        if !any_of.is_empty() {
            let clauses: Vec<String> = any_of
                .iter()
                .map(|(prop, value)| {
                    values.push(format!("$.{}", prop));
                    values.push(value.to_string());
                    format!(
                        "json_extract(properties_json, ?{}) = ?{}",
                        values.len() - 1,
                        values.len()
                    )
                })
                .collect();
            sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }
        sql.push_str(" ORDER BY key");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
            row.get::<_, String>(0)
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            let properties: Properties = serde_json::from_str(&row?)?;
            nodes.push(GraphNode { label, properties });
        }
        Ok(nodes)
    }

    fn count_nodes(&self, label: Label) -> StorageResult<u64> {
        let conn = self.session()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE label = ?1",
            params![label.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_edges(&self, relation: RelationType) -> StorageResult<u64> {
        let conn = self.session()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE relation = ?1",
            params![relation.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn trace_chains(&self, limit: usize) -> StorageResult<Vec<TraceChain>> {
        let conn = self.session()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT json_extract(u.properties_json, '$.id'),
                   COALESCE(json_extract(c.properties_json, '$.name'),
                            json_extract(c.properties_json, '$.id')),
                   json_extract(f.properties_json, '$.path')
            FROM edges t
            JOIN nodes c ON c.label = t.source_label AND c.key = t.source_key
            JOIN nodes u ON u.label = t.target_label AND u.key = t.target_key
            JOIN edges i ON i.relation = :implements
                        AND i.target_label = t.source_label
                        AND i.target_key = t.source_key
                        AND i.source_label = :code_file
            JOIN nodes f ON f.label = i.source_label AND f.key = i.source_key
            WHERE t.relation = :trace
              AND t.source_label = :class
              AND t.target_label = :use_case
            ORDER BY 1, 2, 3
            LIMIT :limit
            "#,
        )?;

        let rows = stmt.query_map(
            named_params! {
                ":implements": RelationType::Implements.as_str(),
                ":trace": RelationType::Trace.as_str(),
                ":code_file": Label::CodeFile.as_str(),
                ":class": Label::Class.as_str(),
                ":use_case": Label::UseCase.as_str(),
                ":limit": limit as i64,
            },
            |row| {
                Ok(TraceChain {
                    use_case_id: row.get(0)?,
                    class_name: row.get(1)?,
                    file_path: row.get(2)?,
                })
            },
        )?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn chain_counts(&self) -> StorageResult<ChainCounts> {
        let conn = self.session()?;

        let use_cases: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE label = ?1",
            params![Label::UseCase.as_str()],
            |row| row.get(0),
        )?;

        let classes: i64 = conn.query_row(
            r#"
            SELECT COUNT(DISTINCT source_key) FROM edges
            WHERE relation = :trace AND source_label = :class AND target_label = :use_case
            "#,
            named_params! {
                ":trace": RelationType::Trace.as_str(),
                ":class": Label::Class.as_str(),
                ":use_case": Label::UseCase.as_str(),
            },
            |row| row.get(0),
        )?;

        let code_files: i64 = conn.query_row(
            r#"
            SELECT COUNT(DISTINCT i.source_key) FROM edges i
            WHERE i.relation = :implements
              AND i.source_label = :code_file
              AND i.target_label = :class
              AND i.target_key IN (
                  SELECT source_key FROM edges
                  WHERE relation = :trace AND source_label = :class AND target_label = :use_case
              )
            "#,
            named_params! {
                ":implements": RelationType::Implements.as_str(),
                ":trace": RelationType::Trace.as_str(),
                ":code_file": Label::CodeFile.as_str(),
                ":class": Label::Class.as_str(),
                ":use_case": Label::UseCase.as_str(),
            },
            |row| row.get(0),
        )?;

        Ok(ChainCounts {
            use_cases: use_cases as u64,
            classes: classes as u64,
            code_files: code_files as u64,
        })
    }

    fn orphans(&self) -> StorageResult<Orphans> {
        let conn = self.session()?;

        let use_cases_without_class = Self::query_strings(
            &conn,
            r#"
            SELECT json_extract(u.properties_json, '$.id') FROM nodes u
            WHERE u.label = :use_case
              AND NOT EXISTS (
                  SELECT 1 FROM edges e
                  WHERE e.target_label = u.label AND e.target_key = u.key
                    AND e.relation IN (:trace, :supports)
              )
            ORDER BY 1
            "#,
            named_params! {
                ":use_case": Label::UseCase.as_str(),
                ":trace": RelationType::Trace.as_str(),
                ":supports": RelationType::Supports.as_str(),
            },
        )?;

        let classes_without_file = Self::query_strings(
            &conn,
            r#"
            SELECT COALESCE(json_extract(c.properties_json, '$.name'),
                            json_extract(c.properties_json, '$.id')) FROM nodes c
            WHERE c.label = :class
              AND NOT EXISTS (
                  SELECT 1 FROM edges e
                  WHERE e.target_label = c.label AND e.target_key = c.key
                    AND e.relation = :implements
              )
            ORDER BY 1
            "#,
            named_params! {
                ":class": Label::Class.as_str(),
                ":implements": RelationType::Implements.as_str(),
            },
        )?;

        Ok(Orphans {
            use_cases_without_class,
            classes_without_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn class(id: &str, name: &str) -> Statement {
        Statement::merge_node(NodeKey::class(id), [("name", name)])
    }

    #[test]
    fn test_merge_node_creates_once() {
        let store = create_test_store();

        let first = store.execute(&class("S01", "Sensor")).unwrap();
        assert_eq!(first.nodes_created, 1);
        // id + name
        assert_eq!(first.properties_set, 2);

        let second = store.execute(&class("S01", "Sensor")).unwrap();
        assert_eq!(second.nodes_created, 0);
        assert_eq!(second.properties_set, 1);

        assert_eq!(store.count_nodes(Label::Class).unwrap(), 1);
    }

    #[test]
    fn test_merge_node_keeps_unsupplied_properties() {
        let store = create_test_store();
        store
            .execute(&Statement::merge_node(
                NodeKey::use_case("UC01"),
                [("name", "Register device"), ("priority", "high")],
            ))
            .unwrap();
        store
            .execute(&Statement::merge_node(
                NodeKey::use_case("UC01"),
                [("name", "Register a device")],
            ))
            .unwrap();

        let nodes = store.find_nodes(Label::UseCase, &[("id", "UC01")]).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].get_str("name"), Some("Register a device"));
        assert_eq!(nodes[0].get_str("priority"), Some("high"));
    }

    #[test]
    fn test_key_properties_cannot_be_overwritten() {
        let store = create_test_store();
        store
            .execute(&Statement::merge_node(NodeKey::class("S01"), [("id", "other")]))
            .unwrap();

        let nodes = store.find_nodes(Label::Class, &[]).unwrap();
        assert_eq!(nodes[0].get_str("id"), Some("S01"));
    }

    #[test]
    fn test_same_key_different_labels_are_distinct() {
        let store = create_test_store();
        store.execute(&Statement::merge_key(NodeKey::class("X"))).unwrap();
        store.execute(&Statement::merge_key(NodeKey::activity("X"))).unwrap();

        assert_eq!(store.count_nodes(Label::Class).unwrap(), 1);
        assert_eq!(store.count_nodes(Label::Activity).unwrap(), 1);
    }

    #[test]
    fn test_composite_key_merges_by_value() {
        let store = create_test_store();
        store
            .execute(&Statement::merge_key(NodeKey::attribute("value", "float")))
            .unwrap();
        store
            .execute(&Statement::merge_key(NodeKey::attribute("value", "float")))
            .unwrap();
        store
            .execute(&Statement::merge_key(NodeKey::attribute("value", "int")))
            .unwrap();

        assert_eq!(store.count_nodes(Label::Attribute).unwrap(), 2);
    }

    #[test]
    fn test_edge_is_idempotent() {
        let store = create_test_store();
        store.execute(&class("A", "A")).unwrap();
        store.execute(&class("B", "B")).unwrap();

        let edge = Statement::merge_edge(
            NodeKey::class("A"),
            RelationType::DependsOn,
            NodeKey::class("B"),
        );
        assert_eq!(store.execute(&edge).unwrap().relationships_created, 1);
        assert_eq!(store.execute(&edge).unwrap().relationships_created, 0);
        assert_eq!(store.count_edges(RelationType::DependsOn).unwrap(), 1);
    }

    #[test]
    fn test_edge_with_missing_endpoint_is_noop() {
        let store = create_test_store();
        store.execute(&class("A", "A")).unwrap();

        let summary = store
            .execute(&Statement::merge_edge(
                NodeKey::class("A"),
                RelationType::DependsOn,
                NodeKey::class("Missing"),
            ))
            .unwrap();

        assert!(summary.created_nothing());
        assert_eq!(store.count_edges(RelationType::DependsOn).unwrap(), 0);
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 1);
    }

    #[test]
    fn test_transaction_commits_batch() {
        let store = create_test_store();
        let summary = store
            .transaction(&[
                class("S01", "Sensor"),
                Statement::merge_key(NodeKey::attribute("value", "float")),
                Statement::merge_edge(
                    NodeKey::class("S01"),
                    RelationType::HasAttribute,
                    NodeKey::attribute("value", "float"),
                ),
            ])
            .unwrap();

        assert_eq!(summary.nodes_created, 2);
        assert_eq!(summary.relationships_created, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_failure() {
        let store = create_test_store();
        let result = store.transaction(&[
            class("S01", "Sensor"),
            Statement::merge_key(NodeKey::use_case("")),
        ]);

        assert!(matches!(result, Err(StorageError::InvalidStatement(_))));
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 0);
    }

    #[test]
    fn test_find_nodes_any_of() {
        let store = create_test_store();
        store.execute(&class("S01", "Sensor")).unwrap();
        store.execute(&class("Sensor", "Sensor")).unwrap();
        store.execute(&class("D01", "Device")).unwrap();

        let found = store
            .find_nodes(Label::Class, &[("id", "Sensor"), ("name", "Sensor")])
            .unwrap();
        let ids: Vec<_> = found.iter().filter_map(|n| n.get_str("id")).collect();
        assert_eq!(ids, vec!["S01", "Sensor"]);
    }

    #[test]
    fn test_properties_read_back_with_key() {
        let store = create_test_store();
        store
            .execute(&Statement::merge_node(
                NodeKey::component("core"),
                [("description", "Sensing core")],
            ))
            .unwrap();

        let node = &store.find_nodes(Label::Component, &[]).unwrap()[0];
        assert_eq!(node.get_str("name"), Some("core"));
        assert_eq!(node.get_str("description"), Some("Sensing core"));
    }

    fn seed_chain(store: &SqliteStore) {
        store
            .transaction(&[
                class("S01", "Sensor"),
                class("D01", "Device"),
                Statement::merge_key(NodeKey::use_case("UC01")),
                Statement::merge_key(NodeKey::use_case("UC02")),
                Statement::merge_key(NodeKey::code_file("src/sensor.py")),
                Statement::merge_edge(
                    NodeKey::class("S01"),
                    RelationType::Trace,
                    NodeKey::use_case("UC01"),
                ),
                Statement::merge_edge(
                    NodeKey::code_file("src/sensor.py"),
                    RelationType::Implements,
                    NodeKey::class("S01"),
                ),
            ])
            .unwrap();
    }

    #[test]
    fn test_trace_chains() {
        let store = create_test_store();
        seed_chain(&store);

        let chains = store.trace_chains(10).unwrap();
        assert_eq!(
            chains,
            vec![TraceChain {
                use_case_id: "UC01".into(),
                class_name: "Sensor".into(),
                file_path: "src/sensor.py".into(),
            }]
        );
        assert!(store.trace_chains(0).unwrap().is_empty());
    }

    #[test]
    fn test_chain_counts() {
        let store = create_test_store();
        seed_chain(&store);

        let counts = store.chain_counts().unwrap();
        assert_eq!(
            counts,
            ChainCounts {
                use_cases: 2,
                classes: 1,
                code_files: 1,
            }
        );
    }

    #[test]
    fn test_orphans() {
        let store = create_test_store();
        seed_chain(&store);

        let orphans = store.orphans().unwrap();
        assert_eq!(orphans.use_cases_without_class, vec!["UC02"]);
        assert_eq!(orphans.classes_without_file, vec!["Device"]);
    }

    #[test]
    fn test_supports_counts_against_orphan_use_cases() {
        let store = create_test_store();
        store
            .transaction(&[
                class("S01", "Sensor"),
                Statement::merge_key(NodeKey::use_case("UC01")),
                Statement::merge_edge(
                    NodeKey::class("S01"),
                    RelationType::Supports,
                    NodeKey::use_case("UC01"),
                ),
            ])
            .unwrap();

        assert!(store.orphans().unwrap().use_cases_without_class.is_empty());
    }

    #[test]
    fn test_open_creates_parent_dirs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("graph.db");

        {
            let store = SqliteStore::open(&db_path).unwrap();
            store.execute(&class("S01", "Sensor")).unwrap();
        }

        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 1);
    }

    #[test]
    fn test_wal_mode_enabled_at_connection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test-wal.db")).unwrap();

        let journal_mode: String = store
            .session()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();

        assert_eq!(journal_mode, "wal");
    }
}
