//! Neo4j storage backend over Bolt
//!
//! The `GraphStore` trait is synchronous; this backend owns a private
//! current-thread tokio runtime and blocks on each operation. Labels and
//! relationship types are spliced into Cypher only from their enums; all
//! values travel as parameters.

use super::traits::{
    ChainCounts, GraphStore, Orphans, StorageError, StorageResult, TraceChain,
};
use crate::config::Config;
use crate::graph::{
    GraphNode, Label, NodeKey, Properties, RelationType, Statement, WriteSummary,
};
use neo4rs::{
    query, BoltMap, BoltString, BoltType, ConfigBuilder, Graph, Query, Txn,
};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Neo4j-backed graph store
pub struct Neo4jStore {
    runtime: tokio::runtime::Runtime,
    graph: Graph,
}

impl Neo4jStore {
    pub fn connect(config: &Config) -> StorageResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut builder = ConfigBuilder::default()
            .uri(config.endpoints.bolt.clone())
            .user(config.credentials.username.clone())
            .password(config.credentials.password.clone());
        if let Some(db) = &config.store.database {
            builder = builder.db(db.as_str());
        }
        let bolt_config = builder.build()?;

        let graph = runtime
            .block_on(async {
                tokio::time::timeout(CONNECT_TIMEOUT, Graph::connect(bolt_config)).await
            })
            .map_err(|_| {
                StorageError::BackendUnavailable(format!(
                    "connect to {} timed out after {:?}",
                    config.endpoints.bolt, CONNECT_TIMEOUT
                ))
            })??;

        Ok(Self { runtime, graph })
    }

    fn check_key(key: &NodeKey) -> StorageResult<()> {
        if key.is_valid() {
            Ok(())
        } else {
            Err(StorageError::InvalidStatement(format!("empty key in {}", key)))
        }
    }

    /// `{id: $f0, type: $f1}` for a key bound under `prefix`
    fn key_pattern(prefix: &str, key: &NodeKey) -> String {
        let fields: Vec<String> = key
            .key
            .iter()
            .enumerate()
            .map(|(i, (prop, _))| format!("{}: ${}{}", prop, prefix, i))
            .collect();
        format!("{{{}}}", fields.join(", "))
    }

    fn bind_key(mut q: Query, prefix: &str, key: &NodeKey) -> Query {
        for (i, (_, value)) in key.key.iter().enumerate() {
            q = q.param(&format!("{}{}", prefix, i), value.clone());
        }
        q
    }

    fn to_query(statement: &Statement) -> StorageResult<Query> {
        match statement {
            Statement::MergeNode { key, properties } => {
                Self::check_key(key)?;
                let cypher = format!(
                    "MERGE (n:{label} {pattern}) \
                     ON CREATE SET n.__created = true \
                     SET n += $props \
                     WITH n, coalesce(n.__created, false) AS created \
                     REMOVE n.__created \
                     RETURN created",
                    label = key.label.as_str(),
                    pattern = Self::key_pattern("k", key),
                );
                let q = Self::bind_key(query(&cypher), "k", key);
                Ok(q.param("props", properties_to_bolt(properties)))
            }
            Statement::MergeEdge { from, relation, to } => {
                Self::check_key(from)?;
                Self::check_key(to)?;
                let cypher = format!(
                    "MATCH (a:{from_label} {from_pattern}), (b:{to_label} {to_pattern}) \
                     MERGE (a)-[r:{rel}]->(b) \
                     ON CREATE SET r.__created = true \
                     WITH r, coalesce(r.__created, false) AS created \
                     REMOVE r.__created \
                     RETURN created",
                    from_label = from.label.as_str(),
                    from_pattern = Self::key_pattern("f", from),
                    to_label = to.label.as_str(),
                    to_pattern = Self::key_pattern("t", to),
                    rel = relation.as_str(),
                );
                let q = Self::bind_key(query(&cypher), "f", from);
                Ok(Self::bind_key(q, "t", to))
            }
        }
    }

    fn summarize(statement: &Statement, created: bool) -> WriteSummary {
        match statement {
            Statement::MergeNode { key, properties } => WriteSummary {
                nodes_created: u64::from(created),
                relationships_created: 0,
                properties_set: (properties.len() + if created { key.key.len() } else { 0 })
                    as u64,
            },
            Statement::MergeEdge { .. } => WriteSummary {
                relationships_created: u64::from(created),
                ..Default::default()
            },
        }
    }

    async fn run_batch(txn: &mut Txn, statements: &[Statement]) -> StorageResult<WriteSummary> {
        let mut total = WriteSummary::default();
        for statement in statements {
            let mut stream = txn.execute(Self::to_query(statement)?).await?;
            let mut created = false;
            // An edge merge with a missing endpoint yields no row
            while let Some(row) = stream.next(txn.handle()).await? {
                created |= row.get::<bool>("created").unwrap_or(false);
            }
            total += Self::summarize(statement, created);
        }
        Ok(total)
    }

    /// Run a read query and decode every row
    fn read_rows<T, F>(&self, q: Query, decode: F) -> StorageResult<Vec<T>>
    where
        F: Fn(&neo4rs::Row) -> StorageResult<T>,
    {
        self.runtime.block_on(async {
            let mut result = self.graph.execute(q).await?;
            let mut out = Vec::new();
            while let Some(row) = result.next().await? {
                out.push(decode(&row)?);
            }
            Ok(out)
        })
    }

    fn read_count(&self, cypher: &str) -> StorageResult<u64> {
        let counts = self.read_rows(query(cypher), |row| get::<i64>(row, "n"))?;
        Ok(counts.first().copied().unwrap_or(0) as u64)
    }
}

fn get<T>(row: &neo4rs::Row, key: &str) -> StorageResult<T>
where
    T: serde::de::DeserializeOwned,
{
    row.get::<T>(key)
        .map_err(|e| StorageError::Decode(format!("{}: {}", key, e)))
}

fn properties_to_bolt(properties: &Properties) -> BoltType {
    let map: BoltMap = properties
        .iter()
        .map(|(k, v)| {
            (
                BoltString::from(k.as_str()),
                BoltType::String(BoltString::from(v.as_str())),
            )
        })
        .collect();
    BoltType::Map(map)
}

impl GraphStore for Neo4jStore {
    fn execute(&self, statement: &Statement) -> StorageResult<WriteSummary> {
        self.transaction(std::slice::from_ref(statement))
    }

    fn transaction(&self, statements: &[Statement]) -> StorageResult<WriteSummary> {
        self.runtime.block_on(async {
            let mut txn = self.graph.start_txn().await?;
            match Self::run_batch(&mut txn, statements).await {
                Ok(summary) => {
                    txn.commit().await?;
                    Ok(summary)
                }
                Err(e) => {
                    if let Err(rollback) = txn.rollback().await {
                        tracing::error!(error = %rollback, "rollback failed");
                    }
                    tracing::warn!(error = %e, "transaction rolled back");
                    Err(e)
                }
            }
        })
    }

    fn find_nodes(
        &self,
        label: Label,
        any_of: &[(&'static str, &str)],
    ) -> StorageResult<Vec<GraphNode>> {
        let mut cypher = format!("MATCH (n:{})", label.as_str());
        if !any_of.is_empty() {
            let clauses: Vec<String> = any_of
                .iter()
                .enumerate()
                .map(|(i, (prop, _))| format!("n.{} = $v{}", prop, i))
                .collect();
            cypher.push_str(&format!(" WHERE {}", clauses.join(" OR ")));
        }
        cypher.push_str(" RETURN properties(n) AS props");

        let mut q = query(&cypher);
        for (i, (_, value)) in any_of.iter().enumerate() {
            q = q.param(&format!("v{}", i), value.to_string());
        }

        self.read_rows(q, |row| {
            let props: serde_json::Map<String, serde_json::Value> = get(row, "props")?;
            // Only string properties are written; others are left out
            let properties: Properties = props
                .into_iter()
                .filter_map(|(k, v)| match v {
                    serde_json::Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect();
            Ok(GraphNode { label, properties })
        })
    }

    fn count_nodes(&self, label: Label) -> StorageResult<u64> {
        self.read_count(&format!("MATCH (x:{}) RETURN count(x) AS n", label.as_str()))
    }

    fn count_edges(&self, relation: RelationType) -> StorageResult<u64> {
        self.read_count(&format!(
            "MATCH ()-[r:{}]->() RETURN count(r) AS n",
            relation.as_str()
        ))
    }

    fn trace_chains(&self, limit: usize) -> StorageResult<Vec<TraceChain>> {
        let q = query(
            "MATCH (u:UseCase)<-[:TRACE]-(c:Class)<-[:IMPLEMENTS]-(f:CodeFile) \
             RETURN u.id AS use_case_id, coalesce(c.name, c.id) AS class_name, f.path AS file_path \
             ORDER BY use_case_id, class_name, file_path \
             LIMIT $limit",
        )
        .param("limit", limit as i64);

        self.read_rows(q, |row| {
            Ok(TraceChain {
                use_case_id: get(row, "use_case_id")?,
                class_name: get(row, "class_name")?,
                file_path: get(row, "file_path")?,
            })
        })
    }

    fn chain_counts(&self) -> StorageResult<ChainCounts> {
        let q = query(
            "MATCH (u:UseCase) \
             OPTIONAL MATCH (u)<-[:TRACE]-(c:Class) \
             OPTIONAL MATCH (c)<-[:IMPLEMENTS]-(f:CodeFile) \
             RETURN count(DISTINCT u) AS use_cases, \
                    count(DISTINCT c) AS classes, \
                    count(DISTINCT f) AS code_files",
        );

        let rows = self.read_rows(q, |row| {
            Ok(ChainCounts {
                use_cases: get::<i64>(row, "use_cases")? as u64,
                classes: get::<i64>(row, "classes")? as u64,
                code_files: get::<i64>(row, "code_files")? as u64,
            })
        })?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    fn orphans(&self) -> StorageResult<Orphans> {
        let use_cases_without_class = self.read_rows(
            query(
                "MATCH (u:UseCase) WHERE NOT (u)<-[:TRACE|SUPPORTS]-() \
                 RETURN u.id AS id ORDER BY id",
            ),
            |row| get::<String>(row, "id"),
        )?;

        let classes_without_file = self.read_rows(
            query(
                "MATCH (c:Class) WHERE NOT (c)<-[:IMPLEMENTS]-() \
                 RETURN coalesce(c.name, c.id) AS name ORDER BY name",
            ),
            |row| get::<String>(row, "name"),
        )?;

        Ok(Orphans {
            use_cases_without_class,
            classes_without_file,
        })
    }
}
