//! Graph merge importer
//!
//! Writes a [`FactSet`] into a [`GraphStore`] as idempotent upserts. The
//! stage profile picks which fact kinds are written; the kinds always run
//! in the fixed order use cases, classes, dependencies, components,
//! activities, so that edges find their endpoints.

use crate::diagram::{
    activity_id, ActivityFact, ClassFact, ComponentFact, DependencyFact, FactSet, UseCaseFact,
};
use crate::graph::{NodeKey, RelationType, Statement, WriteSummary, ACTIVITY_DIAGRAM};
use crate::storage::{GraphStore, StorageResult};
use serde::Serialize;
use std::fmt;

/// Stage profile selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Stage {
    /// Use cases, classes, dependencies, components and activities
    Design,
    /// Components only
    Component,
    /// Use cases, then activities
    Requirement,
}

/// One import operation within a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStep {
    UseCases,
    Classes,
    Dependencies,
    Components,
    Activities,
}

impl Stage {
    pub fn steps(&self) -> &'static [ImportStep] {
        match self {
            Stage::Design => &[
                ImportStep::UseCases,
                ImportStep::Classes,
                ImportStep::Dependencies,
                ImportStep::Components,
                ImportStep::Activities,
            ],
            Stage::Component => &[ImportStep::Components],
            Stage::Requirement => &[ImportStep::UseCases, ImportStep::Activities],
        }
    }
}

/// What an import wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub use_cases: usize,
    pub classes: usize,
    pub dependencies: usize,
    pub components: usize,
    pub activity_fragments: usize,
    pub writes: WriteSummary,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Use cases:          {}", self.use_cases)?;
        writeln!(f, "Classes:            {}", self.classes)?;
        writeln!(f, "Dependencies:       {}", self.dependencies)?;
        writeln!(f, "Components:         {}", self.components)?;
        writeln!(f, "Activity fragments: {}", self.activity_fragments)?;
        write!(
            f,
            "Nodes created: {}, relationships created: {}, properties set: {}",
            self.writes.nodes_created, self.writes.relationships_created, self.writes.properties_set
        )
    }
}

// === Statement builders ===

pub fn use_case_statements(use_case: &UseCaseFact) -> Vec<Statement> {
    vec![Statement::merge_node(
        NodeKey::use_case(&use_case.id),
        [("name", use_case.name.as_str())],
    )]
}

/// The class node, its attributes and its `SUPPORTS` edges
pub fn class_statements(class: &ClassFact) -> Vec<Statement> {
    let class_key = NodeKey::class(&class.id);
    let mut statements = vec![Statement::merge_node(
        class_key.clone(),
        [("name", class.name.as_str())],
    )];

    for attribute in &class.attributes {
        let attr_key = NodeKey::attribute(&attribute.name, &attribute.attr_type);
        statements.push(Statement::merge_key(attr_key.clone()));
        statements.push(Statement::merge_edge(
            class_key.clone(),
            RelationType::HasAttribute,
            attr_key,
        ));
    }

    for trace in &class.traces {
        let use_case = NodeKey::use_case(trace);
        statements.push(Statement::merge_key(use_case.clone()));
        statements.push(Statement::merge_edge(
            class_key.clone(),
            RelationType::Supports,
            use_case,
        ));
    }

    statements
}

pub fn dependency_statement(dependency: &DependencyFact) -> Statement {
    Statement::merge_edge(
        NodeKey::class(&dependency.source),
        RelationType::from_token(&dependency.token),
        NodeKey::class(&dependency.target),
    )
}

pub fn component_statements(component: &ComponentFact) -> Vec<Statement> {
    let component_key = NodeKey::component(&component.name);
    let mut statements = vec![Statement::merge_key(component_key.clone())];
    for class_id in &component.class_ids {
        statements.push(Statement::merge_edge(
            component_key.clone(),
            RelationType::Contains,
            NodeKey::class(class_id),
        ));
    }
    statements
}

/// The use case, its activities and the diagram file it came from
pub fn activity_statements(fragment: &ActivityFact) -> Vec<Statement> {
    let use_case = NodeKey::use_case(&fragment.use_case_id);
    let mut statements = vec![Statement::merge_key(use_case.clone())];

    for label in &fragment.activities {
        let activity = NodeKey::activity(activity_id(label));
        statements.push(Statement::merge_node(
            activity.clone(),
            [("name", label.as_str())],
        ));
        statements.push(Statement::merge_edge(
            use_case.clone(),
            RelationType::Includes,
            activity,
        ));
    }

    let diagram = NodeKey::uml_file(&fragment.file_path, ACTIVITY_DIAGRAM);
    statements.push(Statement::merge_key(diagram.clone()));
    statements.push(Statement::merge_edge(
        use_case,
        RelationType::HasDiagram,
        diagram,
    ));

    statements
}

/// Upserts fact sets into a store
pub struct GraphImporter<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> GraphImporter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run every step of `stage` in order; the first storage failure aborts
    pub fn import(&self, facts: &FactSet, stage: Stage) -> StorageResult<ImportSummary> {
        let mut summary = ImportSummary::default();

        for step in stage.steps() {
            match step {
                ImportStep::UseCases => {
                    summary.writes += self.import_use_cases(&facts.use_cases)?;
                    summary.use_cases = facts.use_cases.len();
                }
                ImportStep::Classes => {
                    summary.writes += self.import_classes(&facts.classes)?;
                    summary.classes = facts.classes.len();
                }
                ImportStep::Dependencies => {
                    summary.writes += self.import_dependencies(&facts.dependencies)?;
                    summary.dependencies = facts.dependencies.len();
                }
                ImportStep::Components => {
                    summary.writes += self.import_components(&facts.components)?;
                    summary.components = facts.components.len();
                }
                ImportStep::Activities => {
                    summary.writes += self.import_activities(&facts.activities)?;
                    summary.activity_fragments = facts.activities.len();
                }
            }
            tracing::info!(step = ?step, "import step finished");
        }

        Ok(summary)
    }

    pub fn import_use_cases(&self, use_cases: &[UseCaseFact]) -> StorageResult<WriteSummary> {
        let mut total = WriteSummary::default();
        for use_case in use_cases {
            total += self.store.transaction(&use_case_statements(use_case))?;
        }
        Ok(total)
    }

    /// One transaction per class
    pub fn import_classes(&self, classes: &[ClassFact]) -> StorageResult<WriteSummary> {
        let mut total = WriteSummary::default();
        for class in classes {
            total += self.store.transaction(&class_statements(class))?;
        }
        Ok(total)
    }

    /// Edges between classes that do not exist are skipped by the store
    pub fn import_dependencies(
        &self,
        dependencies: &[DependencyFact],
    ) -> StorageResult<WriteSummary> {
        let mut total = WriteSummary::default();
        for dependency in dependencies {
            let written = self.store.execute(&dependency_statement(dependency))?;
            if written.created_nothing() {
                tracing::debug!(
                    source = %dependency.source,
                    target = %dependency.target,
                    token = %dependency.token,
                    "dependency not created"
                );
            }
            total += written;
        }
        Ok(total)
    }

    pub fn import_components(&self, components: &[ComponentFact]) -> StorageResult<WriteSummary> {
        let mut total = WriteSummary::default();
        for component in components {
            total += self.store.transaction(&component_statements(component))?;
        }
        Ok(total)
    }

    /// One transaction per fragment
    pub fn import_activities(&self, fragments: &[ActivityFact]) -> StorageResult<WriteSummary> {
        let mut total = WriteSummary::default();
        for fragment in fragments {
            total += self.store.transaction(&activity_statements(fragment))?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{AttributeFact, DiagramParser};
    use crate::graph::Label;
    use crate::storage::{OpenStore, SqliteStore};

    fn sensor() -> ClassFact {
        ClassFact {
            id: "S01".to_string(),
            name: "Sensor".to_string(),
            attributes: vec![AttributeFact::new("value", "float")],
            traces: vec!["UC01".to_string()],
        }
    }

    fn design_facts() -> FactSet {
        let mut parser = DiagramParser::new();
        parser.parse_source(
            "class_diagram.puml",
            r#"
package "Sensing" {
  class "Sensor" as S01 {
    - value : float
    [UC-01]
  }
  class "Gateway" as G01
}
S01 ..> G01
S01 --> Missing
"#,
        );
        parser.parse_source(
            "use_case_diagram.puml",
            "usecase \"Register device\" as UC-01\nusecase \"Query status\" as UC-02\n",
        );
        parser.parse_source(
            "UC-02_activity.puml",
            "start\n:Read status;\n:Render status;\nstop\n",
        );
        parser.into_facts()
    }

    #[test]
    fn test_class_statements_shape() {
        let statements = class_statements(&sensor());
        // class, attribute + edge, use case + edge
        assert_eq!(statements.len(), 5);
        assert!(statements.contains(&Statement::merge_edge(
            NodeKey::class("S01"),
            RelationType::Supports,
            NodeKey::use_case("UC01"),
        )));
    }

    #[test]
    fn test_dependency_statement_maps_token() {
        let statement = dependency_statement(&DependencyFact {
            source: "A".into(),
            token: "o--".into(),
            target: "B".into(),
        });
        assert_eq!(
            statement,
            Statement::merge_edge(
                NodeKey::class("A"),
                RelationType::Aggregates,
                NodeKey::class("B"),
            )
        );
    }

    #[test]
    fn test_sensor_scenario_graph() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut parser = DiagramParser::new();
        parser.parse_source("class_diagram.puml", "class \"Sensor\" as S01 { - value : float }");

        GraphImporter::new(&store)
            .import(parser.facts(), Stage::Design)
            .unwrap();

        let classes = store.find_nodes(Label::Class, &[("id", "S01")]).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].get_str("name"), Some("Sensor"));

        let attributes = store
            .find_nodes(Label::Attribute, &[("name", "value")])
            .unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].get_str("type"), Some("float"));
        assert_eq!(store.count_edges(RelationType::HasAttribute).unwrap(), 1);
    }

    #[test]
    fn test_design_stage() {
        let store = SqliteStore::open_in_memory().unwrap();
        let summary = GraphImporter::new(&store)
            .import(&design_facts(), Stage::Design)
            .unwrap();

        assert_eq!(summary.classes, 2);
        assert_eq!(summary.use_cases, 2);
        assert_eq!(summary.activity_fragments, 1);

        assert_eq!(store.count_nodes(Label::UseCase).unwrap(), 2);
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 2);
        assert_eq!(store.count_nodes(Label::Component).unwrap(), 1);
        assert_eq!(store.count_nodes(Label::Activity).unwrap(), 4);
        assert_eq!(store.count_nodes(Label::UmlFile).unwrap(), 1);
        assert_eq!(store.count_edges(RelationType::Supports).unwrap(), 1);
        assert_eq!(store.count_edges(RelationType::DependsOn).unwrap(), 1);
        assert_eq!(store.count_edges(RelationType::Contains).unwrap(), 2);
        assert_eq!(store.count_edges(RelationType::Includes).unwrap(), 4);
        assert_eq!(store.count_edges(RelationType::HasDiagram).unwrap(), 1);
        // `S01 --> Missing` has no endpoint to attach to
        assert_eq!(store.count_edges(RelationType::RelatesTo).unwrap(), 0);

        // Use-case name from the use-case diagram survives the activity upsert
        let uc = store.find_nodes(Label::UseCase, &[("id", "UC02")]).unwrap();
        assert_eq!(uc[0].get_str("name"), Some("Query status"));
    }

    #[test]
    fn test_import_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let facts = design_facts();
        let importer = GraphImporter::new(&store);

        let first = importer.import(&facts, Stage::Design).unwrap();
        let nodes: Vec<u64> = Label::ALL
            .iter()
            .map(|l| store.count_nodes(*l).unwrap())
            .collect();
        let edges: Vec<u64> = RelationType::ALL
            .iter()
            .map(|r| store.count_edges(*r).unwrap())
            .collect();

        let second = importer.import(&facts, Stage::Design).unwrap();

        assert!(first.writes.nodes_created > 0);
        assert!(second.writes.created_nothing());
        let nodes_after: Vec<u64> = Label::ALL
            .iter()
            .map(|l| store.count_nodes(*l).unwrap())
            .collect();
        let edges_after: Vec<u64> = RelationType::ALL
            .iter()
            .map(|r| store.count_edges(*r).unwrap())
            .collect();
        assert_eq!(nodes, nodes_after);
        assert_eq!(edges, edges_after);
    }

    #[test]
    fn test_malformed_attribute_does_not_abort_import() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut parser = DiagramParser::new();
        parser.parse_source(
            "class_diagram.puml",
            "class \"Sensor\" as S01 {\n - value : float\n - id : \n - : int\n}\n\
             class \"Gateway\" as G01 {\n - port : int\n}\n",
        );

        let summary = GraphImporter::new(&store)
            .import(parser.facts(), Stage::Design)
            .unwrap();

        assert_eq!(summary.classes, 2);
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 2);
        assert_eq!(store.count_nodes(Label::Attribute).unwrap(), 2);
        assert_eq!(store.count_edges(RelationType::HasAttribute).unwrap(), 2);
    }

    #[test]
    fn test_empty_activity_label_does_not_abort_import() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut parser = DiagramParser::new();
        parser.parse_source("UC-05_activity.puml", "start\n:\"\";\n:Send alert;\nstop\n");

        GraphImporter::new(&store)
            .import(parser.facts(), Stage::Requirement)
            .unwrap();

        assert_eq!(store.count_nodes(Label::Activity).unwrap(), 3);
        assert_eq!(store.count_edges(RelationType::Includes).unwrap(), 3);
    }

    #[test]
    fn test_component_stage_only_writes_components() {
        let store = SqliteStore::open_in_memory().unwrap();
        let summary = GraphImporter::new(&store)
            .import(&design_facts(), Stage::Component)
            .unwrap();

        assert_eq!(summary.components, 1);
        assert_eq!(summary.classes, 0);
        assert_eq!(store.count_nodes(Label::Component).unwrap(), 1);
        // Classes were never imported, so CONTAINS has nothing to point at
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 0);
        assert_eq!(store.count_edges(RelationType::Contains).unwrap(), 0);
    }

    #[test]
    fn test_requirement_stage() {
        let store = SqliteStore::open_in_memory().unwrap();
        GraphImporter::new(&store)
            .import(&design_facts(), Stage::Requirement)
            .unwrap();

        assert_eq!(store.count_nodes(Label::UseCase).unwrap(), 2);
        assert_eq!(store.count_nodes(Label::Activity).unwrap(), 4);
        assert_eq!(store.count_nodes(Label::Class).unwrap(), 0);
    }

    #[test]
    fn test_stage_steps_order() {
        assert_eq!(Stage::Design.steps().len(), 5);
        assert_eq!(Stage::Design.steps()[0], ImportStep::UseCases);
        assert_eq!(Stage::Design.steps()[4], ImportStep::Activities);
        assert_eq!(
            Stage::Requirement.steps(),
            &[ImportStep::UseCases, ImportStep::Activities]
        );
    }
}
