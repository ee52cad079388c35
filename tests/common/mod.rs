//! Shared fixtures for the integration tests
//!
//! Writes a small project (diagrams plus a Python source tree) into a
//! temporary directory.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracegraph::{GraphStore, Label, RelationType};

pub const CLASS_DIAGRAM: &str = r#"@startuml
package "Sensing" {
  class "Sensor" as S01 {
    - value : float
    [UC-01]
  }
  class "Gateway" as G01
}
S01 ..> G01
@enduml
"#;

pub const USE_CASE_DIAGRAM: &str = r#"@startuml
actor Operator
usecase "Register device" as UC-01
usecase "Query status" as UC02
@enduml
"#;

pub const SENSOR_MODULE: &str = r#"
class Sensor:
    """Reads the probe.

    Trace: [UC-01]
    """

    def read(self):
        return 0.0


def calibrate(sensor):
    """Trace: [UC02]"""
    return sensor
"#;

pub const HELPERS_MODULE: &str = r#"
def format_reading(value):
    return f"{value:.2f}"
"#;

/// Diagram and source files laid out under one temporary root
pub struct Project {
    pub dir: TempDir,
    pub diagrams: Vec<PathBuf>,
}

impl Project {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn src(&self) -> PathBuf {
        self.dir.path().join("src")
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(path, content).expect("write fixture");
}

/// Write the sensor project
pub fn sensor_project() -> Project {
    let dir = TempDir::new().expect("tempdir");
    let docs = dir.path().join("docs");
    let class_diagram = docs.join("class_diagram.puml");
    let use_case_diagram = docs.join("use_case_diagram.puml");

    write(&class_diagram, CLASS_DIAGRAM);
    write(&use_case_diagram, USE_CASE_DIAGRAM);
    write(&dir.path().join("src/device/sensor.py"), SENSOR_MODULE);
    write(&dir.path().join("src/device/helpers.py"), HELPERS_MODULE);
    write(&dir.path().join("src/__pycache__/sensor.py"), SENSOR_MODULE);

    Project {
        dir,
        diagrams: vec![use_case_diagram, class_diagram],
    }
}

/// Node count per label followed by edge count per relation
pub fn graph_shape(store: &dyn GraphStore) -> Vec<u64> {
    let nodes = Label::ALL
        .iter()
        .map(|label| store.count_nodes(*label).expect("count nodes"));
    let edges = RelationType::ALL
        .iter()
        .map(|relation| store.count_edges(*relation).expect("count edges"));
    nodes.chain(edges).collect()
}
