//! Module dependency graph
//!
//! Tracks import edges between modules and provides:
//! - Cycle detection
//! - Initialization order (dependencies first, in import order)

use rustc_hash::FxHashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors related to module graph operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Circular dependency detected
    #[error("Circular import: {}", format_cycle(.0))]
    CircularDependency(Vec<PathBuf>),

    /// Module not found in graph
    #[error("Module not found in graph: {0}")]
    ModuleNotFound(PathBuf),
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.file_name().unwrap_or_default().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A node in the module graph
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Normalized path of the module
    pub path: PathBuf,
    /// Modules this module imports, in source order
    pub imports: Vec<PathBuf>,
    /// Modules that import this module
    pub imported_by: Vec<PathBuf>,
}

impl ModuleNode {
    /// Create a new module node
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            imports: Vec::new(),
            imported_by: Vec::new(),
        }
    }
}

/// Module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: FxHashMap<PathBuf, ModuleNode>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph
    pub fn add_module(&mut self, path: PathBuf) {
        self.nodes
            .entry(path.clone())
            .or_insert_with(|| ModuleNode::new(path));
    }

    /// Add a dependency edge (`from` imports `to`)
    pub fn add_dependency(&mut self, from: PathBuf, to: PathBuf) {
        self.add_module(from.clone());
        self.add_module(to.clone());

        if let Some(node) = self.nodes.get_mut(&from) {
            if !node.imports.contains(&to) {
                node.imports.push(to.clone());
            }
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            if !node.imported_by.contains(&from) {
                node.imported_by.push(from);
            }
        }
    }

    /// Get a module node by path
    pub fn get(&self, path: &PathBuf) -> Option<&ModuleNode> {
        self.nodes.get(path)
    }

    /// Get the number of modules in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Initialization order starting at `entry`
    ///
    /// Depth-first post-order following import edges in source order: every
    /// module comes after all of its dependencies, and a module shared by
    /// several importers appears once, at its first encountered position.
    pub fn init_order(&self, entry: &PathBuf) -> Result<Vec<PathBuf>, GraphError> {
        if !self.nodes.contains_key(entry) {
            return Err(GraphError::ModuleNotFound(entry.clone()));
        }
        let mut marks: FxHashMap<PathBuf, Mark> = FxHashMap::default();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut path = Vec::new();
        self.visit(entry, &mut marks, &mut path, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        node: &PathBuf,
        marks: &mut FxHashMap<PathBuf, Mark>,
        path: &mut Vec<PathBuf>,
        order: &mut Vec<PathBuf>,
    ) -> Result<(), GraphError> {
        marks.insert(node.clone(), Mark::Visiting);
        path.push(node.clone());

        if let Some(module) = self.nodes.get(node) {
            for dep in &module.imports {
                match marks.get(dep) {
                    Some(Mark::Done) => {}
                    Some(Mark::Visiting) => {
                        let start = path.iter().position(|p| p == dep).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(dep.clone());
                        return Err(GraphError::CircularDependency(cycle));
                    }
                    None => self.visit(dep, marks, path, order)?,
                }
            }
        }

        path.pop();
        marks.insert(node.clone(), Mark::Done);
        order.push(node.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/{}.ts", name))
    }

    #[test]
    fn test_add_dependency() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency(p("main"), p("utils"));

        assert_eq!(graph.len(), 2);
        assert!(graph.get(&p("main")).unwrap().imports.contains(&p("utils")));
        assert!(graph.get(&p("utils")).unwrap().imported_by.contains(&p("main")));
    }

    #[test]
    fn test_init_order_dependencies_first() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency(p("main"), p("utils"));
        graph.add_dependency(p("utils"), p("logger"));

        let order = graph.init_order(&p("main")).unwrap();
        assert_eq!(order, vec![p("logger"), p("utils"), p("main")]);
    }

    #[test]
    fn test_diamond_runs_shared_once_at_first_position() {
        // main imports a then b; both import shared; b also imports a
        let mut graph = ModuleGraph::new();
        graph.add_dependency(p("main"), p("a"));
        graph.add_dependency(p("main"), p("b"));
        graph.add_dependency(p("a"), p("shared"));
        graph.add_dependency(p("b"), p("a"));
        graph.add_dependency(p("b"), p("shared"));

        let order = graph.init_order(&p("main")).unwrap();
        assert_eq!(order, vec![p("shared"), p("a"), p("b"), p("main")]);
    }

    #[test]
    fn test_import_order_is_respected() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency(p("main"), p("z"));
        graph.add_dependency(p("main"), p("a"));

        let order = graph.init_order(&p("main")).unwrap();
        assert_eq!(order, vec![p("z"), p("a"), p("main")]);
    }

    #[test]
    fn test_simple_cycle() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency(p("a"), p("b"));
        graph.add_dependency(p("b"), p("a"));

        match graph.init_order(&p("a")) {
            Err(GraphError::CircularDependency(cycle)) => {
                assert_eq!(cycle, vec![p("a"), p("b"), p("a")]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }
}
