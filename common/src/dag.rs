use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyze;
use crate::infer::infer_dependencies;
use crate::task::{Arguments, SolvedTask, StepId, TaskId};
use crate::tools;

/// DAG de una tarea resuelta, tal como se serializa en `dags.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDag {
    pub task_id: TaskId,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub final_answer: String,
    pub nodes: Vec<DagNode>,
    pub edges: Vec<DagEdge>,
    pub stats: DagStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagNode {
    pub id: StepId,

    /// Posición entre los pasos con herramienta (0, 1, 2, ...)
    pub index: usize,

    pub tool: String,

    #[serde(default)]
    pub arguments: Arguments,

    #[serde(default)]
    pub description: String,

    /// Ids de nodos previos de los que depende, sin repetidos.
    #[serde(default)]
    pub dependencies: Vec<StepId>,

    /// Anotaciones que agregan las variantes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_output: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_intermediate: Option<bool>,
}

impl DagNode {
    pub fn new(id: impl Into<StepId>, index: usize, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index,
            tool: tool.into(),
            arguments: Arguments::new(),
            description: String::new(),
            dependencies: Vec::new(),
            retry_config: None,
            explicit_output: None,
            save_intermediate: None,
        }
    }

    /// Nombre de herramienta normalizado para los predicados de `tools`.
    pub fn tool_lc(&self) -> String {
        self.tool.to_lowercase()
    }

    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Arista `from -> to`; `data_type` dice por qué se infirió.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagEdge {
    pub from: StepId,
    pub to: StepId,
    pub data_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DagStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub max_depth: usize,
    pub parallelizable_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff: String,
}

impl TaskDag {
    /// Recalcula las estadísticas después de modificar nodos o aristas.
    pub fn refresh_stats(&mut self) {
        self.stats = analyze::stats(&self.nodes, &self.edges);
    }

    /// Revisa que las aristas apunten a nodos existentes, que no haya ciclos y
    /// que las raíces según aristas coincidan con los nodos sin `dependencies`.
    /// Cada problema se reporta con `warn!`; devuelve `true` si no hubo ninguno.
    pub fn check_integrity(&self) -> bool {
        let mut ok = true;

        for edge in analyze::dangling_edges(&self.nodes, &self.edges) {
            warn!(
                "tarea {}: arista {} -> {} apunta a un nodo inexistente",
                self.task_id, edge.from, edge.to
            );
            ok = false;
        }

        if !analyze::is_acyclic(&self.nodes, &self.edges) {
            warn!("tarea {}: el grafo tiene ciclos", self.task_id);
            ok = false;
        }

        let by_edges = analyze::roots(&self.nodes, &self.edges);
        let by_deps: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| n.id.as_str())
            .collect();
        if by_edges != by_deps {
            warn!(
                "tarea {}: raíces por aristas {:?} no coinciden con dependencias {:?}",
                self.task_id, by_edges, by_deps
            );
            ok = false;
        }

        ok
    }

    /// Reasigna `index` según la posición actual de cada nodo.
    pub fn renumber(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.index = i;
        }
    }
}

/// Proyecta los pasos con herramienta a nodos (los de razonamiento se descartan).
pub fn nodes_from_task(task: &SolvedTask) -> Vec<DagNode> {
    let mut nodes = Vec::new();

    for step in &task.steps {
        let Some(tool) = step.tool_name() else {
            continue;
        };

        if !tools::is_known(&tool.to_lowercase()) {
            warn!(
                "tarea {}: paso {} usa herramienta desconocida '{}'",
                task.task_id, step.id, tool
            );
        }

        let mut node = DagNode::new(step.id.clone(), nodes.len(), tool);
        node.arguments = step.arguments.clone();
        node.description = step.description.clone();
        nodes.push(node);
    }

    nodes
}

/// Construye el DAG de una tarea: nodos, aristas inferidas y estadísticas.
pub fn build_dag(task: &SolvedTask) -> TaskDag {
    let mut nodes = nodes_from_task(task);
    let edges = infer_dependencies(&mut nodes);
    let stats = analyze::stats(&nodes, &edges);

    debug!(
        "tarea {}: nodos={}, aristas={}, profundidad={}, paralelizables={}",
        task.task_id, stats.num_nodes, stats.num_edges, stats.max_depth, stats.parallelizable_steps
    );

    let dag = TaskDag {
        task_id: task.task_id.clone(),
        question: task.question.clone(),
        final_answer: task.final_answer.clone().unwrap_or_default(),
        nodes,
        edges,
        stats,
    };
    dag.check_integrity();
    dag
}
