//! Conversión de DAGs aumentados al formato ToolScale (planificación +
//! grafo + metadata por entrada).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::dag::{DagEdge, DagNode, RetryConfig};
use crate::task::{Arguments, StepId, TaskId};
use crate::tools;
use crate::variants::{AugmentedDags, VariantDag, VariantMethod};

pub const DATASET_NAME: &str = "GAIA_Level3_ToolScale";
pub const DATASET_VERSION: &str = "1.0";
const DATASET_SOURCE: &str = "GAIA_Level3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningStep {
    /// Posición en el plan, desde 1.
    pub step: usize,
    pub step_id: StepId,
    pub tool: String,
    pub arguments: Arguments,
    pub description: String,
    pub dependencies: Vec<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_output: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagStructure {
    pub nodes: usize,
    pub edges: usize,
    pub max_depth: usize,
    pub parallelizable_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planning {
    pub total_steps: usize,
    pub steps: Vec<PlanningStep>,
    pub dag_structure: DagStructure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSection {
    pub nodes: Vec<DagNode>,
    pub edges: Vec<DagEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub source: String,
    pub augmentation_method: VariantMethod,
    pub num_tools_used: usize,
    pub tool_sequence: Vec<String>,
    pub has_file_dependency: bool,
    pub has_web_dependency: bool,
    pub has_calculation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// `<task_id>_v<variant_id>`
    pub id: String,
    pub source_task_id: TaskId,
    pub variant_id: usize,
    pub variant_method: VariantMethod,
    pub variant_description: String,
    pub question: String,
    pub final_answer: String,
    pub planning: Planning,
    pub dag: GraphSection,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub total_planning_steps: usize,
    pub avg_steps_per_task: f64,
    pub unique_tools_used: usize,
    pub tools_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub total_entries: usize,
    pub original_tasks: usize,
    pub augmented_entries: usize,
    pub statistics: DatasetStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolScaleDataset {
    pub dataset_info: DatasetInfo,
    pub data: Vec<DatasetEntry>,
}

pub fn to_entry(variant: &VariantDag) -> DatasetEntry {
    let dag = &variant.dag;

    let mut ordered: Vec<&DagNode> = dag.nodes.iter().collect();
    ordered.sort_by_key(|n| n.index);

    let steps: Vec<PlanningStep> = ordered
        .iter()
        .enumerate()
        .map(|(i, node)| PlanningStep {
            step: i + 1,
            step_id: node.id.clone(),
            tool: node.tool.clone(),
            arguments: node.arguments.clone(),
            description: node.description.clone(),
            dependencies: node.dependencies.clone(),
            retry_config: node.retry_config.clone(),
            explicit_output: node.explicit_output,
        })
        .collect();

    let tool_sequence: Vec<String> = steps.iter().map(|s| s.tool.clone()).collect();

    let metadata = EntryMetadata {
        source: DATASET_SOURCE.to_string(),
        augmentation_method: variant.variant_method,
        num_tools_used: steps.len(),
        has_file_dependency: steps.iter().any(|s| s.arguments.contains_key("file_path")),
        has_web_dependency: tool_sequence.iter().any(|t| t.starts_with("web_")),
        has_calculation: tool_sequence
            .iter()
            .any(|t| tools::is_computation(&t.to_lowercase())),
        tool_sequence,
    };

    DatasetEntry {
        id: format!("{}_v{}", dag.task_id, variant.variant_id),
        source_task_id: dag.task_id.clone(),
        variant_id: variant.variant_id,
        variant_method: variant.variant_method,
        variant_description: variant.variant_description.clone(),
        question: dag.question.clone(),
        final_answer: dag.final_answer.clone(),
        planning: Planning {
            total_steps: steps.len(),
            steps,
            dag_structure: DagStructure {
                nodes: dag.nodes.len(),
                edges: dag.edges.len(),
                max_depth: dag.stats.max_depth,
                parallelizable_steps: dag.stats.parallelizable_steps,
            },
        },
        dag: GraphSection {
            nodes: dag.nodes.clone(),
            edges: dag.edges.clone(),
        },
        metadata,
    }
}

pub fn build_dataset(augmented: &AugmentedDags) -> ToolScaleDataset {
    let data: Vec<DatasetEntry> = augmented.dags.iter().map(to_entry).collect();

    let total_steps: usize = data.iter().map(|e| e.planning.total_steps).sum();
    let avg = if data.is_empty() {
        0.0
    } else {
        total_steps as f64 / data.len() as f64
    };

    let tools: BTreeSet<&str> = data
        .iter()
        .flat_map(|e| e.metadata.tool_sequence.iter().map(String::as_str))
        .collect();

    ToolScaleDataset {
        dataset_info: DatasetInfo {
            name: DATASET_NAME.to_string(),
            version: DATASET_VERSION.to_string(),
            description: "Augmented GAIA Level 3 solved tasks in ToolScale format".to_string(),
            total_entries: data.len(),
            original_tasks: augmented.original_count,
            augmented_entries: augmented.augmented_count,
            statistics: DatasetStatistics {
                total_planning_steps: total_steps,
                avg_steps_per_task: (avg * 100.0).round() / 100.0,
                unique_tools_used: tools.len(),
                tools_list: tools.into_iter().map(String::from).collect(),
            },
        },
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::TaskDag;
    use crate::variants::augment_all;
    use serde_json::json;

    fn sample_dag(id: &str) -> TaskDag {
        let mut read = DagNode::new("s1", 0, "read_json");
        read.arguments.insert("file_path".into(), json!("data.json"));
        let mut calc = DagNode::new("s2", 1, "calculate");
        calc.dependencies.push("s1".into());

        let mut dag = TaskDag {
            task_id: id.into(),
            question: "¿Promedio?".into(),
            final_answer: "26.4".into(),
            nodes: vec![read, calc],
            edges: vec![DagEdge {
                from: "s1".into(),
                to: "s2".into(),
                data_type: "calculation_input".into(),
            }],
            stats: Default::default(),
        };
        dag.refresh_stats();
        dag
    }

    #[test]
    fn entrada_por_variante_con_id_y_metadata() {
        let augmented = augment_all(&[sample_dag("gaia_val_9")], 2);
        let ds = build_dataset(&augmented);

        assert_eq!(ds.data.len(), 3);
        let ids: Vec<&str> = ds.data.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["gaia_val_9_v0", "gaia_val_9_v1", "gaia_val_9_v2"]);

        let first = &ds.data[0];
        assert_eq!(first.planning.steps[0].step, 1);
        assert_eq!(first.metadata.tool_sequence, vec!["read_json", "calculate"]);
        assert!(first.metadata.has_file_dependency);
        assert!(first.metadata.has_calculation);
        assert!(!first.metadata.has_web_dependency);
        assert_eq!(first.planning.dag_structure.max_depth, 2);

        // add_verification agrega un paso
        assert_eq!(ds.data[2].planning.total_steps, 3);
    }

    #[test]
    fn pasos_ordenados_por_index() {
        let mut dag = sample_dag("t");
        dag.nodes.swap(0, 1);
        let augmented = augment_all(&[dag], 0);

        let entry = to_entry(&augmented.dags[0]);
        assert_eq!(entry.planning.steps[0].step_id, "s1");
        assert_eq!(entry.planning.steps[1].step_id, "s2");
    }

    #[test]
    fn estadisticas_del_dataset() {
        let augmented = augment_all(&[sample_dag("a"), sample_dag("b")], 2);
        let ds = build_dataset(&augmented);
        let info = &ds.dataset_info;

        assert_eq!(info.total_entries, 6);
        assert_eq!(info.original_tasks, 2);
        assert_eq!(info.augmented_entries, 4);
        // 2 + 2 + 3 por tarea
        assert_eq!(info.statistics.total_planning_steps, 14);
        assert_eq!(info.statistics.avg_steps_per_task, 2.33);
        assert_eq!(
            info.statistics.tools_list,
            vec!["calculate", "read_json", "validate_data"]
        );
    }
}
