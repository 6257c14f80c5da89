//! Variantes sintéticas de un DAG para aumentar el set de entrenamiento.
//!
//! Cada variante parte de una copia del DAG original, aplica una única
//! transformación y recalcula las estadísticas. Una variante que no cambia
//! nada igual se emite, así los ids de variante quedan alineados entre tareas.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::dag::{DagEdge, DagNode, RetryConfig, TaskDag};
use crate::tools;

pub const MAX_VARIANTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantMethod {
    Original,
    ParameterTweak,
    AddVerification,
    ChangeDescription,
    AddRetry,
    Simplify,
    ToolSubstitution,
    Reorder,
    Decompose,
    MergeSteps,
    AddIntermediateOutput,
}

impl VariantMethod {
    /// Transformaciones en orden de id (1..=10).
    pub const ALL: [VariantMethod; MAX_VARIANTS] = [
        VariantMethod::ParameterTweak,
        VariantMethod::AddVerification,
        VariantMethod::ChangeDescription,
        VariantMethod::AddRetry,
        VariantMethod::Simplify,
        VariantMethod::ToolSubstitution,
        VariantMethod::Reorder,
        VariantMethod::Decompose,
        VariantMethod::MergeSteps,
        VariantMethod::AddIntermediateOutput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VariantMethod::Original => "original",
            VariantMethod::ParameterTweak => "parameter_tweak",
            VariantMethod::AddVerification => "add_verification",
            VariantMethod::ChangeDescription => "change_description",
            VariantMethod::AddRetry => "add_retry",
            VariantMethod::Simplify => "simplify",
            VariantMethod::ToolSubstitution => "tool_substitution",
            VariantMethod::Reorder => "reorder",
            VariantMethod::Decompose => "decompose",
            VariantMethod::MergeSteps => "merge_steps",
            VariantMethod::AddIntermediateOutput => "add_intermediate_output",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            VariantMethod::Original => "Original DAG",
            VariantMethod::ParameterTweak => "Reformat numeric parameters without changing meaning",
            VariantMethod::AddVerification => "Add a verification step after the calculation",
            VariantMethod::ChangeDescription => "Reword step descriptions keeping their meaning",
            VariantMethod::AddRetry => "Add retry policy to steps that may fail",
            VariantMethod::Simplify => "Simplify the execution path",
            VariantMethod::ToolSubstitution => "Replace a tool with a functionally similar one",
            VariantMethod::Reorder => "Reorder independent steps",
            VariantMethod::Decompose => "Split a complex step into sub-steps",
            VariantMethod::MergeSteps => "Merge consecutive operations of the same kind",
            VariantMethod::AddIntermediateOutput => "Save intermediate output after key steps",
        }
    }

    /// Id de variante: 0 para el original, 1..=10 para el resto.
    pub fn id(self) -> usize {
        Self::ALL
            .iter()
            .position(|m| *m == self)
            .map(|p| p + 1)
            .unwrap_or(0)
    }

    fn apply(self, dag: &mut TaskDag) {
        match self {
            VariantMethod::Original => {}
            VariantMethod::ParameterTweak => parameter_tweak(dag),
            VariantMethod::AddVerification => add_verification(dag),
            VariantMethod::ChangeDescription => change_description(dag),
            VariantMethod::AddRetry => add_retry(dag),
            VariantMethod::Simplify => simplify(dag),
            VariantMethod::ToolSubstitution => tool_substitution(dag),
            VariantMethod::Reorder => reorder(dag),
            VariantMethod::Decompose => decompose(dag),
            VariantMethod::MergeSteps => merge_steps(dag),
            VariantMethod::AddIntermediateOutput => add_intermediate_output(dag),
        }
    }
}

/// DAG más los datos de la variante que lo generó.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDag {
    #[serde(flatten)]
    pub dag: TaskDag,
    pub variant_id: usize,
    pub variant_method: VariantMethod,
    pub variant_description: String,
}

impl VariantDag {
    fn new(dag: TaskDag, method: VariantMethod) -> Self {
        Self {
            dag,
            variant_id: method.id(),
            variant_method: method,
            variant_description: method.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedDags {
    pub total_dags: usize,
    pub original_count: usize,
    pub augmented_count: usize,
    pub dags: Vec<VariantDag>,
}

/// Original (variante 0) seguido de las primeras `n` transformaciones.
pub fn augment(dag: &TaskDag, n: usize) -> Vec<VariantDag> {
    let mut out = Vec::with_capacity(n.min(MAX_VARIANTS) + 1);
    out.push(VariantDag::new(dag.clone(), VariantMethod::Original));

    for method in VariantMethod::ALL.into_iter().take(n) {
        let mut variant = dag.clone();
        method.apply(&mut variant);
        variant.refresh_stats();
        if !variant.check_integrity() {
            warn!("tarea {}: variante {} inconsistente", dag.task_id, method.as_str());
        }
        out.push(VariantDag::new(variant, method));
    }

    debug!("tarea {}: {} variantes", dag.task_id, out.len() - 1);
    out
}

pub fn augment_all(dags: &[TaskDag], n: usize) -> AugmentedDags {
    let all: Vec<VariantDag> = dags.iter().flat_map(|d| augment(d, n)).collect();

    AugmentedDags {
        total_dags: all.len(),
        original_count: dags.len(),
        augmented_count: all.len() - dags.len(),
        dags: all,
    }
}

/* =========================
   Transformaciones
   ========================= */

fn is_computation(node: &DagNode) -> bool {
    tools::is_computation(&node.tool_lc())
}

fn annotate(node: &mut DagNode, note: &str) {
    node.description.push_str(note);
}

fn parameter_tweak(dag: &mut TaskDag) {
    for node in dag.nodes.iter_mut().filter(|n| is_computation(n)) {
        let Some(Value::String(expr)) = node.arguments.get_mut("expression") else {
            continue;
        };
        if expr.contains('/') {
            *expr = format!("({expr})");
            annotate(node, " (parameter format tweak)");
        }
    }
}

fn add_verification(dag: &mut TaskDag) {
    let Some(calc_id) = dag
        .nodes
        .iter()
        .rev()
        .find(|n| is_computation(n))
        .map(|n| n.id.clone())
    else {
        return;
    };

    let mut verify = DagNode::new(format!("{calc_id}_verify"), dag.nodes.len(), "validate_data");
    verify
        .arguments
        .insert("data".into(), Value::from("<result_from_calculate>"));
    verify
        .arguments
        .insert("validation_type".into(), Value::from("number_range"));
    verify.description = "Verify that the calculated result is plausible".into();
    verify.dependencies.push(calc_id.clone());

    dag.edges.push(DagEdge {
        from: calc_id,
        to: verify.id.clone(),
        data_type: "number".into(),
    });
    dag.nodes.push(verify);
}

const REWORDINGS: [(&str, &str); 3] = [
    ("Opened the JSONLD file.", "Read the contents of the JSONLD file."),
    ("Took the average", "Computed the mean"),
    ("Calculate", "Perform the arithmetic for"),
];

fn change_description(dag: &mut TaskDag) {
    for node in &mut dag.nodes {
        for (old, new) in REWORDINGS {
            if node.description.contains(old) {
                node.description = node.description.replace(old, new);
            }
        }
    }
}

fn add_retry(dag: &mut TaskDag) {
    for node in &mut dag.nodes {
        let tool = node.tool_lc();
        if tools::is_reader(&tool) || tools::is_web(&tool) {
            node.retry_config = Some(RetryConfig {
                max_retries: 3,
                backoff: "exponential".into(),
            });
            annotate(node, " (with retry)");
        }
    }
}

fn simplify(dag: &mut TaskDag) {
    if dag.nodes.len() > 2 {
        return;
    }
    for node in &mut dag.nodes {
        node.explicit_output = Some(true);
        annotate(node, " (explicit output)");
    }
}

fn substitute(tool: &str) -> Option<&'static str> {
    match tool {
        "web_search" => Some("wikipedia_search"),
        "wikipedia_search" => Some("web_search"),
        "read_json" => Some("read_csv"),
        "read_csv" => Some("read_excel"),
        _ => None,
    }
}

fn tool_substitution(dag: &mut TaskDag) {
    for node in &mut dag.nodes {
        if let Some(new_tool) = substitute(&node.tool_lc()) {
            let note = format!(" (tool substitution: {} -> {})", node.tool, new_tool);
            node.tool = new_tool.to_string();
            annotate(node, &note);
            return;
        }
    }
}

fn reorder(dag: &mut TaskDag) {
    if dag.nodes.len() < 3 {
        return;
    }

    let swap_at = dag.nodes.windows(2).position(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        !b.dependencies.contains(&a.id) && !a.dependencies.contains(&b.id)
    });

    if let Some(i) = swap_at {
        dag.nodes.swap(i, i + 1);
        dag.renumber();
    }
}

fn decompose(dag: &mut TaskDag) {
    let Some(pos) = dag
        .nodes
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, n)| is_computation(n))
        .map(|(i, _)| i)
    else {
        return;
    };

    let calc_id = dag.nodes[pos].id.clone();
    let mut extract = DagNode::new(format!("{calc_id}_extract"), pos, "extract_information");
    extract
        .arguments
        .insert("data".into(), Value::from("<from_context>"));
    extract
        .arguments
        .insert("target".into(), Value::from("numerical_values"));
    extract.description = "Extract the numerical values (sub-goal)".into();
    extract.dependencies = std::mem::take(&mut dag.nodes[pos].dependencies);
    dag.nodes[pos].dependencies.push(extract.id.clone());

    // lo que entraba al cálculo ahora entra al nodo de extracción
    for edge in dag.edges.iter_mut().filter(|e| e.to == calc_id) {
        edge.to = extract.id.clone();
    }
    dag.edges.push(DagEdge {
        from: extract.id.clone(),
        to: calc_id,
        data_type: "extracted_data".into(),
    });

    dag.nodes.insert(pos, extract);
    dag.renumber();
}

fn merge_steps(dag: &mut TaskDag) {
    let Some(i) = dag
        .nodes
        .windows(2)
        .position(|pair| tools::is_fetch(&pair[0].tool_lc()) && tools::is_fetch(&pair[1].tool_lc()))
    else {
        return;
    };

    let removed = dag.nodes.remove(i + 1);
    let keep_id = dag.nodes[i].id.clone();

    let survivor = &mut dag.nodes[i];
    let note = format!(" + {} (merged)", removed.description);
    annotate(survivor, &note);
    survivor.arguments.insert("batch_urls".into(), Value::Bool(true));

    for node in &mut dag.nodes {
        if let Some(p) = node.dependencies.iter().position(|d| *d == removed.id) {
            node.dependencies.remove(p);
            if node.id != keep_id && !node.dependencies.contains(&keep_id) {
                node.dependencies.push(keep_id.clone());
            }
        }
    }

    let mut edges: Vec<DagEdge> = Vec::with_capacity(dag.edges.len());
    for mut edge in std::mem::take(&mut dag.edges) {
        if edge.to == removed.id {
            continue;
        }
        if edge.from == removed.id {
            edge.from = keep_id.clone();
        }
        if !edges.iter().any(|e| e.from == edge.from && e.to == edge.to) {
            edges.push(edge);
        }
    }
    dag.edges = edges;
    dag.renumber();
}

fn add_intermediate_output(dag: &mut TaskDag) {
    for node in &mut dag.nodes {
        let tool = node.tool_lc();
        if tools::is_computation(&tool)
            || tools::is_extractor(&tool)
            || tool == "filter_data"
            || tools::is_fetch(&tool)
        {
            node.save_intermediate = Some(true);
            annotate(node, " (save intermediate result)");
        }
    }
}
