//! Inferencia de dependencias entre nodos.
//!
//! Cascada de cuatro reglas por nodo, en orden estricto de prioridad. La
//! primera regla que produce al menos una dependencia gana; las reglas no se
//! combinan:
//!
//! 1. marcadores en los argumentos (`<from_previous_X>`, `<from_context>`, `<iterate:F>`)
//! 2. nombre de parámetro (`file_path`, `url`, `data`)
//! 3. semántica de la herramienta consumidora
//! 4. dependencia secuencial con el nodo inmediatamente anterior
//!
//! Sólo se miran nodos anteriores, así que el grafo sale acíclico sin
//! necesidad de detectar ciclos.

use serde_json::Value;
use tracing::trace;

use crate::dag::{DagEdge, DagNode};
use crate::markers::{self, MarkerKind};
use crate::task::StepId;
use crate::tools::{self, ConsumerRole};

/// Dependencia candidata hacia un nodo previo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub from: StepId,
    pub data_type: String,
}

impl Dependency {
    fn new(from: &DagNode, data_type: impl Into<String>) -> Self {
        Self {
            from: from.id.clone(),
            data_type: data_type.into(),
        }
    }
}

type Rule = fn(&DagNode, &[DagNode]) -> Vec<Dependency>;

/// Reglas en orden de prioridad.
const RULES: [(&str, Rule); 4] = [
    ("placeholder", placeholder_rule),
    ("parameter", parameter_rule),
    ("tool_semantics", tool_semantics_rule),
    ("sequential", sequential_rule),
];

/// Infere todas las aristas y completa `dependencies` de cada nodo.
/// Los nodos deben venir en el orden original de ejecución.
pub fn infer_dependencies(nodes: &mut [DagNode]) -> Vec<DagEdge> {
    let mut edges = Vec::new();

    for i in 0..nodes.len() {
        let (prior, rest) = nodes.split_at_mut(i);
        let node = &mut rest[0];

        for dep in find_dependencies(node, prior) {
            // una sola arista por par (from, to)
            if node.dependencies.contains(&dep.from) {
                continue;
            }
            node.dependencies.push(dep.from.clone());
            edges.push(DagEdge {
                from: dep.from,
                to: node.id.clone(),
                data_type: dep.data_type,
            });
        }
    }

    edges
}

/// Aplica la cascada a un nodo contra los nodos que lo preceden.
pub fn find_dependencies(node: &DagNode, prior: &[DagNode]) -> Vec<Dependency> {
    for (name, rule) in RULES {
        let deps = rule(node, prior);
        if !deps.is_empty() {
            trace!("nodo {}: regla {} -> {:?}", node.id, name, deps);
            return deps;
        }
    }
    Vec::new()
}

/// Nodo previo más reciente cuya herramienta cumple `pred`.
fn most_recent<'a, P>(prior: &'a [DagNode], pred: P) -> Option<&'a DagNode>
where
    P: Fn(&str) -> bool,
{
    prior.iter().rev().find(|n| pred(&n.tool_lc()))
}

/* =========================
   Regla 1: marcadores
   ========================= */

pub fn placeholder_rule(node: &DagNode, prior: &[DagNode]) -> Vec<Dependency> {
    let mut deps = Vec::new();

    for value in node.arguments.values() {
        let Some(text) = value.as_str() else {
            continue;
        };

        for marker in markers::classify(text) {
            let found = match &marker {
                MarkerKind::FromPrevious(target) => most_recent(prior, |t| t.contains(target.as_str()))
                    .map(|n| Dependency::new(n, format!("output_from_{target}"))),
                MarkerKind::Context => most_recent(prior, |t| {
                    tools::is_reader(t) || tools::is_web(t) || tools::is_extractor(t)
                })
                .map(|n| Dependency::new(n, "context_data")),
                MarkerKind::Iterate(field) => most_recent(prior, tools::is_structured_producer)
                    .map(|n| Dependency::new(n, format!("field_{field}"))),
            };

            if let Some(dep) = found {
                deps.push(dep);
            }
        }
    }

    deps
}

/* =========================
   Regla 2: nombre de parámetro
   ========================= */

fn is_reader_or_extractor(tool: &str) -> bool {
    tools::is_reader(tool) || tools::is_extractor(tool)
}

/// (parámetro, productor esperado, etiqueta)
const PARAMETER_SOURCES: [(&str, fn(&str) -> bool, &str); 3] = [
    ("file_path", tools::is_archive, "extracted_file"),
    ("url", tools::is_search, "search_url"),
    ("data", is_reader_or_extractor, "source_data"),
];

pub fn parameter_rule(node: &DagNode, prior: &[DagNode]) -> Vec<Dependency> {
    for (param, producer, label) in PARAMETER_SOURCES {
        let Some(text) = node.arguments.get(param).and_then(Value::as_str) else {
            continue;
        };
        // los marcadores ya los resolvió la regla 1
        if markers::has_marker(text) {
            continue;
        }
        if let Some(prev) = most_recent(prior, producer) {
            return vec![Dependency::new(prev, label)];
        }
    }
    Vec::new()
}

/* =========================
   Regla 3: semántica de la herramienta
   ========================= */

pub fn tool_semantics_rule(node: &DagNode, prior: &[DagNode]) -> Vec<Dependency> {
    let Some(role) = ConsumerRole::of(&node.tool_lc()) else {
        return Vec::new();
    };

    most_recent(prior, |t| role.accepts(t))
        .map(|prev| vec![Dependency::new(prev, role.label())])
        .unwrap_or_default()
}

/* =========================
   Regla 4: secuencial
   ========================= */

/// Herramientas de arranque: nunca reciben dependencia secuencial.
pub fn is_starting_node(node: &DagNode) -> bool {
    let tool = node.tool_lc();
    if tools::is_search(&tool) || tools::is_archive(&tool) {
        return true;
    }

    // lectura de un archivo con ruta ya concreta
    tools::is_reader(&tool)
        && node
            .arguments
            .get("file_path")
            .map(|v| v.as_str().map(|s| !s.contains('<')).unwrap_or(true))
            .unwrap_or(false)
}

pub fn sequential_rule(node: &DagNode, prior: &[DagNode]) -> Vec<Dependency> {
    match prior.last() {
        Some(prev) if !is_starting_node(node) => vec![Dependency::new(prev, "sequential")],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, tool: &str, args: serde_json::Value) -> DagNode {
        let mut n = DagNode::new(id, 0, tool);
        n.arguments = args
            .as_object()
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default();
        n
    }

    fn build(mut nodes: Vec<DagNode>) -> (Vec<DagNode>, Vec<DagEdge>) {
        for (i, n) in nodes.iter_mut().enumerate() {
            n.index = i;
        }
        let edges = infer_dependencies(&mut nodes);
        (nodes, edges)
    }

    fn edge(from: &str, to: &str, data_type: &str) -> DagEdge {
        DagEdge {
            from: from.into(),
            to: to.into(),
            data_type: data_type.into(),
        }
    }

    /* ============
       Regla 1
       ============ */

    #[test]
    fn from_previous_toma_el_mas_reciente() {
        let (_, edges) = build(vec![
            node("a", "web_fetch", json!({"url": "http://x"})),
            node("b", "web_fetch", json!({"url": "http://y"})),
            node("c", "find_in_text", json!({"text": "<from_previous_web_fetch>"})),
        ]);

        assert!(edges.contains(&edge("b", "c", "output_from_web_fetch")));
        assert!(!edges.iter().any(|e| e.from == "a" && e.to == "c"));
    }

    #[test]
    fn from_context_busca_lectura_web_o_extraccion() {
        let (_, edges) = build(vec![
            node("a", "read_pdf", json!({"file_path": "doc.pdf"})),
            node("b", "calculate", json!({"expression": "2*3"})),
            node("c", "string_transform", json!({"text": "<from_context>"})),
        ]);

        assert!(edges.contains(&edge("a", "c", "context_data")));
    }

    #[test]
    fn iterate_busca_productor_estructurado() {
        let (_, edges) = build(vec![
            node("a", "read_excel", json!({"file_path": "x.xlsx"})),
            node("b", "read_pdf", json!({"file_path": "y.pdf"})),
            node("c", "list_operations", json!({"items": "<iterate:rows>"})),
        ]);

        assert!(edges.contains(&edge("a", "c", "field_rows")));
    }

    #[test]
    fn varios_marcadores_suman_una_arista_cada_uno() {
        let (nodes, edges) = build(vec![
            node("a", "web_search", json!({"query": "q"})),
            node("b", "read_json", json!({"file_path": "data.json"})),
            node(
                "c",
                "compare_data",
                json!({"left": "<from_previous_web_search>", "right": "<iterate:items>"}),
            ),
        ]);

        let into_c: Vec<&DagEdge> = edges.iter().filter(|e| e.to == "c").collect();
        assert_eq!(into_c.len(), 2);
        // orden lexicográfico de argumentos: "left" antes que "right"
        assert_eq!(into_c[0], &edge("a", "c", "output_from_web_search"));
        assert_eq!(into_c[1], &edge("b", "c", "field_items"));
        assert_eq!(nodes[2].dependencies, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn marcadores_al_mismo_nodo_no_duplican_arista() {
        let (nodes, edges) = build(vec![
            node("a", "read_text_file", json!({"file_path": "t.txt"})),
            node("b", "find_in_text", json!({"text": "<from_context>", "pattern": "<from_context>"})),
        ]);

        assert_eq!(edges.iter().filter(|e| e.to == "b").count(), 1);
        assert_eq!(nodes[1].dependencies, vec!["a".to_string()]);
    }

    #[test]
    fn regla_de_marcador_gana_sobre_semantica() {
        let (_, edges) = build(vec![
            node("a", "read_json", json!({"file_path": "a.json"})),
            node("b", "web_fetch", json!({"url": "http://x"})),
            node("c", "calculate", json!({"expression": "<from_previous_read_json>"})),
        ]);

        let into_c: Vec<&DagEdge> = edges.iter().filter(|e| e.to == "c").collect();
        assert_eq!(into_c, vec![&edge("a", "c", "output_from_read_json")]);
        assert!(!edges.iter().any(|e| e.data_type == "calculation_input"));
    }

    /* ============
       Regla 2
       ============ */

    #[test]
    fn escenario_search_fetch_produce_search_url() {
        let (nodes, edges) = build(vec![
            node("search", "search", json!({"query": "q"})),
            node("fetch", "fetch", json!({"url": "<from search>"})),
        ]);

        assert_eq!(edges, vec![edge("search", "fetch", "search_url")]);
        assert_eq!(nodes[1].dependencies.len(), 1);
        assert!(nodes[0].is_root());
        assert_eq!(crate::analyze::parallelism(&nodes), 1);
        assert_eq!(crate::analyze::max_depth(&nodes, &edges), 2);
    }

    #[test]
    fn file_path_depende_de_descompresion() {
        let (_, edges) = build(vec![
            node("z", "extract_zip", json!({"file_path": "a.zip"})),
            node("r", "read_csv", json!({"file_path": "out/a.csv"})),
        ]);

        assert_eq!(edges, vec![edge("z", "r", "extracted_file")]);
    }

    #[test]
    fn data_depende_de_lector_o_extractor() {
        let (_, edges) = build(vec![
            node("r", "read_json", json!({"file_path": "a.json"})),
            node("v", "validate_data", json!({"data": "registros"})),
        ]);

        assert_eq!(edges, vec![edge("r", "v", "source_data")]);
    }

    #[test]
    fn parametro_con_marcador_no_usa_regla_dos() {
        // "<from_context>" sin fuente válida: regla 1 no encuentra nada y la
        // regla 2 no debe mirar ese parámetro; cae a la secuencial.
        let (_, edges) = build(vec![
            node("s", "wikipedia_search", json!({"query": "q"})),
            node("f", "web_fetch", json!({"url": "<from_context>"})),
        ]);

        assert_eq!(edges, vec![edge("s", "f", "sequential")]);
    }

    /* ============
       Regla 3
       ============ */

    #[test]
    fn semantica_por_rol_de_herramienta() {
        let (_, edges) = build(vec![
            node("r", "read_excel", json!({"file_path": "x.xlsx"})),
            node("c", "calculate", json!({"expression": "1/2"})),
            node("k", "compare_values", json!({"a": 1, "b": 2})),
            node("u", "unit_converter", json!({"value": 3})),
        ]);

        assert!(edges.contains(&edge("r", "c", "calculation_input")));
        assert!(edges.contains(&edge("c", "k", "comparison_value")));
        assert!(edges.contains(&edge("c", "u", "value_source")));
    }

    #[test]
    fn analisis_de_texto_y_filtrado() {
        let (_, edges) = build(vec![
            node("f", "web_fetch", json!({"url": "http://x"})),
            node("n", "count_occurrences", json!({"word": "mice"})),
            node("r", "read_csv", json!({"file_path": "a.csv"})),
            node("s", "sort_data", json!({"sort_by": "year"})),
        ]);

        assert!(edges.contains(&edge("f", "n", "text_source")));
        assert!(edges.contains(&edge("r", "s", "data_source")));
    }

    #[test]
    fn calculate_sin_previos_queda_como_raiz() {
        let (nodes, edges) = build(vec![node("c", "calculate", json!({"expression": "2+2"}))]);

        assert!(edges.is_empty());
        assert!(nodes[0].is_root());
    }

    /* ============
       Regla 4
       ============ */

    #[test]
    fn fallback_secuencial_una_sola_arista() {
        let (nodes, edges) = build(vec![
            node("a", "geocoding", json!({"place": "Taipei"})),
            node("b", "create_markdown", json!({"title": "x"})),
        ]);

        assert_eq!(edges, vec![edge("a", "b", "sequential")]);
        assert_eq!(nodes[1].dependencies, vec!["a".to_string()]);
    }

    #[test]
    fn herramientas_de_arranque_quedan_como_raiz() {
        let (nodes, edges) = build(vec![
            node("a", "web_search", json!({"query": "q1"})),
            node("b", "wikipedia_search", json!({"query": "q2"})),
            node("c", "extract_zip", json!({"file_path": "a.zip"})),
            node("d", "read_pdf", json!({"file_path": "paper.pdf"})),
        ]);

        // d: file_path concreto pero hay un extract_zip previo -> regla 2
        assert_eq!(edges, vec![edge("c", "d", "extracted_file")]);
        assert!(nodes[..3].iter().all(DagNode::is_root));
    }

    #[test]
    fn lectura_con_ruta_no_concreta_no_es_arranque() {
        let n = node("r", "read_pdf", json!({"file_path": "<downloaded file>"}));
        assert!(!is_starting_node(&n));

        let m = node("r", "read_pdf", json!({"file_path": "paper.pdf"}));
        assert!(is_starting_node(&m));
    }

    #[test]
    fn dependencias_solo_hacia_nodos_previos() {
        let (nodes, edges) = build(vec![
            node("a", "web_search", json!({"query": "q"})),
            node("b", "web_fetch", json!({"url": "http://x"})),
            node("c", "extract_information", json!({"data": "<from_context>"})),
            node("d", "calculate", json!({"expression": "x"})),
            node("e", "compare_values", json!({})),
            node("f", "create_csv", json!({})),
        ]);

        let pos = |id: &str| nodes.iter().position(|n| n.id == id).unwrap();
        for e in &edges {
            assert!(pos(&e.from) < pos(&e.to), "arista hacia atrás: {:?}", e);
        }
    }
}
