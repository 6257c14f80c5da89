//! Métricas estructurales del DAG: profundidad, paralelismo y chequeos de
//! consistencia.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use tracing::warn;

use crate::dag::{DagEdge, DagNode, DagStats};

/// Grafo de petgraph indexado por id de nodo. Las aristas con extremos
/// inexistentes no se cargan.
struct Loaded<'a> {
    graph: DiGraph<&'a str, ()>,
    index: HashMap<&'a str, NodeIndex>,
}

fn load<'a>(nodes: &'a [DagNode], edges: &'a [DagEdge]) -> Loaded<'a> {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();

    for node in nodes {
        let idx = graph.add_node(node.id.as_str());
        index.insert(node.id.as_str(), idx);
    }

    for edge in edges {
        if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
            graph.add_edge(from, to, ());
        }
    }

    Loaded { graph, index }
}

/// Cadena de dependencias más larga, contada en nodos.
/// Un grafo vacío tiene profundidad 0; un nodo suelto, 1.
pub fn max_depth(nodes: &[DagNode], edges: &[DagEdge]) -> usize {
    let loaded = load(nodes, edges);
    let graph = &loaded.graph;

    let order = match toposort(graph, None) {
        Ok(order) => order,
        Err(cycle) => {
            warn!("ciclo detectado en el nodo {}", graph[cycle.node_id()]);
            return 0;
        }
    };

    // depth[v] = nodos del camino más largo que termina en v
    let mut depth = vec![0usize; graph.node_count()];
    for idx in order {
        let best_parent = graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|p| depth[p.index()])
            .max()
            .unwrap_or(0);
        depth[idx.index()] = best_parent + 1;
    }

    depth.into_iter().max().unwrap_or(0)
}

/// Nodos sin dependencias: se podrían ejecutar en paralelo.
pub fn parallelism(nodes: &[DagNode]) -> usize {
    nodes.iter().filter(|n| n.is_root()).count()
}

pub fn is_acyclic(nodes: &[DagNode], edges: &[DagEdge]) -> bool {
    !is_cyclic_directed(&load(nodes, edges).graph)
}

/// Aristas cuyo `from` o `to` no es un nodo del grafo.
pub fn dangling_edges<'a>(nodes: &[DagNode], edges: &'a [DagEdge]) -> Vec<&'a DagEdge> {
    edges
        .iter()
        .filter(|e| {
            !nodes.iter().any(|n| n.id == e.from) || !nodes.iter().any(|n| n.id == e.to)
        })
        .collect()
}

/// Ids de los nodos sin aristas entrantes.
pub fn roots<'a>(nodes: &'a [DagNode], edges: &[DagEdge]) -> Vec<&'a str> {
    let loaded = load(nodes, edges);
    nodes
        .iter()
        .filter(|n| {
            loaded
                .index
                .get(n.id.as_str())
                .map(|&idx| {
                    loaded
                        .graph
                        .neighbors_directed(idx, Direction::Incoming)
                        .next()
                        .is_none()
                })
                .unwrap_or(true)
        })
        .map(|n| n.id.as_str())
        .collect()
}

pub fn stats(nodes: &[DagNode], edges: &[DagEdge]) -> DagStats {
    DagStats {
        num_nodes: nodes.len(),
        num_edges: edges.len(),
        max_depth: max_depth(nodes, edges),
        parallelizable_steps: parallelism(nodes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str], links: &[(&str, &str)]) -> (Vec<DagNode>, Vec<DagEdge>) {
        let mut nodes: Vec<DagNode> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| DagNode::new(*id, i, "calculate"))
            .collect();
        let mut edges = Vec::new();
        for (from, to) in links {
            if let Some(n) = nodes.iter_mut().find(|n| n.id == *to) {
                n.dependencies.push(from.to_string());
            }
            edges.push(DagEdge {
                from: from.to_string(),
                to: to.to_string(),
                data_type: "sequential".into(),
            });
        }
        (nodes, edges)
    }

    #[test]
    fn profundidad_de_grafo_vacio_y_nodo_suelto() {
        assert_eq!(max_depth(&[], &[]), 0);

        let (nodes, edges) = chain(&["a"], &[]);
        assert_eq!(max_depth(&nodes, &edges), 1);
        assert_eq!(parallelism(&nodes), 1);
    }

    #[test]
    fn profundidad_toma_el_camino_mas_largo() {
        // a -> b -> d, a -> c, d <- c ; e suelto
        let (nodes, edges) = chain(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "d"), ("a", "c"), ("c", "d")],
        );

        assert_eq!(max_depth(&nodes, &edges), 3);
        assert_eq!(parallelism(&nodes), 2);
        assert_eq!(roots(&nodes, &edges), vec!["a", "e"]);
    }

    #[test]
    fn diamante_con_rama_larga() {
        let (nodes, edges) = chain(
            &["a", "b", "c", "d", "e"],
            &[("a", "b"), ("b", "c"), ("c", "e"), ("a", "d"), ("d", "e")],
        );
        assert_eq!(max_depth(&nodes, &edges), 4);
    }

    #[test]
    fn aristas_colgantes_se_reportan_e_ignoran() {
        let (nodes, mut edges) = chain(&["a", "b"], &[("a", "b")]);
        edges.push(DagEdge {
            from: "fantasma".into(),
            to: "b".into(),
            data_type: "sequential".into(),
        });

        let dangling = dangling_edges(&nodes, &edges);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].from, "fantasma");
        assert_eq!(max_depth(&nodes, &edges), 2);
    }

    #[test]
    fn ciclo_detectado() {
        let (nodes, edges) = chain(&["a", "b"], &[("a", "b"), ("b", "a")]);
        assert!(!is_acyclic(&nodes, &edges));
        assert_eq!(max_depth(&nodes, &edges), 0);

        let (nodes, edges) = chain(&["a", "b"], &[("a", "b")]);
        assert!(is_acyclic(&nodes, &edges));
    }

    #[test]
    fn stats_resume_todo() {
        let (nodes, edges) = chain(&["a", "b", "c"], &[("a", "b"), ("a", "c")]);
        assert_eq!(
            stats(&nodes, &edges),
            DagStats {
                num_nodes: 3,
                num_edges: 2,
                max_depth: 2,
                parallelizable_steps: 1
            }
        );
    }
}
