//! Núcleo de tracedag: carga de tareas resueltas, construcción del DAG de
//! llamadas a herramientas, extracción de respuestas y generación de datos
//! sintéticos de entrenamiento.

/// Compila una expresión regular una sola vez y la reutiliza.
macro_rules! regex {
    ($pat:literal) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($pat).expect("expresión regular inválida"))
    }};
}

pub mod analyze;
pub mod config;
pub mod dag;
pub mod dataset;
pub mod extract;
pub mod files;
pub mod infer;
pub mod markers;
pub mod normalize;
pub mod patterns;
pub mod report;
pub mod task;
pub mod tools;
pub mod variants;

pub use config::ExtractorConfig;
pub use dag::{build_dag, DagEdge, DagNode, DagStats, RetryConfig, TaskDag};
pub use dataset::{build_dataset, DatasetEntry, ToolScaleDataset};
pub use extract::{AnswerCandidate, AnswerExtractor, Extraction, Method};
pub use report::{build_report, ExtractionRecord, ExtractionReport};
pub use task::{Arguments, SolvedTask, Step, StepId, TaskId};
pub use variants::{augment_all, AugmentedDags, VariantDag, VariantMethod};
