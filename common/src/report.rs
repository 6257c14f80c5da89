use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::extract::{AnswerExtractor, Extraction, Method};
use crate::files::ensure_parent_dir;
use crate::normalize::normalize;
use crate::task::{SolvedTask, TaskId};

const CONCLUSION_KEYWORDS: &[&str] = &["conclude", "final", "answer", "result"];

/// Resultado de extracción de una tarea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub task_id: TaskId,
    pub source: String,
    pub expected: Option<String>,
    pub extracted: Option<String>,
    pub confidence: f64,
    pub method: Method,
    pub source_step: Option<usize>,
    pub via_keyword: bool,
    pub alternates: Vec<String>,
    /// `None` cuando no hay respuesta de referencia.
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
}

/// Chequeo estructural para tareas sin respuesta de referencia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub score: f64,
    pub complete: bool,
    pub has_tool_steps: bool,
    pub has_reasoning_steps: bool,
    pub has_conclusion: bool,
    pub total_steps: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    pub total: usize,
    /// Tareas con respuesta de referencia.
    pub evaluated: usize,
    pub correct: usize,
    pub incorrect: usize,
    /// Tareas sin respuesta extraída.
    pub unanswered: usize,
    /// correct / evaluated (0 si no hay evaluadas).
    pub accuracy: f64,
}

impl Counts {
    fn add(&mut self, record: &ExtractionRecord) {
        self.total += 1;
        if record.extracted.is_none() {
            self.unanswered += 1;
        }
        match record.is_correct {
            Some(true) => {
                self.evaluated += 1;
                self.correct += 1;
            }
            Some(false) => {
                self.evaluated += 1;
                self.incorrect += 1;
            }
            None => {}
        }
        self.accuracy = if self.evaluated == 0 {
            0.0
        } else {
            self.correct as f64 / self.evaluated as f64
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Counts,
    pub by_source: BTreeMap<String, Counts>,
    pub results: Vec<ExtractionRecord>,
}

pub fn assess_completeness(task: &SolvedTask) -> Completeness {
    let steps = &task.steps;

    let has_tool_steps = task.tool_steps().next().is_some();
    let has_reasoning_steps = steps
        .iter()
        .any(|s| s.step_type.as_deref() == Some("thought"));
    let has_conclusion = steps.iter().rev().take(3).any(|s| {
        let desc = s.description.to_lowercase();
        CONCLUSION_KEYWORDS.iter().any(|k| desc.contains(k))
    });

    // en décimas para no arrastrar error de coma flotante
    let tenths = 4 * u32::from(has_tool_steps)
        + 3 * u32::from(has_reasoning_steps)
        + 3 * u32::from(has_conclusion);

    Completeness {
        score: f64::from(tenths) / 10.0,
        complete: tenths >= 8,
        has_tool_steps,
        has_reasoning_steps,
        has_conclusion,
        total_steps: steps.len(),
    }
}

/// Extrae y evalúa una tarea. `expected` tiene prioridad sobre el
/// `final_answer` de la propia tarea.
pub fn evaluate_task(
    task: &SolvedTask,
    expected: Option<&str>,
    extractor: &AnswerExtractor,
) -> ExtractionRecord {
    let expected = expected
        .or(task.final_answer.as_deref())
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(String::from);

    let Extraction {
        answer,
        confidence,
        method,
        source_step,
        via_keyword,
        alternates,
    } = extractor.extract(&task.steps, expected.as_deref());

    let is_correct = expected.as_deref().map(|exp| {
        answer
            .as_deref()
            .map(|got| normalize(got) == normalize(exp))
            .unwrap_or(false)
    });

    let completeness = expected.is_none().then(|| assess_completeness(task));

    debug!(
        "tarea {}: esperado={:?} extraído={:?} método={} correcto={:?}",
        task.task_id, expected, answer, method, is_correct
    );

    ExtractionRecord {
        task_id: task.task_id.clone(),
        source: task.source.clone(),
        expected,
        extracted: answer,
        confidence,
        method,
        source_step,
        via_keyword,
        alternates,
        is_correct,
        completeness,
    }
}

pub fn build_report(
    tasks: &[SolvedTask],
    answers: &HashMap<String, String>,
    extractor: &AnswerExtractor,
) -> ExtractionReport {
    let mut summary = Counts::default();
    let mut by_source: BTreeMap<String, Counts> = BTreeMap::new();
    let mut results = Vec::with_capacity(tasks.len());

    for task in tasks {
        let record = evaluate_task(
            task,
            answers.get(&task.task_id).map(String::as_str),
            extractor,
        );
        summary.add(&record);
        by_source.entry(record.source.clone()).or_default().add(&record);
        results.push(record);
    }

    info!(
        "extracción: total={}, evaluadas={}, correctas={}, sin respuesta={}",
        summary.total, summary.evaluated, summary.correct, summary.unanswered
    );

    ExtractionReport {
        run_id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        summary,
        by_source,
        results,
    }
}

/// Fila plana para el CSV (csv no serializa listas anidadas).
#[derive(Serialize)]
struct CsvRow<'a> {
    task_id: &'a str,
    source: &'a str,
    expected: Option<&'a str>,
    extracted: Option<&'a str>,
    confidence: f64,
    method: Method,
    source_step: Option<usize>,
    via_keyword: bool,
    alternates: String,
    is_correct: Option<bool>,
    completeness_score: Option<f64>,
}

pub fn write_csv(path: &Path, records: &[ExtractionRecord]) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("no se pudo crear {}", path.display()))?;

    for r in records {
        writer
            .serialize(CsvRow {
                task_id: &r.task_id,
                source: &r.source,
                expected: r.expected.as_deref(),
                extracted: r.extracted.as_deref(),
                confidence: r.confidence,
                method: r.method,
                source_step: r.source_step,
                via_keyword: r.via_keyword,
                alternates: r.alternates.join("; "),
                is_correct: r.is_correct,
                completeness_score: r.completeness.as_ref().map(|c| c.score),
            })
            .with_context(|| format!("error escribiendo fila de {}", r.task_id))?;
    }

    writer.flush()?;
    Ok(())
}
