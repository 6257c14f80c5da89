use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

pub type TaskId = String;
pub type StepId = String;

/// Argumentos de un paso: nombre de parámetro -> valor JSON.
/// BTreeMap para que la iteración sea siempre en orden lexicográfico de clave.
pub type Arguments = BTreeMap<String, Value>;

/// Fuentes conocidas de tareas (para particionar reportes).
pub const SOURCE_GAIA_L3: &str = "gaia_l3";
pub const SOURCE_TA: &str = "ta";
pub const SOURCE_UNKNOWN: &str = "unknown";

/* =========================
   Paso anotado
   ========================= */

/// Un paso de la traza anotada de una tarea resuelta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "step_id", alias = "id", default)]
    pub id: StepId,

    /// Herramienta invocada; `None` en pasos de razonamiento puro.
    #[serde(rename = "tool_name", alias = "tool", default)]
    pub tool: Option<String>,

    #[serde(default, deserialize_with = "arguments_or_empty")]
    pub arguments: Arguments,

    #[serde(default, deserialize_with = "string_or_empty")]
    pub description: String,

    /// "tool", "thought", ... (sólo lo usa el chequeo de completitud)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
}

impl Step {
    /// Nombre de herramienta no vacío, si lo hay.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Paso de razonamiento (sin herramienta).
    pub fn is_reasoning(&self) -> bool {
        self.tool_name().is_none()
    }
}

fn arguments_or_empty<'de, D>(de: D) -> Result<Arguments, D::Error>
where
    D: Deserializer<'de>,
{
    // argumentos que no son objeto (null, string, lista) se tratan como vacíos
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Object(map) => map.into_iter().collect(),
        _ => Arguments::new(),
    })
}

fn string_or_empty<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<String>::deserialize(de)?;
    Ok(v.unwrap_or_default())
}

/* =========================
   Tarea resuelta
   ========================= */

/// Tarea resuelta tal como la consume el pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedTask {
    pub task_id: TaskId,
    pub question: String,
    pub final_answer: Option<String>,
    /// Origen de la tarea ("gaia_l3", "ta", ...)
    pub source: String,
    pub steps: Vec<Step>,
}

impl SolvedTask {
    /// Pasos que invocan una herramienta, en orden original.
    pub fn tool_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| !s.is_reasoning())
    }
}

/// Forma cruda de un registro de tarea. Soporta el formato plano
/// (`annotated_steps`) y el del reporte de análisis (`plan.tool_sequence`).
#[derive(Debug, Deserialize)]
struct RawTask {
    task_id: String,
    #[serde(default, alias = "Question")]
    question: Option<String>,
    #[serde(default, alias = "Final answer")]
    final_answer: Option<Value>,
    #[serde(default, alias = "steps", alias = "tool_sequence")]
    annotated_steps: Vec<Step>,
    #[serde(default)]
    plan: Option<RawPlan>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    final_answer: Option<Value>,
    #[serde(default, alias = "annotated_steps", alias = "steps")]
    tool_sequence: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    source: Option<String>,
}

/// Convierte un valor de respuesta (string, número, ...) en texto.
pub fn answer_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Fuente por prefijo del id cuando la metadata no la trae.
pub fn source_from_task_id(task_id: &str) -> &'static str {
    if task_id.starts_with("gaia_val") {
        SOURCE_GAIA_L3
    } else if task_id.starts_with("gaia_ta") {
        SOURCE_TA
    } else {
        SOURCE_UNKNOWN
    }
}

impl RawTask {
    fn into_task(self) -> SolvedTask {
        let RawTask {
            task_id,
            question,
            final_answer,
            annotated_steps,
            plan,
            metadata,
        } = self;

        let (plan_question, plan_answer, plan_steps) = match plan {
            Some(p) => (p.question, p.final_answer, p.tool_sequence),
            None => (None, None, Vec::new()),
        };

        let mut steps = if annotated_steps.is_empty() {
            plan_steps
        } else {
            annotated_steps
        };

        // ids faltantes: step_1, step_2, ...
        for (i, step) in steps.iter_mut().enumerate() {
            if step.id.trim().is_empty() {
                step.id = format!("step_{}", i + 1);
            }
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                warn!("tarea {}: id de paso duplicado '{}'", task_id, step.id);
            }
        }

        let source = metadata
            .and_then(|m| m.source)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| source_from_task_id(&task_id).to_string());

        SolvedTask {
            question: question.or(plan_question).unwrap_or_default(),
            final_answer: final_answer
                .or(plan_answer)
                .as_ref()
                .and_then(answer_to_string),
            source,
            steps,
            task_id,
        }
    }
}

/// Decodifica un registro de tarea individual.
pub fn task_from_value(v: Value) -> Result<SolvedTask, serde_json::Error> {
    let raw: RawTask = serde_json::from_value(v)?;
    Ok(raw.into_task())
}

/// Interpreta un documento JSON de tareas:
/// - un array de registros,
/// - un objeto con `correct_tasks` / `not_executed_tasks` (reporte de análisis),
/// - un objeto con `tasks`.
///
/// Un registro que no se puede decodificar se salta con un warning.
pub fn parse_tasks(doc: Value) -> Result<Vec<SolvedTask>> {
    let records: Vec<Value> = match doc {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let mut items = Vec::new();
            let mut found = false;
            for key in ["correct_tasks", "not_executed_tasks", "tasks"] {
                if let Some(v) = obj.remove(key) {
                    found = true;
                    match v {
                        Value::Array(list) => items.extend(list),
                        _ => bail!("el campo '{}' no es un array", key),
                    }
                }
            }
            if !found {
                bail!("documento de tareas sin 'tasks', 'correct_tasks' ni 'not_executed_tasks'");
            }
            items
        }
        _ => bail!("documento de tareas inválido: se esperaba un array u objeto"),
    };

    let mut out = Vec::with_capacity(records.len());
    for (i, rec) in records.into_iter().enumerate() {
        match task_from_value(rec) {
            Ok(task) => out.push(task),
            Err(e) => warn!("registro de tarea #{} ignorado: {}", i, e),
        }
    }
    Ok(out)
}
