//! Extracción de la respuesta final a partir de la traza de pasos.
//!
//! Se prueban niveles en orden y se corta en el primero que da respuesta:
//!
//! 1. `submit_final_answer` explícito
//! 2. pista de redondeo en el último paso
//! 3. últimos pasos, del más reciente hacia atrás
//! 4. pasos con palabras clave, con penalización de confianza
//!
//! En los niveles 3 y 4 cada descripción pasa por la cascada de `Method`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::ExtractorConfig;
use crate::normalize::{format_rounded, is_reasonable};
use crate::patterns;
use crate::task::{answer_to_string, Step};

const SUBMIT_TOOL: &str = "submit_final_answer";

const ANSWER_KEYWORDS: &[&str] = &[
    "answer", "result", "final", "solution", "concluded", "found", "is", "equals", "=",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    SubmitFinalAnswer,
    Rounding,
    CommaNumbers,
    Parentheses,
    Quotes,
    NamePattern,
    MathEval,
    SingleNumber,
    SingleWord,
    NoExtraction,
}

impl Method {
    /// Cascada aplicada a cada descripción, en orden de prioridad.
    pub const CASCADE: [Method; 7] = [
        Method::CommaNumbers,
        Method::Parentheses,
        Method::Quotes,
        Method::NamePattern,
        Method::MathEval,
        Method::SingleNumber,
        Method::SingleWord,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::SubmitFinalAnswer => "submit_final_answer",
            Method::Rounding => "rounding",
            Method::CommaNumbers => "comma_numbers",
            Method::Parentheses => "parentheses",
            Method::Quotes => "quotes",
            Method::NamePattern => "name_pattern",
            Method::MathEval => "math_eval",
            Method::SingleNumber => "single_number",
            Method::SingleWord => "single_word",
            Method::NoExtraction => "no_extraction",
        }
    }

    pub fn confidence(self) -> f64 {
        match self {
            Method::SubmitFinalAnswer => 1.0,
            Method::Rounding | Method::CommaNumbers => 0.95,
            Method::Parentheses => 0.9,
            Method::Quotes => 0.85,
            Method::NamePattern => 0.8,
            Method::MathEval => 0.75,
            Method::SingleNumber => 0.7,
            Method::SingleWord => 0.6,
            Method::NoExtraction => 0.0,
        }
    }

    /// Patrón de texto asociado; `None` para los métodos que no miran la descripción.
    fn matcher(self) -> Option<fn(&str) -> Option<String>> {
        match self {
            Method::CommaNumbers => Some(patterns::comma_numbers),
            Method::Parentheses => Some(patterns::parentheses),
            Method::Quotes => Some(patterns::quotes),
            Method::NamePattern => Some(patterns::name_pattern),
            Method::MathEval => Some(patterns::math_eval),
            Method::SingleNumber => Some(patterns::single_number),
            Method::SingleWord => Some(patterns::single_word),
            Method::SubmitFinalAnswer | Method::Rounding | Method::NoExtraction => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidato que pasó el filtro de plausibilidad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCandidate {
    pub value: String,
    pub confidence: f64,
    pub method: Method,
    /// Número de paso (desde 1) de donde sale.
    pub source_step: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub answer: Option<String>,
    pub confidence: f64,
    pub method: Method,
    /// Número de paso (desde 1); `None` si no hubo extracción.
    pub source_step: Option<usize>,
    #[serde(default)]
    pub via_keyword: bool,
    /// Otros candidatos válidos del mismo paso, en orden de cascada.
    #[serde(default)]
    pub alternates: Vec<String>,
}

impl Extraction {
    pub fn none() -> Self {
        Self {
            answer: None,
            confidence: 0.0,
            method: Method::NoExtraction,
            source_step: None,
            via_keyword: false,
            alternates: Vec::new(),
        }
    }

    fn single(candidate: AnswerCandidate) -> Self {
        Self {
            answer: Some(candidate.value),
            confidence: candidate.confidence,
            method: candidate.method,
            source_step: Some(candidate.source_step),
            via_keyword: false,
            alternates: Vec::new(),
        }
    }

    /// El primer candidato gana; el resto queda como alternativas.
    fn from_candidates(mut candidates: Vec<AnswerCandidate>) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        let rest = candidates.split_off(1);
        let mut extraction = Self::single(candidates.remove(0));

        for c in rest {
            let dup = extraction.answer.as_deref() == Some(c.value.as_str())
                || extraction.alternates.contains(&c.value);
            if !dup {
                extraction.alternates.push(c.value);
            }
        }
        Some(extraction)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnswerExtractor {
    config: ExtractorConfig,
}

impl AnswerExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extrae la respuesta de `steps`. `expected`, si viene, sólo relaja el
    /// filtro para los candidatos que coinciden con ella: nunca se devuelve un
    /// texto que no esté en la traza.
    pub fn extract(&self, steps: &[Step], expected: Option<&str>) -> Extraction {
        let expected = expected.filter(|e| !e.trim().is_empty());

        let tiers: [(&str, fn(&Self, &[Step], Option<&str>) -> Option<Extraction>); 4] = [
            ("submit", Self::from_submission),
            ("rounding", Self::from_rounding_hint),
            ("recent", Self::from_recent_steps),
            ("keyword", Self::from_keyword_steps),
        ];

        for (name, tier) in tiers {
            if let Some(found) = tier(self, steps, expected) {
                debug!(
                    "respuesta por nivel {}: {:?} ({}, {:.2})",
                    name, found.answer, found.method, found.confidence
                );
                return found;
            }
        }
        Extraction::none()
    }

    /// Corre la cascada sobre un texto y devuelve todos los candidatos que
    /// pasan el filtro, en orden de prioridad.
    pub fn candidates(
        &self,
        text: &str,
        expected: Option<&str>,
        source_step: usize,
    ) -> Vec<AnswerCandidate> {
        Method::CASCADE
            .iter()
            .filter_map(|&method| {
                let value = (method.matcher()?)(text)?;
                is_reasonable(&value, expected, &self.config).then(|| AnswerCandidate {
                    value,
                    confidence: method.confidence(),
                    method,
                    source_step,
                })
            })
            .collect()
    }

    fn from_submission(&self, steps: &[Step], expected: Option<&str>) -> Option<Extraction> {
        steps.iter().enumerate().find_map(|(i, step)| {
            if step.tool_name() != Some(SUBMIT_TOOL) {
                return None;
            }
            let answer = answer_to_string(step.arguments.get("answer")?)?;
            is_reasonable(&answer, expected, &self.config).then(|| {
                Extraction::single(AnswerCandidate {
                    value: answer,
                    confidence: Method::SubmitFinalAnswer.confidence(),
                    method: Method::SubmitFinalAnswer,
                    source_step: i + 1,
                })
            })
        })
    }

    fn from_rounding_hint(&self, steps: &[Step], expected: Option<&str>) -> Option<Extraction> {
        let [.., prev, last] = steps else {
            return None;
        };

        let hint = last.description.to_lowercase();
        if !hint.contains("round") && !hint.contains("nearest") {
            return None;
        }

        let value: f64 = patterns::last_decimal(&prev.description)?.parse().ok()?;
        let rounded = format_rounded(value);

        is_reasonable(&rounded, expected, &self.config).then(|| {
            Extraction::single(AnswerCandidate {
                value: rounded,
                confidence: Method::Rounding.confidence(),
                method: Method::Rounding,
                source_step: steps.len() - 1,
            })
        })
    }

    fn from_recent_steps(&self, steps: &[Step], expected: Option<&str>) -> Option<Extraction> {
        let window = self.config.recent_window.min(steps.len());

        steps
            .iter()
            .enumerate()
            .rev()
            .take(window)
            .find_map(|(i, step)| {
                Extraction::from_candidates(self.candidates(&step.description, expected, i + 1))
            })
    }

    fn from_keyword_steps(&self, steps: &[Step], expected: Option<&str>) -> Option<Extraction> {
        steps.iter().enumerate().find_map(|(i, step)| {
            let lower = step.description.to_lowercase();
            if !ANSWER_KEYWORDS.iter().any(|k| lower.contains(k)) {
                return None;
            }

            let mut found =
                Extraction::from_candidates(self.candidates(&step.description, expected, i + 1))?;
            found.confidence =
                (found.confidence - self.config.keyword_penalty).clamp(0.0, 1.0);
            found.via_keyword = true;
            Some(found)
        })
    }
}
