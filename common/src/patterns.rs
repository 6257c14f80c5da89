//! Patrones de texto con los que el extractor busca candidatos a respuesta.
//!
//! Cada función mira una descripción y devuelve a lo sumo un candidato; el
//! orden y la confianza de cada una los decide `extract::Method`.

use regex::Regex;
use std::collections::HashMap;

use crate::normalize::format_rounded;

const STOP_WORDS: &[&str] = &["the", "a", "an", "is", "are", "was", "were", "this", "that"];

fn has_rounding_hint(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("round") || lower.contains("nearest")
}

/// Último número decimal (`\d+.\d+`) del texto.
pub fn last_decimal(text: &str) -> Option<&str> {
    regex!(r"\b\d+\.\d+\b")
        .find_iter(text)
        .last()
        .map(|m| m.as_str())
}

/// Pares de números: `(a, b)`, luego `a, b`, luego `: a ... : b`.
pub fn comma_numbers(text: &str) -> Option<String> {
    let patterns: [&Regex; 3] = [
        regex!(r"\((\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)\)"),
        regex!(r"(\d+(?:\.\d+)?)\s*,\s*(\d+(?:\.\d+)?)"),
        regex!(r":\s*(\d+(?:\.\d+)?)[^0-9]*:\s*(\d+(?:\.\d+)?)"),
    ];

    patterns.iter().find_map(|re| {
        re.captures_iter(text)
            .last()
            .map(|caps| format!("{}, {}", &caps[1], &caps[2]))
    })
}

/// Contenido del último paréntesis, si no parece una expresión matemática.
pub fn parentheses(text: &str) -> Option<String> {
    let last = regex!(r"\(([^)]+)\)").captures_iter(text).last()?;
    let inner = last[1].trim();

    let len = inner.chars().count();
    if !(2..=50).contains(&len) {
        return None;
    }
    if inner.contains(['+', '-', '*', '/', '=']) {
        return None;
    }
    Some(inner.to_string())
}

pub fn quotes(text: &str) -> Option<String> {
    [regex!(r#""([^"]+)""#), regex!(r"'([^']+)'")]
        .iter()
        .find_map(|re| re.captures_iter(text).last())
        .map(|caps| caps[1].trim().to_string())
}

/// Nombre propio más frecuente (`First Last`, si no `First M. Last`).
/// Empates: gana el que aparece primero.
pub fn name_pattern(text: &str) -> Option<String> {
    let patterns: [&Regex; 2] = [
        regex!(r"\b([A-Z][a-z]+ [A-Z][a-z]+)\b"),
        regex!(r"\b([A-Z][a-z]+ [A-Z]\. [A-Z][a-z]+)\b"),
    ];

    for re in patterns {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();

        for m in re.find_iter(text) {
            let name = m.as_str();
            let count = counts.entry(name).or_insert(0);
            if *count == 0 {
                order.push(name);
            }
            *count += 1;
        }

        // max_by_key devuelve el último máximo; se recorre al revés para
        // quedarse con la primera aparición
        if let Some(best) = order.iter().rev().max_by_key(|name| counts[*name]) {
            return Some(best.to_string());
        }
    }
    None
}

/// Número a la derecha de un `=` o de `equal(s)`.
pub fn math_eval(text: &str) -> Option<String> {
    [
        regex!(r"=\s*(\d+(?:\.\d+)?)"),
        regex!(r"(?i)equals?\s*(\d+(?:\.\d+)?)"),
    ]
    .iter()
    .find_map(|re| re.captures_iter(text).last())
    .map(|caps| caps[1].to_string())
}

/// Último decimal (redondeado si el texto lo pide); si no hay, último entero.
pub fn single_number(text: &str) -> Option<String> {
    if let Some(decimal) = last_decimal(text) {
        if has_rounding_hint(text) {
            if let Ok(value) = decimal.parse::<f64>() {
                return Some(format_rounded(value));
            }
        }
        return Some(decimal.to_string());
    }

    regex!(r"\b\d+\b")
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_string())
}

pub fn single_word(text: &str) -> Option<String> {
    let patterns: [&Regex; 3] = [
        regex!(r"(?i)answer is (\w+)"),
        regex!(r"(?i)found (\w+)"),
        regex!(r"(?i)the (\w+)\."),
    ];

    patterns.iter().find_map(|re| {
        let word = re.captures_iter(text).last()?[1].to_lowercase();
        if STOP_WORDS.contains(&word.as_str()) || word.chars().count() < 3 {
            None
        } else {
            Some(word)
        }
    })
}
