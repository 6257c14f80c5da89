//! Normalización de texto y comparación de respuestas.

use crate::config::ExtractorConfig;

/// Minúsculas, sin puntuación y con los espacios colapsados.
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Redondeo al par más cercano, sin decimales ("54.5" -> "54", "54.73" -> "55").
pub fn format_rounded(value: f64) -> String {
    format!("{:.0}", value.round_ties_even())
}

/// ¿Ambos textos son números equivalentes dentro de la tolerancia?
pub fn is_number_match(candidate: &str, expected: &str, tolerance: f64) -> bool {
    let (Some(a), Some(b)) = (parse_number(candidate), parse_number(expected)) else {
        return false;
    };

    a == b
        || (a - b).abs() <= tolerance
        || a.round_ties_even() == b
        || b.round_ties_even() == a
        || a.round_ties_even() == b.trunc()
}

/// Filtro que cada candidato tiene que pasar antes de aceptarse.
///
/// Una coincidencia con la respuesta esperada (normalizada, por contención o
/// numérica) se acepta directamente. Si no coincide, o no hay esperada, sólo
/// se descartan candidatos implausibles: un único carácter no numérico o
/// textos demasiado largos.
pub fn is_reasonable(candidate: &str, expected: Option<&str>, config: &ExtractorConfig) -> bool {
    if candidate.trim().is_empty() {
        return false;
    }

    if let Some(expected) = expected.filter(|e| !e.trim().is_empty()) {
        let cand = normalize(candidate);
        let exp = normalize(expected);

        if cand == exp {
            return true;
        }
        if !cand.is_empty() && (cand.contains(&exp) || exp.contains(&cand)) {
            return true;
        }
        if is_number_match(candidate, expected, config.numeric_tolerance) {
            return true;
        }
    }

    let mut chars = candidate.chars();
    if let (Some(only), None) = (chars.next(), chars.next()) {
        if !only.is_numeric() {
            return false;
        }
    }

    candidate.chars().count() <= config.max_answer_chars
}
