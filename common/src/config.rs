use std::str::FromStr;
use tracing::warn;

const DEFAULT_NUMERIC_TOLERANCE: f64 = 1.0;
const DEFAULT_MAX_ANSWER_CHARS: usize = 100;
const DEFAULT_RECENT_WINDOW: usize = 5;
const DEFAULT_KEYWORD_PENALTY: f64 = 0.1;

/// Umbrales del extractor de respuestas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorConfig {
    /// Diferencia máxima para considerar dos números equivalentes.
    pub numeric_tolerance: f64,
    /// Sin respuesta esperada, candidatos más largos se descartan.
    pub max_answer_chars: usize,
    /// Cuántos pasos finales recorre la búsqueda hacia atrás.
    pub recent_window: usize,
    /// Descuento de confianza para respuestas halladas por palabra clave.
    pub keyword_penalty: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            numeric_tolerance: DEFAULT_NUMERIC_TOLERANCE,
            max_answer_chars: DEFAULT_MAX_ANSWER_CHARS,
            recent_window: DEFAULT_RECENT_WINDOW,
            keyword_penalty: DEFAULT_KEYWORD_PENALTY,
        }
    }
}

impl ExtractorConfig {
    /// Valores por defecto, sobreescribibles con ANSWER_NUMERIC_TOLERANCE,
    /// ANSWER_MAX_CHARS, ANSWER_RECENT_WINDOW y ANSWER_KEYWORD_PENALTY.
    /// Un valor que no parsea o cae fuera de rango se ignora con un aviso.
    pub fn from_env() -> Self {
        Self {
            numeric_tolerance: env_or(
                "ANSWER_NUMERIC_TOLERANCE",
                DEFAULT_NUMERIC_TOLERANCE,
                |t: &f64| t.is_finite() && *t >= 0.0,
            ),
            max_answer_chars: env_or("ANSWER_MAX_CHARS", DEFAULT_MAX_ANSWER_CHARS, |n: &usize| {
                *n >= 1
            }),
            recent_window: env_or("ANSWER_RECENT_WINDOW", DEFAULT_RECENT_WINDOW, |n: &usize| {
                *n >= 1
            }),
            keyword_penalty: env_or(
                "ANSWER_KEYWORD_PENALTY",
                DEFAULT_KEYWORD_PENALTY,
                |p: &f64| (0.0..=1.0).contains(p),
            ),
        }
    }
}

fn env_or<T>(key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            warn!("{key}={value} fuera de rango, se usa {default}");
            default
        }
        Err(_) => {
            warn!("{key}={raw:?} no es válido, se usa {default}");
            default
        }
    }
}
