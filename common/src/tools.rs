//! Clasificación de herramientas por nombre.
//!
//! Todos los predicados reciben el nombre ya en minúsculas. Son por
//! subcadena/prefijo para aceptar tanto los nombres canónicos (`web_search`,
//! `read_json`) como variantes cortas (`search`, `fetch`).

/// Herramientas disponibles en el harness. Un paso con otra herramienta
/// igual genera nodo, pero se avisa como problema de calidad de datos.
pub const KNOWN_TOOLS: &[&str] = &[
    "aggregate_data",
    "analyze_image",
    "calculate",
    "compare_data",
    "compare_values",
    "correlation_analysis",
    "count_occurrences",
    "create_csv",
    "create_markdown",
    "currency_converter",
    "date_calculator",
    "deduplicate_data",
    "encode_decode",
    "extract_information",
    "extract_zip",
    "fill_missing",
    "filter_data",
    "find_in_text",
    "geocoding",
    "image_to_text",
    "join_data",
    "list_operations",
    "moving_average",
    "pivot_table",
    "read_csv",
    "read_docx",
    "read_excel",
    "read_image",
    "read_json",
    "read_pdf",
    "read_text_file",
    "read_xml",
    "regex_search",
    "sample_data",
    "sort_data",
    "split_join_text",
    "statistical_analysis",
    "string_transform",
    "submit_final_answer",
    "unit_converter",
    "validate_data",
    "web_fetch",
    "web_search",
    "wikipedia_search",
];

pub fn is_known(tool: &str) -> bool {
    KNOWN_TOOLS.contains(&tool)
}

pub fn is_search(tool: &str) -> bool {
    tool.contains("search") && tool != "regex_search"
}

pub fn is_fetch(tool: &str) -> bool {
    tool.contains("fetch") || tool == "web_browser" || tool == "download_file"
}

pub fn is_web(tool: &str) -> bool {
    tool.starts_with("web_") || is_fetch(tool)
}

pub fn is_reader(tool: &str) -> bool {
    tool.starts_with("read_")
}

pub fn is_archive(tool: &str) -> bool {
    tool.contains("zip") || tool.contains("archive")
}

pub fn is_extractor(tool: &str) -> bool {
    tool == "extract_information"
}

/// Produce registros estructurados (sirve para `<iterate:F>`).
pub fn is_structured_producer(tool: &str) -> bool {
    matches!(tool, "read_json" | "read_excel" | "read_xml" | "read_csv") || is_fetch(tool)
}

pub fn is_computation(tool: &str) -> bool {
    tool.starts_with("calc")
}

pub fn is_comparison(tool: &str) -> bool {
    tool == "compare_values"
}

pub fn is_shaping(tool: &str) -> bool {
    matches!(
        tool,
        "filter_data" | "sort_data" | "deduplicate_data" | "aggregate_data"
    )
}

pub fn is_text_analysis(tool: &str) -> bool {
    matches!(
        tool,
        "count_occurrences" | "find_in_text" | "extract_information"
    )
}

pub fn is_counting(tool: &str) -> bool {
    tool.starts_with("count_")
}

pub fn is_unit_conversion(tool: &str) -> bool {
    matches!(tool, "unit_converter" | "currency_converter")
}

pub fn is_value_producer(tool: &str) -> bool {
    is_computation(tool) || is_extractor(tool) || tool == "read_json"
}

/* =========================
   Rol de consumo (regla de semántica de herramienta)
   ========================= */

/// Qué necesita consumir una herramienta, independientemente de sus argumentos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerRole {
    Computation,
    Comparison,
    Shaping,
    TextAnalysis,
    UnitConversion,
}

impl ConsumerRole {
    pub fn of(tool: &str) -> Option<Self> {
        if is_computation(tool) {
            Some(Self::Computation)
        } else if is_comparison(tool) {
            Some(Self::Comparison)
        } else if is_shaping(tool) {
            Some(Self::Shaping)
        } else if is_text_analysis(tool) {
            Some(Self::TextAnalysis)
        } else if is_unit_conversion(tool) {
            Some(Self::UnitConversion)
        } else {
            None
        }
    }

    /// ¿`producer` puede alimentar a una herramienta con este rol?
    pub fn accepts(self, producer: &str) -> bool {
        match self {
            Self::Computation => {
                is_reader(producer)
                    || is_fetch(producer)
                    || is_extractor(producer)
                    || is_counting(producer)
            }
            Self::Comparison => is_computation(producer),
            Self::Shaping => is_reader(producer),
            Self::TextAnalysis => is_reader(producer) || is_fetch(producer),
            Self::UnitConversion => is_value_producer(producer),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Computation => "calculation_input",
            Self::Comparison => "comparison_value",
            Self::Shaping => "data_source",
            Self::TextAnalysis => "text_source",
            Self::UnitConversion => "value_source",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nombres_cortos_y_canonicos() {
        assert!(is_search("search"));
        assert!(is_search("wikipedia_search"));
        assert!(!is_search("regex_search"));
        assert!(is_fetch("fetch"));
        assert!(is_fetch("web_fetch"));
        assert!(is_web("web_search"));
        assert!(is_archive("extract_zip"));
        assert!(is_reader("read_pdf"));
        assert!(is_computation("calculate"));
        assert!(!is_computation("date_calculator"));
    }

    #[test]
    fn rol_de_consumo_y_productores() {
        assert_eq!(ConsumerRole::of("calculate"), Some(ConsumerRole::Computation));
        assert_eq!(ConsumerRole::of("compare_values"), Some(ConsumerRole::Comparison));
        assert_eq!(ConsumerRole::of("sort_data"), Some(ConsumerRole::Shaping));
        assert_eq!(ConsumerRole::of("find_in_text"), Some(ConsumerRole::TextAnalysis));
        assert_eq!(ConsumerRole::of("unit_converter"), Some(ConsumerRole::UnitConversion));
        assert_eq!(ConsumerRole::of("web_search"), None);

        assert!(ConsumerRole::Computation.accepts("count_occurrences"));
        assert!(!ConsumerRole::Computation.accepts("web_search"));
        assert!(ConsumerRole::Comparison.accepts("calculate"));
        assert!(ConsumerRole::UnitConversion.accepts("read_json"));
        assert!(!ConsumerRole::Shaping.accepts("web_fetch"));
    }

    #[test]
    fn registro_de_herramientas() {
        assert!(is_known("web_fetch"));
        assert!(!is_known("teleport"));
    }
}
