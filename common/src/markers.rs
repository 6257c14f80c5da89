//! Marcadores de referencia dentro de los argumentos de un paso.
//!
//! Un argumento como `"<from_previous_web_fetch>"` no es un valor literal:
//! indica que el valor sale de la salida de otro paso. El clasificador
//! convierte el texto en `MarkerKind` para que el resto del pipeline trabaje
//! con valores tipados.

/// Tipo de marcador reconocido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    /// `<from_previous_X>`: salida de la invocación más reciente de la herramienta X.
    FromPrevious(String),
    /// `<from_context>`: datos del contexto (lectura, web o extracción previa).
    Context,
    /// `<iterate:F>`: iterar el campo F de registros estructurados.
    Iterate(String),
}

/// Todos los marcadores reconocidos en `value`, en orden de aparición.
/// Lo que no matchea (p. ej. `<from search>`) simplemente se ignora.
pub fn classify(value: &str) -> Vec<MarkerKind> {
    let re = regex!(r"(?i)<(?:from_previous_(\w+)|(from_context)|iterate:(\w+))>");

    re.captures_iter(value)
        .filter_map(|caps| {
            if let Some(tool) = caps.get(1) {
                Some(MarkerKind::FromPrevious(tool.as_str().to_lowercase()))
            } else if caps.get(2).is_some() {
                Some(MarkerKind::Context)
            } else {
                caps.get(3)
                    .map(|field| MarkerKind::Iterate(field.as_str().to_lowercase()))
            }
        })
        .collect()
}

/// ¿Contiene algún marcador reconocido?
pub fn has_marker(value: &str) -> bool {
    !classify(value).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_reconoce_los_tres_tipos() {
        assert_eq!(
            classify("<from_previous_Web_Fetch>"),
            vec![MarkerKind::FromPrevious("web_fetch".into())]
        );
        assert_eq!(classify("<FROM_CONTEXT>"), vec![MarkerKind::Context]);
        assert_eq!(
            classify("<iterate:Authors>"),
            vec![MarkerKind::Iterate("authors".into())]
        );
    }

    #[test]
    fn classify_devuelve_varios_en_orden() {
        let found = classify("usar <from_context> y luego <from_previous_calculate>");
        assert_eq!(
            found,
            vec![
                MarkerKind::Context,
                MarkerKind::FromPrevious("calculate".into())
            ]
        );
    }

    #[test]
    fn marcadores_desconocidos_o_texto_plano_no_cuentan() {
        assert!(classify("<from search>").is_empty());
        assert!(classify("<result_from_calculate>").is_empty());
        assert!(classify("https://example.org/a?b=<c>").is_empty());
        assert!(!has_marker("data/file.xlsx"));
        assert!(has_marker("prefijo <iterate:row> sufijo"));
    }
}
