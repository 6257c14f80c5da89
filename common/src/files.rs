use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::task::{answer_to_string, parse_tasks, SolvedTask};

/// Crea la carpeta padre de `path` si hace falta.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("no se pudo crear el directorio {}", parent.display()))?;
        }
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("no se pudo abrir {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("JSON inválido en {}", path.display()))
}

/// Escribe `value` como JSON indentado, creando directorios intermedios.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let out =
        File::create(path).with_context(|| format!("no se pudo crear {}", path.display()))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("error serializando {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!("escrito {}", path.display());
    Ok(())
}

/// Expande un patrón glob a la lista (ordenada) de archivos que matchean.
/// Un patrón sin coincidencias es un error.
pub fn expand_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries = glob::glob(pattern).with_context(|| format!("patrón inválido: {pattern}"))?;
    for entry in entries {
        let path = entry.with_context(|| format!("error leyendo coincidencia de {pattern}"))?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        bail!("ningún archivo coincide con {pattern}");
    }
    Ok(paths)
}

/// Carga todas las tareas de un archivo JSON.
pub fn load_tasks(path: &Path) -> Result<Vec<SolvedTask>> {
    let doc: Value = read_json(path)?;
    parse_tasks(doc).with_context(|| format!("formato de tareas inválido en {}", path.display()))
}

/// Carga las tareas de todos los archivos que matchean `pattern`, en orden de ruta.
pub fn load_tasks_glob(pattern: &str) -> Result<Vec<SolvedTask>> {
    let mut tasks = Vec::new();
    for path in expand_inputs(pattern)? {
        let loaded = load_tasks(&path)?;
        info!("{} tareas cargadas desde {}", loaded.len(), path.display());
        tasks.extend(loaded);
    }
    Ok(tasks)
}

/// Respuestas de referencia externas: objeto JSON `task_id -> respuesta`.
pub fn load_answers(path: &Path) -> Result<HashMap<String, String>> {
    let doc: Value = read_json(path)?;
    let Value::Object(map) = doc else {
        bail!("{} debe ser un objeto task_id -> respuesta", path.display());
    };

    Ok(map
        .into_iter()
        .filter_map(|(k, v)| answer_to_string(&v).map(|a| (k, a)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("tracedag_files_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    #[test]
    fn write_json_crea_directorios_y_read_json_lo_lee() {
        let tmp = temp_dir("roundtrip");
        let path = tmp.join("a").join("b").join("out.json");

        write_json(&path, &json!({"x": [1, 2]})).unwrap();
        assert!(path.exists());

        let back: Value = read_json(&path).unwrap();
        assert_eq!(back, json!({"x": [1, 2]}));
    }

    #[test]
    fn read_json_falla_si_no_existe_o_es_invalido() {
        let tmp = temp_dir("invalid");
        assert!(read_json::<Value>(&tmp.join("no_existe.json")).is_err());

        let bad = tmp.join("bad.json");
        fs::write(&bad, "{ esto no es json").unwrap();
        assert!(read_json::<Value>(&bad).is_err());
    }

    #[test]
    fn expand_inputs_ordena_y_falla_sin_coincidencias() {
        let tmp = temp_dir("glob");
        fs::write(tmp.join("b.json"), "[]").unwrap();
        fs::write(tmp.join("a.json"), "[]").unwrap();

        let pattern = format!("{}/*.json", tmp.display());
        let paths = expand_inputs(&pattern).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);

        let none = format!("{}/*.csv", tmp.display());
        assert!(expand_inputs(&none).is_err());
    }

    #[test]
    fn load_tasks_glob_concatena_archivos() {
        let tmp = temp_dir("load");
        fs::write(
            tmp.join("1.json"),
            r#"[{"task_id": "a", "annotated_steps": []}]"#,
        )
        .unwrap();
        fs::write(
            tmp.join("2.json"),
            r#"{"correct_tasks": [{"task_id": "b", "plan": {"tool_sequence": []}}]}"#,
        )
        .unwrap();

        let tasks = load_tasks_glob(&format!("{}/*.json", tmp.display())).unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn load_answers_acepta_strings_y_numeros() {
        let tmp = temp_dir("answers");
        let path = tmp.join("answers.json");
        fs::write(&path, r#"{"t1": "Claude Shannon", "t2": 55, "t3": null}"#).unwrap();

        let answers = load_answers(&path).unwrap();
        assert_eq!(answers.get("t1").map(String::as_str), Some("Claude Shannon"));
        assert_eq!(answers.get("t2").map(String::as_str), Some("55"));
        assert!(!answers.contains_key("t3"));
    }
}
