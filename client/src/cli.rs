use anyhow::Result;
use clap::{Parser, Subcommand};
use common::files::{load_answers, load_tasks_glob, read_json, write_json};
use common::report::write_csv;
use common::variants::MAX_VARIANTS;
use common::{
    augment_all, build_dag, build_dataset, build_report, AnswerExtractor, AugmentedDags,
    ExtractorConfig, SolvedTask, TaskDag, ToolScaleDataset,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "tracedag")]
#[command(about = "DAGs de llamadas a herramientas, extracción de respuestas y datos sintéticos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Construye el DAG de cada tarea resuelta
    Dag {
        /// Archivo(s) de tareas; acepta patrón glob
        #[arg(long, value_name = "GLOB")]
        input: String,

        #[arg(long, default_value = "dags.json")]
        output: PathBuf,
    },

    /// Extrae la respuesta final de cada traza y la compara con la esperada
    Extract {
        #[arg(long, value_name = "GLOB")]
        input: String,

        #[arg(long, default_value = "extraction_report.json")]
        output: PathBuf,

        /// Además escribe los resultados como CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// JSON task_id -> respuesta; tiene prioridad sobre final_answer
        #[arg(long)]
        answers: Option<PathBuf>,
    },

    /// Genera variantes de cada DAG
    Augment {
        /// dags.json generado por `dag`
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "augmented_dags.json")]
        output: PathBuf,

        /// Variantes por DAG (máximo 10)
        #[arg(long, default_value_t = 5)]
        variants: usize,
    },

    /// Convierte los DAGs aumentados al formato ToolScale
    Dataset {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "toolscale_dataset.json")]
        output: PathBuf,
    },

    /// dag + augment + dataset en una sola pasada
    Pipeline {
        #[arg(long, value_name = "GLOB")]
        input: String,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = 5)]
        variants: usize,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dag { input, output } => {
            let dags = dags_from_tasks(&load_tasks_glob(&input)?);
            write_json(&output, &dags)?;
            print_dags(&dags, &output);
        }

        Commands::Extract {
            input,
            output,
            csv,
            answers,
        } => {
            let tasks = load_tasks_glob(&input)?;
            let answers = match answers {
                Some(path) => load_answers(&path)?,
                None => HashMap::new(),
            };

            let extractor = AnswerExtractor::new(ExtractorConfig::from_env());
            info!("umbrales del extractor: {:?}", extractor.config());
            let report = build_report(&tasks, &answers, &extractor);

            write_json(&output, &report)?;
            if let Some(csv_path) = &csv {
                write_csv(csv_path, &report.results)?;
            }

            println!("Extracción de respuestas:");
            println!("  run_id: {}", report.run_id);
            println!(
                "  tareas: total={}, evaluadas={}, correctas={}, incorrectas={}, sin respuesta={}",
                report.summary.total,
                report.summary.evaluated,
                report.summary.correct,
                report.summary.incorrect,
                report.summary.unanswered
            );
            println!("  precisión: {:.1}%", report.summary.accuracy * 100.0);
            for (source, counts) in &report.by_source {
                println!(
                    "  [{}] total={}, correctas={}/{}",
                    source, counts.total, counts.correct, counts.evaluated
                );
            }
            println!("  reporte: {}", output.display());
            if let Some(csv_path) = csv {
                println!("  csv: {}", csv_path.display());
            }
        }

        Commands::Augment {
            input,
            output,
            variants,
        } => {
            let dags: Vec<TaskDag> = read_json(&input)?;
            let augmented = augment(&dags, variants);
            write_json(&output, &augmented)?;
            print_augmented(&augmented, &output);
        }

        Commands::Dataset { input, output } => {
            let augmented: AugmentedDags = read_json(&input)?;
            let dataset = build_dataset(&augmented);
            write_json(&output, &dataset)?;
            print_dataset(&dataset, &output);
        }

        Commands::Pipeline {
            input,
            out_dir,
            variants,
        } => {
            let dags = dags_from_tasks(&load_tasks_glob(&input)?);
            let dags_path = out_dir.join("dags.json");
            write_json(&dags_path, &dags)?;
            print_dags(&dags, &dags_path);

            let augmented = augment(&dags, variants);
            let augmented_path = out_dir.join("augmented_dags.json");
            write_json(&augmented_path, &augmented)?;
            print_augmented(&augmented, &augmented_path);

            let dataset = build_dataset(&augmented);
            let dataset_path = out_dir.join("toolscale_dataset.json");
            write_json(&dataset_path, &dataset)?;
            print_dataset(&dataset, &dataset_path);
        }
    }

    Ok(())
}

/// Tareas sin pasos con herramienta no generan DAG.
fn dags_from_tasks(tasks: &[SolvedTask]) -> Vec<TaskDag> {
    tasks
        .iter()
        .filter_map(|task| {
            let dag = build_dag(task);
            if dag.nodes.is_empty() {
                info!("tarea {} sin pasos con herramienta, se omite", task.task_id);
                None
            } else {
                Some(dag)
            }
        })
        .collect()
}

fn augment(dags: &[TaskDag], variants: usize) -> AugmentedDags {
    if variants > MAX_VARIANTS {
        info!("--variants {} excede el máximo, se usan {}", variants, MAX_VARIANTS);
    }
    augment_all(dags, variants.min(MAX_VARIANTS))
}

fn print_dags(dags: &[TaskDag], path: &Path) {
    let nodes: usize = dags.iter().map(|d| d.stats.num_nodes).sum();
    let edges: usize = dags.iter().map(|d| d.stats.num_edges).sum();
    let deepest = dags.iter().map(|d| d.stats.max_depth).max().unwrap_or(0);

    println!("DAGs construidos:");
    println!("  tareas: {}", dags.len());
    println!("  nodos: {nodes}, aristas: {edges}, profundidad máxima: {deepest}");
    println!("  salida: {}", path.display());
}

fn print_augmented(augmented: &AugmentedDags, path: &Path) {
    println!("Variantes generadas:");
    println!("  originales: {}", augmented.original_count);
    println!("  variantes: {}", augmented.augmented_count);
    println!("  total: {}", augmented.total_dags);
    println!("  salida: {}", path.display());
}

fn print_dataset(dataset: &ToolScaleDataset, path: &Path) {
    let info = &dataset.dataset_info;
    println!("Dataset {} v{}:", info.name, info.version);
    println!("  entradas: {}", info.total_entries);
    println!(
        "  pasos de planificación: {} (promedio {:.2})",
        info.statistics.total_planning_steps, info.statistics.avg_steps_per_task
    );
    println!(
        "  herramientas ({}): {}",
        info.statistics.unique_tools_used,
        info.statistics.tools_list.join(", ")
    );
    println!("  salida: {}", path.display());
}
