/*

Trace Demo

This example exercises the configuration, logging and tracing crates end to
end. It loads the settings (falling back to built-in dev values when no
configuration is present), initializes logging, runs a handful of traced
functions including a loop and a deliberate failure, and renders the collected
sequence diagram.

Usage:
    cargo run --bin trace_demo

Rendering the PNG requires `java` on the PATH and a PlantUML jar at
`reports/plantuml.jar` (or the path in the PLANTUML_JAR variable); without it
the demo still writes `reports/process_trace.puml`.

*/

use std::path::{Path, PathBuf};

use datakit_config::load_settings;
use datakit_telemetry::init_logging;
use datakit_trace::{RenderError, Tracer, render_diagram};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
enum DemoError {
    #[error("file not found: {0}")]
    FileNotFound(String),
}

fn load_data(path: &str) -> Result<String, DemoError> {
    info!("loading data from: {path}");

    if path == "data.csv" {
        Ok("some,csv,data".to_owned())
    } else {
        Err(DemoError::FileNotFound(path.to_owned()))
    }
}

fn parse_row(row: &str) -> Result<bool, DemoError> {
    debug!("parsing {row}");
    Ok(true)
}

fn process_data(tracer: &Tracer, data: &str) -> Result<String, DemoError> {
    debug!("processing data: {data}");

    // Three identical calls, collapsed into a loop block by the tracer.
    for i in 0..3 {
        let row = format!("row_{i}");
        tracer.traced("process_data", "parse_row", &row, || parse_row(&row))?;
    }

    Ok("processed_data".to_owned())
}

fn save_data(data: &str, output_path: &str) -> Result<bool, DemoError> {
    info!("saving {data} to {output_path}");
    Ok(true)
}

fn run_pipeline(tracer: &Tracer) {
    let outcome: Result<(), DemoError> = (|| {
        let data = tracer.traced("main", "load_data", "\"data.csv\"", || {
            load_data("data.csv")
        })?;

        let processed = tracer.traced("main", "process_data", "\"some,csv,data\"", || {
            process_data(tracer, &data)
        })?;

        tracer.traced("main", "save_data", "\"output.pkl\"", || {
            save_data(&processed, "output.pkl")
        })?;

        Ok(())
    })();

    if let Err(e) = outcome {
        error!("a managed error occurred: {e}");
    }

    // This call fails on purpose so the diagram shows a raise arrow.
    let failed = tracer.traced("main", "load_data", "\"other_file.csv\"", || {
        load_data("other_file.csv")
    });

    if let Err(e) = failed {
        error!("second process failed as expected: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_name = env!("CARGO_BIN_NAME");

    let settings = match load_settings() {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("running without settings ({e})");
            None
        }
    };

    let environment = settings
        .as_ref()
        .map(|s| s.environment)
        .unwrap_or_default();

    let _log_flusher = init_logging(app_name, environment, "logs")?;

    info!("starting the demo in {environment} mode");
    debug!("this debug line only shows in dev");
    warn!("this is what a warning looks like");

    let tracer = Tracer::new();
    run_pipeline(&tracer);

    info!("generating the trace diagram");

    let puml = tracer.finish();
    let output_base = Path::new("reports/process_trace");
    let jar_path = std::env::var("PLANTUML_JAR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("reports/plantuml.jar"));

    match render_diagram(&puml, output_base, &jar_path) {
        Ok(png) => info!("saved diagram to {}", png.display()),
        Err(e @ (RenderError::JarNotFound(_) | RenderError::JavaNotFound)) => {
            warn!("diagram source written, rendering skipped: {e}");
        }
        Err(e) => error!("failed to render the trace diagram: {e}"),
    }

    info!("demo finished");

    Ok(())
}
