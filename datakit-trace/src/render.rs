use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("plantuml jar not found at {0}")]
    JarNotFound(PathBuf),

    #[error("`java` not found on PATH")]
    JavaNotFound,

    #[error("plantuml rendering failed: {stderr}")]
    RenderFailed { stderr: String },

    #[error("plantuml ran but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Renders PlantUML text to a PNG next to its `.puml` source.
///
/// Writes `<output_base>.puml`, runs `java -jar <jar> <file>` and returns the
/// path of the PNG the jar produced. The `.puml` source is kept on disk even
/// when rendering fails, so it can be rendered elsewhere.
pub fn render_diagram(
    puml: &str,
    output_base: &Path,
    jar_path: &Path,
) -> Result<PathBuf, RenderError> {
    let puml_file = output_base.with_extension("puml");
    let png_file = output_base.with_extension("png");

    if let Some(parent) = output_base.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&puml_file, puml)?;
    info!(path = %puml_file.display(), "wrote diagram source");

    if !jar_path.exists() {
        return Err(RenderError::JarNotFound(jar_path.to_owned()));
    }

    let output = Command::new("java")
        .arg("-jar")
        .arg(jar_path)
        .arg(&puml_file)
        .output()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RenderError::JavaNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    if !output.status.success() {
        return Err(RenderError::RenderFailed {
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    if !png_file.exists() {
        return Err(RenderError::OutputMissing(png_file));
    }

    info!(path = %png_file.display(), "rendered diagram");

    Ok(png_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_jar_still_writes_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("reports/trace");
        let jar = dir.path().join("no-such.jar");

        let err = render_diagram("@startuml\n@enduml\n", &base, &jar).unwrap_err();

        assert!(matches!(err, RenderError::JarNotFound(_)));
        let written = std::fs::read_to_string(base.with_extension("puml")).unwrap();
        assert!(written.contains("@startuml"));
    }
}
