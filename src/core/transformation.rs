use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stem suffix marking a transformation that always rewrites its input, so a
/// no-change result is a legitimate success rather than a suspect one.
const ALWAYS_APPLY_SUFFIX: &str = "~always";

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("no transformation named '{0}'")]
    NotFound(String),
    #[error("failed to read stylesheet {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse stylesheet {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Declared parameter of a transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Default value from the stylesheet's `select` attribute, with string
    /// literal quotes stripped (they are re-added when binding).
    pub default: String,
    pub required: bool,
}

/// Static description of one available transformation: a stylesheet on disk
/// plus its declared parameters. Immutable and shared read-only across jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformation {
    pub path: PathBuf,
    pub name: String,
    pub params: Vec<ParamSpec>,
}

impl Transformation {
    /// Load one stylesheet and extract its parameter specs.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, TransformationError> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|source| TransformationError::Io {
            path: path.clone(),
            source,
        })?;
        let params = parse_params(&content).map_err(|message| TransformationError::Parse {
            path: path.clone(),
            message,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Transformation { path, name, params })
    }

    /// Name shown to operators, without the always-apply marker.
    pub fn display_name(&self) -> &str {
        self.name
            .strip_suffix(ALWAYS_APPLY_SUFFIX)
            .unwrap_or(&self.name)
    }

    /// An always-apply transformation expects never to be skipped.
    pub fn always_apply(&self) -> bool {
        self.name.ends_with(ALWAYS_APPLY_SUFFIX)
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// List every `.xsl` transformation under `dir`, sorted by name.
pub fn list_transformations(dir: &Path) -> Result<Vec<Transformation>, TransformationError> {
    let entries = fs::read_dir(dir).map_err(|source| TransformationError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut transformations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TransformationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "xsl") {
            transformations.push(Transformation::load(path)?);
        }
    }
    transformations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(transformations)
}

/// Resolve one transformation by name (display name accepted for the
/// always-apply variants).
pub fn get_transformation(name: &str, dir: &Path) -> Result<Transformation, TransformationError> {
    let direct = dir.join(format!("{name}.xsl"));
    if direct.is_file() {
        return Transformation::load(direct);
    }
    let always = dir.join(format!("{name}{ALWAYS_APPLY_SUFFIX}.xsl"));
    if always.is_file() {
        return Transformation::load(always);
    }
    Err(TransformationError::NotFound(name.to_string()))
}

/// Extract `<xsl:param>` declarations directly under the stylesheet root.
fn parse_params(content: &str) -> Result<Vec<ParamSpec>, String> {
    let mut reader = Reader::from_str(content);
    let mut params = Vec::new();
    let mut depth: usize = 0;
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                if depth == 1 && e.local_name().as_ref() == b"param" {
                    params.push(param_spec(&e)?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 1 && e.local_name().as_ref() == b"param" {
                    params.push(param_spec(&e)?);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(params)
}

fn param_spec(element: &quick_xml::events::BytesStart<'_>) -> Result<ParamSpec, String> {
    let mut name = String::new();
    let mut default = String::new();
    let mut has_default = false;
    let mut required = false;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        match attr.key.as_ref() {
            b"name" => name = value.into_owned(),
            // string literals arrive single-quoted; the executor re-quotes
            b"select" => {
                default = value.trim_matches('\'').to_string();
                has_default = true;
            }
            b"required" => required = value.as_ref() == "yes",
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("xsl:param without a name attribute".to_string());
    }
    // a parameter without a default must be bound by the caller
    Ok(ParamSpec {
        name,
        default,
        required: required || !has_default,
    })
}
