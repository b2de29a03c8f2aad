//! Typed argument assembly for engine scripts.
//!
//! Every request value becomes one discrete positional argument. Nothing is
//! ever spliced into script text, so the only validation needed is that each
//! value survives the trip through `argv` intact.

use crate::error::{GatewayError, Result};
use std::fmt;
use std::path::Path;

/// Delimiter used when a list travels as a single argument.
pub const LIST_DELIMITER: char = ',';

/// The analysis scripts the gateway knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Heatmap,
    Volcano,
    EnhancedVolcano,
    Pca,
    Deg,
    EnrichGo,
    GseGo,
    Cnetplot,
    Emapplot,
    Ridgeplot,
    GseaplotTotal,
    GseaplotTerm,
    PathwayGene,
    StringNetwork,
}

impl ScriptKind {
    /// All kinds, in route order.
    pub const ALL: [ScriptKind; 14] = [
        ScriptKind::Heatmap,
        ScriptKind::Volcano,
        ScriptKind::EnhancedVolcano,
        ScriptKind::Pca,
        ScriptKind::Deg,
        ScriptKind::EnrichGo,
        ScriptKind::GseGo,
        ScriptKind::Cnetplot,
        ScriptKind::Emapplot,
        ScriptKind::Ridgeplot,
        ScriptKind::GseaplotTotal,
        ScriptKind::GseaplotTerm,
        ScriptKind::PathwayGene,
        ScriptKind::StringNetwork,
    ];

    /// File name of the script under the scripts directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptKind::Heatmap => "run_heatmap.R",
            ScriptKind::Volcano => "run_volcano.R",
            ScriptKind::EnhancedVolcano => "run_enhanced_volcano.R",
            ScriptKind::Pca => "run_pca.R",
            ScriptKind::Deg => "run_deg.R",
            ScriptKind::EnrichGo => "run_enrichgo.R",
            ScriptKind::GseGo => "run_gsego.R",
            ScriptKind::Cnetplot => "run_cnetplot.R",
            ScriptKind::Emapplot => "run_emapplot.R",
            ScriptKind::Ridgeplot => "run_ridgeplot.R",
            ScriptKind::GseaplotTotal => "run_gseaplot_total.R",
            ScriptKind::GseaplotTerm => "run_gseaplot_term.R",
            ScriptKind::PathwayGene => "run_pathway_gene.R",
            ScriptKind::StringNetwork => "run_string.R",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name().trim_end_matches(".R"))
    }
}

/// A fully assembled call: which script, with which arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub kind: ScriptKind,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(kind: ScriptKind) -> Self {
        Self {
            kind,
            args: Vec::new(),
        }
    }

    /// Append a filesystem path.
    pub fn path(self, path: &Path) -> Result<Self> {
        let text = path.to_str().ok_or_else(|| {
            GatewayError::bad_input(format!("Path is not valid UTF-8: {}", path.display()))
        })?;
        self.text(text)
    }

    /// Append a free-form string value.
    pub fn text(mut self, value: &str) -> Result<Self> {
        check_arg(value)?;
        self.args.push(value.to_string());
        Ok(self)
    }

    /// Append a float in its shortest round-trip decimal form.
    pub fn float(mut self, value: f64) -> Result<Self> {
        self.args.push(format_float(value)?);
        Ok(self)
    }

    /// Append an integer.
    pub fn int(mut self, value: i64) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Append a list joined into one delimited argument.
    pub fn list<S: AsRef<str>>(self, values: &[S]) -> Result<Self> {
        let joined = join_list(values)?;
        self.text(&joined)
    }

    /// Append a list of floats joined into one delimited argument.
    pub fn float_list(self, values: &[f64]) -> Result<Self> {
        let formatted = values
            .iter()
            .map(|v| format_float(*v))
            .collect::<Result<Vec<_>>>()?;
        self.list(&formatted)
    }

    /// Append an R package name (loaded by the script with `library()`).
    pub fn package(self, name: &str) -> Result<Self> {
        if !is_package_name(name) {
            return Err(GatewayError::bad_input(format!(
                "Invalid package identifier: {:?}",
                name
            )));
        }
        self.text(name)
    }
}

/// Render a float the way it appears in combination labels.
pub fn format_float(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(GatewayError::bad_input(format!(
            "Numeric parameter must be finite, got {}",
            value
        )));
    }
    Ok(value.to_string())
}

/// Join list values with the delimiter, refusing values that contain it.
pub fn join_list<S: AsRef<str>>(values: &[S]) -> Result<String> {
    if values.is_empty() {
        return Err(GatewayError::bad_input("List parameter must not be empty"));
    }
    for value in values {
        let value = value.as_ref();
        if value.is_empty() {
            return Err(GatewayError::bad_input("List entries must not be empty"));
        }
        if value.contains(LIST_DELIMITER) {
            return Err(GatewayError::bad_input(format!(
                "List entry {:?} must not contain '{}'",
                value, LIST_DELIMITER
            )));
        }
    }
    Ok(values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&LIST_DELIMITER.to_string()))
}

/// Parse a comma-separated list of floats (e.g. `"1, 2,1.5"`).
pub fn parse_float_list(input: &str, field: &str) -> Result<Vec<f64>> {
    let values = input
        .split(LIST_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| GatewayError::bad_input(format!("{}: invalid number {:?}", field, s)))
        })
        .collect::<Result<Vec<_>>>()?;

    if values.is_empty() {
        return Err(GatewayError::bad_input(format!(
            "{}: at least one threshold is required",
            field
        )));
    }
    Ok(values)
}

fn check_arg(value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(GatewayError::bad_input(
            "Parameters must not contain NUL characters",
        ));
    }
    Ok(())
}

fn is_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '.')
}
