//! Request and response payloads.
//!
//! One request struct per analysis route. Field names follow what the
//! existing web front-end sends, so a few are camelCase.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Gene ontology branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ontology {
    #[default]
    #[serde(rename = "BP")]
    BiologicalProcess,
    #[serde(rename = "CC")]
    CellularComponent,
    #[serde(rename = "MF")]
    MolecularFunction,
}

impl Ontology {
    pub fn code(&self) -> &'static str {
        match self {
            Ontology::BiologicalProcess => "BP",
            Ontology::CellularComponent => "CC",
            Ontology::MolecularFunction => "MF",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeatmapRequest {
    pub csv_path: PathBuf,
    pub width: f64,
    pub height: f64,
    pub top_n_genes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolcanoRequest {
    #[serde(alias = "excel_path")]
    pub csv_path: PathBuf,
    /// Defaults to a name derived from the cutoffs, next to the input.
    #[serde(default)]
    pub output_svg: Option<PathBuf>,
    pub fc_cutoff: f64,
    pub pval_cutoff: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PcaRequest {
    pub csv_path: PathBuf,
    #[serde(default)]
    pub output_svg: Option<PathBuf>,
    #[serde(default = "default_pca_width")]
    pub width: f64,
    #[serde(default = "default_pca_height")]
    pub height: f64,
    #[serde(default = "default_pointshape")]
    pub pointshape: i64,
    #[serde(default = "default_pointsize")]
    pub pointsize: f64,
    #[serde(default = "default_text_size")]
    pub text_size: f64,
}

fn default_pca_width() -> f64 {
    8.0
}

fn default_pca_height() -> f64 {
    6.0
}

fn default_pointshape() -> i64 {
    16
}

fn default_pointsize() -> f64 {
    3.5
}

fn default_text_size() -> f64 {
    4.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct DegRequest {
    pub csv_path: PathBuf,
    /// Comma-separated fold-change cutoffs, e.g. `"1,2"`.
    pub fc_input: String,
    /// Comma-separated p-value cutoffs, e.g. `"0.05"`.
    pub pval_input: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichRequest {
    pub result_root: PathBuf,
    pub output_root: PathBuf,
    #[serde(alias = "showCategory")]
    pub show_category: u32,
    #[serde(alias = "pvalueCutoff")]
    pub pvalue_cutoff: f64,
    pub org_db: String,
    pub plot_width: f64,
    pub plot_height: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GseGoRequest {
    pub file_path: PathBuf,
    pub out_dir: PathBuf,
    pub orgdb: String,
    pub min_gs_size: u32,
    pub max_gs_size: u32,
    pub pvalue_cutoff: f64,
}

/// Request shared by the cnet and emap network plots.
///
/// Combinations are chosen either by name or by matching thresholds
/// against the DEG index file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkPlotRequest {
    pub result_root: PathBuf,
    pub figure_root: PathBuf,
    /// Directory holding `combo_names.csv`; defaults to `result_root`.
    #[serde(default)]
    pub combo_root: Option<PathBuf>,
    #[serde(default)]
    pub fc_threshold: Option<f64>,
    #[serde(default)]
    pub pval_threshold: Option<f64>,
    #[serde(default)]
    pub combo_names: Option<Vec<String>>,
    #[serde(alias = "showCategory", alias = "show_n")]
    pub show_category: u32,
    pub plot_width: f64,
    pub plot_height: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RidgeplotRequest {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GseaplotRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_top_n", alias = "topN")]
    pub top_n: u32,
    #[serde(default = "default_gsea_width")]
    pub width: f64,
    #[serde(default = "default_gsea_height")]
    pub height: f64,
    #[serde(default)]
    pub ont: Ontology,
    #[serde(default = "default_idx")]
    pub idx: u32,
}

fn default_top_n() -> u32 {
    10
}

fn default_gsea_width() -> f64 {
    12.0
}

fn default_gsea_height() -> f64 {
    8.0
}

fn default_idx() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathwayGeneRequest {
    pub edox_dir: PathBuf,
    pub csv_path: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default = "default_top_pathways")]
    pub top_pathways: u32,
    #[serde(default = "default_top_genes")]
    pub top_genes_per_pathway: u32,
    #[serde(default = "default_gsea_width")]
    pub width: f64,
    #[serde(default = "default_pathway_height")]
    pub height: f64,
}

fn default_top_pathways() -> u32 {
    5
}

fn default_top_genes() -> u32 {
    20
}

fn default_pathway_height() -> f64 {
    6.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringNetworkRequest {
    pub input_root: PathBuf,
    pub combo_file: String,
    pub output_dir: PathBuf,
    pub taxon_id: u32,
    pub cutoff: f64,
    pub limit: u32,
}

/// Status body returned by routes that produce no download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}

impl StatusResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stdout: None,
        }
    }

    pub fn with_stdout(mut self, stdout: String) -> Self {
        self.stdout = Some(stdout);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub path: PathBuf,
}
