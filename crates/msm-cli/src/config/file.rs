use crate::error::{CliError, Result};
use msmpipe::core::decomposition::Scaling;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileInputConfig {
    #[serde(rename = "data-dir")]
    pub data_dir: Option<PathBuf>,
    #[serde(rename = "output-dir")]
    pub output_dir: Option<PathBuf>,
    pub structure: Option<PathBuf>,
    pub trajectories: Option<Vec<PathBuf>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunConfig {
    pub save: Option<bool>,
    pub bootstrap: Option<bool>,
    pub quick: Option<bool>,
    pub score_features: Option<bool>,
    pub score_model: Option<bool>,
    pub bootstrap_fraction: Option<f64>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileFeatureConfig {
    pub excluded_neighbors: Option<usize>,
    pub periodic: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileTicaConfig {
    pub lag: Option<usize>,
    pub dim: Option<usize>,
    pub scaling: Option<Scaling>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileClusteringConfig {
    pub n_clusters: Option<usize>,
    pub max_iter: Option<usize>,
    pub tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileMsmConfig {
    pub lag: Option<usize>,
    pub reversible: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileFeatureScoringConfig {
    pub n_splits: Option<usize>,
    pub validation_fraction: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileModelScoringConfig {
    pub n_splits: Option<usize>,
    pub score_k: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub input: Option<FileInputConfig>,
    pub run: Option<FileRunConfig>,
    pub features: Option<FileFeatureConfig>,
    pub tica: Option<FileTicaConfig>,
    pub clustering: Option<FileClusteringConfig>,
    pub msm: Option<FileMsmConfig>,
    pub feature_scoring: Option<FileFeatureScoringConfig>,
    pub model_scoring: Option<FileModelScoringConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn parses_every_section() {
        let file = write_config(
            r#"
            [input]
            data-dir = "../.data"
            structure = "xtc_atoms.gro"
            trajectories = ["a.gro", "b.gro"]

            [run]
            save = false
            score-features = true
            seed = 42

            [features]
            excluded-neighbors = 3

            [tica]
            lag = 50
            dim = 3
            scaling = "km"

            [clustering]
            n-clusters = 20
            max-iter = 30

            [msm]
            lag = 10
            reversible = false

            [feature-scoring]
            n-splits = 4
            validation-fraction = 0.25

            [model-scoring]
            score-k = 5
            "#,
        );

        let config = FileConfig::from_file(file.path()).unwrap();
        let input = config.input.unwrap();
        assert_eq!(input.data_dir, Some(PathBuf::from("../.data")));
        assert_eq!(input.trajectories.unwrap().len(), 2);
        let run = config.run.unwrap();
        assert_eq!(run.save, Some(false));
        assert_eq!(run.score_features, Some(true));
        assert_eq!(run.seed, Some(42));
        assert_eq!(config.features.unwrap().excluded_neighbors, Some(3));
        let tica = config.tica.unwrap();
        assert_eq!(tica.scaling, Some(Scaling::KineticMap));
        assert_eq!(tica.dim, Some(3));
        assert_eq!(config.clustering.unwrap().n_clusters, Some(20));
        assert_eq!(config.msm.unwrap().reversible, Some(false));
        assert_eq!(config.feature_scoring.unwrap().validation_fraction, Some(0.25));
        assert_eq!(config.model_scoring.unwrap().score_k, Some(5));
    }

    #[test]
    fn empty_file_yields_empty_config() {
        let file = write_config("");
        let config = FileConfig::from_file(file.path()).unwrap();
        assert!(config.input.is_none());
        assert!(config.tica.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[tica]\nlagtime = 100\n");
        let result = FileConfig::from_file(file.path());
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = FileConfig::from_file(Path::new("/nonexistent/msm-config.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
