use super::error::EngineError;
use crate::core::clustering::Discretization;
use crate::core::io::arrays::{ArrayIoError, write_npy, write_npz};
use crate::core::msm::model::MarkovStateModel;
use crate::core::msm::scoring::ScoreSummary;
use ndarray::{Array1, Array2};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FEATURES_FILE: &str = "featurized_data.npz";
pub const FEATURE_SCORES_FILE: &str = "feature_scores.npy";
pub const TICA_OUTPUT_FILE: &str = "tica_getoutput.npz";
pub const KMEANS_OUTPUT_FILE: &str = "kmeans_getoutput.npz";
pub const KMEANS_DTRAJS_FILE: &str = "kmeans_dtrajs.npz";
pub const KMEANS_CENTERS_FILE: &str = "kmeans_centers.npy";
pub const MODEL_FILE: &str = "msm.toml";
pub const MODEL_SCORES_FILE: &str = "msm_scores.npy";

/// Writes run artifacts under fixed names in the output directory.
///
/// A disabled store accepts every call and touches nothing on disk. The output
/// directory is created on the first write. Existing files are overwritten.
#[derive(Debug)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    enabled: bool,
    written: Vec<PathBuf>,
}

impl ArtifactStore {
    pub fn new(output_dir: &Path, enabled: bool) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            enabled,
            written: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Paths written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }

    fn write(
        &mut self,
        name: &str,
        writer: impl FnOnce(&Path) -> Result<(), ArrayIoError>,
    ) -> Result<(), EngineError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.prepare(name)?;
        writer(&path).map_err(|source| EngineError::Artifact {
            path: path.clone(),
            source,
        })?;
        self.record(path);
        Ok(())
    }

    fn prepare(&self, name: &str) -> Result<PathBuf, EngineError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| EngineError::OutputDirectory {
            path: self.output_dir.clone(),
            source,
        })?;
        Ok(self.output_dir.join(name))
    }

    fn record(&mut self, path: PathBuf) {
        debug!("Wrote {}", path.display());
        self.written.push(path);
    }

    pub fn save_features(&mut self, features: &[Array2<f64>]) -> Result<(), EngineError> {
        self.write(FEATURES_FILE, |path| write_npz(path, features))
    }

    pub fn save_feature_scores(&mut self, scores: &[f64]) -> Result<(), EngineError> {
        let array = Array1::from_vec(scores.to_vec());
        self.write(FEATURE_SCORES_FILE, |path| write_npy(path, &array))
    }

    pub fn save_tica_output(&mut self, output: &[Array2<f64>]) -> Result<(), EngineError> {
        self.write(TICA_OUTPUT_FILE, |path| write_npz(path, output))
    }

    /// Writes the per-frame assignments, the discrete trajectories and the centers.
    pub fn save_discretization(&mut self, discretization: &Discretization) -> Result<(), EngineError> {
        let columns = discretization.assignment_columns();
        self.write(KMEANS_OUTPUT_FILE, |path| write_npz(path, &columns))?;
        let sequences = discretization.state_sequences();
        self.write(KMEANS_DTRAJS_FILE, |path| write_npz(path, &sequences))?;
        self.write(KMEANS_CENTERS_FILE, |path| {
            write_npy(path, &discretization.centers)
        })
    }

    pub fn save_model(&mut self, model: &MarkovStateModel) -> Result<(), EngineError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.prepare(MODEL_FILE)?;
        model.save(&path)?;
        self.record(path);
        Ok(())
    }

    /// Writes `[[mean], [std]]` of the model scores.
    pub fn save_model_scores(&mut self, summary: &ScoreSummary) -> Result<(), EngineError> {
        let array = summary.to_array();
        self.write(MODEL_SCORES_FILE, |path| write_npy(path, &array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn disabled_store_writes_nothing() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out");
        let mut store = ArtifactStore::new(&output, false);

        store.save_features(&[Array2::zeros((3, 2))]).unwrap();
        store.save_feature_scores(&[1.0, 2.0]).unwrap();
        assert!(store.written().is_empty());
        assert!(!output.exists());
    }

    #[test]
    fn enabled_store_creates_directory_and_fixed_names() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("nested").join("out");
        let mut store = ArtifactStore::new(&output, true);

        store.save_features(&[Array2::zeros((3, 2))]).unwrap();
        store
            .save_model_scores(&ScoreSummary { mean: 1.5, std: 0.1 })
            .unwrap();
        assert_eq!(
            store.written(),
            &[output.join(FEATURES_FILE), output.join(MODEL_SCORES_FILE)]
        );
        assert!(output.join(FEATURES_FILE).is_file());
    }

    #[test]
    fn discretization_writes_three_artifacts() {
        let dir = tempdir().unwrap();
        let mut store = ArtifactStore::new(dir.path(), true);
        let discretization = Discretization {
            dtrajs: vec![vec![0, 1, 1], vec![1, 0]],
            centers: Array2::zeros((2, 4)),
        };
        store.save_discretization(&discretization).unwrap();
        let names: Vec<_> = store
            .written()
            .iter()
            .filter_map(|p| p.file_name())
            .collect();
        assert_eq!(
            names,
            vec![KMEANS_OUTPUT_FILE, KMEANS_DTRAJS_FILE, KMEANS_CENTERS_FILE]
        );
    }
}
