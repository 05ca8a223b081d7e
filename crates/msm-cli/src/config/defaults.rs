use msmpipe::core::decomposition::Scaling;

/// Parameters of the reference analysis: CA distances, four kinetic-map TICA
/// components at lag 100, fifty k-means states and an MSM at lag 200.
pub struct DefaultsConfig {
    pub data_dir: String,
    pub output_dir: String,
    pub excluded_neighbors: usize,
    pub periodic: bool,
    pub tica_lag: usize,
    pub tica_dim: usize,
    pub tica_scaling: Scaling,
    pub n_clusters: usize,
    pub max_iter: usize,
    pub kmeans_tolerance: f64,
    pub msm_lag: usize,
    pub reversible: bool,
    pub feature_score_splits: usize,
    pub validation_fraction: f64,
    pub model_score_splits: usize,
    pub score_k: usize,
    pub bootstrap_fraction: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: ".".to_string(),
            output_dir: ".".to_string(),
            excluded_neighbors: 2,
            periodic: true,
            tica_lag: 100,
            tica_dim: 4,
            tica_scaling: Scaling::KineticMap,
            n_clusters: 50,
            max_iter: 100,
            kmeans_tolerance: 1e-5,
            msm_lag: 200,
            reversible: true,
            feature_score_splits: 10,
            validation_fraction: 0.5,
            model_score_splits: 2,
            score_k: 10,
            bootstrap_fraction: 0.5,
        }
    }
}
