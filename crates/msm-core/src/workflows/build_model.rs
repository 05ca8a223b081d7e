use crate::core::clustering::Discretization;
use crate::core::clustering::kmeans::KMeans;
use crate::core::decomposition::Transform;
use crate::core::decomposition::tica::Tica;
use crate::core::decomposition::vamp::{Vamp, score_feature_splits};
use crate::core::features::Featurizer;
use crate::core::features::distances::CaDistanceFeaturizer;
use crate::core::io::{read_structure, read_trajectory};
use crate::core::models::trajectory::Trajectory;
use crate::core::msm::estimation::MsmEstimator;
use crate::core::msm::model::MarkovStateModel;
use crate::core::msm::scoring::{ScoreSummary, cross_validate};
use crate::engine::config::PipelineConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::selection::TrajectorySet;
use crate::engine::store::ArtifactStore;
use ndarray::Array2;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Trajectories that took part in the run, after selection.
    pub trajectories: Vec<PathBuf>,
    pub feature_labels: Vec<String>,
    pub feature_scores: Option<Vec<f64>>,
    pub tica_output: Vec<Array2<f64>>,
    pub tica_timescales: Vec<f64>,
    pub discretization: Discretization,
    pub model: MarkovStateModel,
    pub model_scores: Option<ScoreSummary>,
    /// Artifacts written to disk, empty when saving is disabled.
    pub artifacts: Vec<PathBuf>,
}

#[instrument(skip_all, name = "build_model_workflow")]
pub fn run(config: &PipelineConfig, reporter: &ProgressReporter) -> Result<PipelineResult, EngineError> {
    let mut rng = config.rng();
    let mut store = ArtifactStore::new(&config.input.output_dir, config.flags.save);

    // === Phase 1: Loading ===
    reporter.report(Progress::PhaseStart { name: "Loading" });
    let selection = TrajectorySet::select(
        &config.input,
        &config.flags,
        config.bootstrap_fraction,
        &mut rng,
    );
    let (featurizer, trajectories) = load_inputs(config, &selection, reporter)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Featurization ===
    reporter.report(Progress::PhaseStart {
        name: "Featurization",
    });
    let features = featurizer.featurize_all(&trajectories)?;
    drop(trajectories);
    info!(
        "Featurized {} trajectories into {} C-alpha distances",
        features.len(),
        featurizer.dimension()
    );
    store.save_features(&features)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Feature scoring (optional) ===
    let feature_scores = if config.flags.score_features {
        let scores = score_features(config, &features, &mut rng, reporter)?;
        store.save_feature_scores(&scores)?;
        Some(scores)
    } else {
        None
    };

    // === Phase 4: TICA ===
    reporter.report(Progress::PhaseStart { name: "TICA" });
    let tica = Tica::new(config.tica.lag, config.tica.dim)
        .with_scaling(config.tica.scaling)
        .estimate(&features)?;
    let tica_output = tica.transform_all(&features)?;
    drop(features);
    store.save_tica_output(&tica_output)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 5: Clustering ===
    reporter.report(Progress::PhaseStart { name: "Clustering" });
    let mut kmeans = KMeans::new(config.clustering.n_clusters, config.clustering.max_iter);
    kmeans.tolerance = config.clustering.tolerance;
    let clusters = kmeans.fit(&tica_output, &mut rng)?;
    let discretization = clusters.discretize(&tica_output)?;
    store.save_discretization(&discretization)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 6: MSM estimation ===
    reporter.report(Progress::PhaseStart {
        name: "MSM Estimation",
    });
    let estimator = MsmEstimator::new(config.msm.lag).with_reversible(config.msm.reversible);
    let model = estimator.estimate(&discretization.dtrajs)?;
    store.save_model(&model)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 7: Model scoring (optional) ===
    let model_scores = if config.flags.score_model {
        reporter.report(Progress::PhaseStart {
            name: "Model Scoring",
        });
        let (scores, summary) = reporter.task(config.model_scoring.n_splits, || {
            cross_validate(
                &estimator,
                &discretization.dtrajs,
                config.model_scoring.n_splits,
                config.model_scoring.score_k,
                &mut rng,
            )
        })?;
        debug!("Model scores per split: {:?}", scores);
        info!(
            "MSM VAMP-2 score {:.4} +/- {:.4} over {} splits",
            summary.mean, summary.std, config.model_scoring.n_splits
        );
        store.save_model_scores(&summary)?;
        reporter.report(Progress::PhaseFinish);
        Some(summary)
    } else {
        None
    };

    for path in store.written() {
        reporter.report(Progress::ArtifactWritten(path.clone()));
    }
    info!(
        "Workflow complete: {} active states, {} artifacts written.",
        model.nstates(),
        store.written().len()
    );

    Ok(PipelineResult {
        trajectories: selection.trajectories().to_vec(),
        feature_labels: featurizer.describe(),
        feature_scores,
        tica_timescales: tica.timescales(),
        tica_output,
        discretization,
        model,
        model_scores,
        artifacts: store.into_written(),
    })
}

fn load_inputs(
    config: &PipelineConfig,
    selection: &TrajectorySet,
    reporter: &ProgressReporter,
) -> Result<(CaDistanceFeaturizer, Vec<Trajectory>), EngineError> {
    let topology = read_structure(selection.structure())?;
    let featurizer = CaDistanceFeaturizer::new(
        &topology,
        config.features.excluded_neighbors,
        config.features.periodic,
    )?;

    let trajectories = reporter.task(selection.len(), || {
        selection
            .trajectories()
            .par_iter()
            .map(|path| {
                let trajectory = read_trajectory(path, &topology);
                reporter.report(Progress::TaskIncrement);
                trajectory
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let n_frames: usize = trajectories.iter().map(Trajectory::n_frames).sum();
    info!(
        "Loaded {} trajectories ({} frames, {} atoms)",
        trajectories.len(),
        n_frames,
        topology.n_atoms()
    );
    Ok((featurizer, trajectories))
}

fn score_features(
    config: &PipelineConfig,
    features: &[Array2<f64>],
    rng: &mut StdRng,
    reporter: &ProgressReporter,
) -> Result<Vec<f64>, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Feature Scoring",
    });
    let estimator = Vamp::new(config.tica.lag, config.tica.dim).with_scaling(config.tica.scaling);
    let scores = reporter.task(config.feature_scoring.n_splits, || {
        score_feature_splits(
            &estimator,
            features,
            config.feature_scoring.n_splits,
            config.feature_scoring.validation_fraction,
            rng,
            |_, _| reporter.report(Progress::TaskIncrement),
        )
    })?;
    reporter.report(Progress::PhaseFinish);
    Ok(scores)
}
