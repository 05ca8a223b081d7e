use crate::cli::BuildArgs;
use crate::config::builder::build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use msmpipe::{engine::progress::ProgressReporter, workflows};
use tracing::{info, warn};

pub fn run(args: BuildArgs) -> Result<()> {
    info!("Merging configuration from defaults, file and CLI arguments...");
    let config = build_config(&args)?;
    info!(
        "Pipeline: TICA lag {} dim {}, k-means k={}, MSM lag {}",
        config.tica.lag, config.tica.dim, config.clustering.n_clusters, config.msm.lag
    );
    if !config.flags.save {
        warn!("Saving is disabled; no artifacts will be written.");
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Building MSM from {} trajectory file(s)...",
        config.input.trajectories.len()
    );
    info!("Invoking the core build-model workflow...");
    let result = workflows::build_model::run(&config, &reporter)?;

    println!("------------------------------------------------------------------------");
    println!("MODEL COMPLETE");
    println!("------------------------------------------------------------------------");
    println!("  Trajectories used:   {}", result.trajectories.len());
    println!("  Features:            {}", result.feature_labels.len());
    if let Some(scores) = &result.feature_scores {
        let mean = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
        println!(
            "  Feature VAMP-2:      {:.4} (mean of {} splits)",
            mean,
            scores.len()
        );
    }
    println!(
        "  TICA timescales:     {}",
        format_timescales(&result.tica_timescales)
    );
    println!(
        "  Active states:       {} of {} ({:.1}%)",
        result.model.nstates(),
        result.model.nstates_full(),
        100.0 * result.model.active_state_fraction()
    );
    println!(
        "  MSM timescales:      {}",
        format_timescales(&result.model.timescales())
    );
    if let Some(summary) = &result.model_scores {
        println!(
            "  MSM VAMP-2:          {:.4} +/- {:.4}",
            summary.mean, summary.std
        );
    }
    if !result.artifacts.is_empty() {
        println!(
            "✓ {} artifact(s) written to {}",
            result.artifacts.len(),
            config.input.output_dir.display()
        );
    }

    Ok(())
}

fn format_timescales(timescales: &[f64]) -> String {
    if timescales.is_empty() {
        return "-".to_string();
    }
    timescales
        .iter()
        .take(4)
        .map(|t| {
            if t.is_finite() {
                format!("{:.1}", t)
            } else {
                "inf".to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timescales_are_truncated_and_formatted() {
        let formatted = format_timescales(&[1234.56, 80.0, f64::INFINITY, 3.0, 2.0]);
        assert_eq!(formatted, "1234.6, 80.0, inf, 3.0");
        assert_eq!(format_timescales(&[]), "-");
    }
}
