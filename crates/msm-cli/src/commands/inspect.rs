use crate::cli::InspectArgs;
use crate::error::Result;
use msmpipe::core::msm::model::MarkovStateModel;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
struct StateRecord {
    state: usize,
    probability: f64,
}

pub fn run(args: InspectArgs) -> Result<()> {
    info!("Loading model from {:?}", &args.model);
    let model = MarkovStateModel::load(&args.model)?;

    println!("Model:           {}", args.model.display());
    println!(
        "Lag:             {} steps ({})",
        model.lag(),
        if model.is_reversible() {
            "reversible"
        } else {
            "non-reversible"
        }
    );
    println!(
        "Active states:   {} of {} ({:.1}%)",
        model.nstates(),
        model.nstates_full(),
        100.0 * model.active_state_fraction()
    );

    println!("Slowest implied timescales:");
    for (i, t) in model.timescales().iter().take(args.top).enumerate() {
        println!("  t{:<3} {:>12.2}", i + 2, t);
    }

    println!("Most populated states:");
    for (state, probability) in model.most_populated(args.top) {
        println!("  state {:<5} pi = {:.5}", state, probability);
    }

    if let Some(path) = &args.export_csv {
        let rows = export_stationary_distribution(&model, path)?;
        println!("✓ Wrote {} states to {}", rows, path.display());
    }

    Ok(())
}

fn export_stationary_distribution(model: &MarkovStateModel, path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for (&state, &probability) in model
        .active_set()
        .iter()
        .zip(model.stationary_distribution())
    {
        writer.serialize(StateRecord { state, probability })?;
    }
    writer.flush()?;
    Ok(model.nstates())
}
