use anyhow::Context;
use meta_models::meta_models::{FfnnConfig, FfnnMetaModel};
use meta_models::{AnyMetaModel, MetaModelGraph, RandomSearchTuner, TunerConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let model = match std::env::args().nth(1) {
        Some(path) => AnyMetaModel::load(&path).with_context(|| format!("loading meta-model from {path}"))?,
        None => FfnnMetaModel::new(FfnnConfig::default().with_input_shape(8).with_blocks(2).with_units(0, 16)).into(),
    };
    let mut meta_model = MetaModelGraph::new(model)?;

    let space = meta_model.space()?;
    println!("{}", serde_json::to_string_pretty(&space)?);

    // Smallest architecture wins.
    let tuner = RandomSearchTuner::new(TunerConfig::default().with_trials(5))?;
    let study = tuner.tune(&mut meta_model, |model, _| model.parameter_count() as f64)?;

    if let Some(assignment) = study.best_assignment() {
        let model = meta_model.build(assignment)?;
        println!("{}", model.summary());
    }
    Ok(())
}
