use meta_models::meta_models::{CnnConfig, CnnMetaModel, FfnnConfig, FfnnMetaModel, MmnnMetaModel};
use meta_models::{AnyMetaModel, MetaModelError, MetaModelGraph, sample_space};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn multi_modal() -> AnyMetaModel {
    let vectors = FfnnMetaModel::new(
        FfnnConfig::default()
            .with_input_shape(12)
            .with_input_name("vectors")
            .with_blocks(2)
            .headless(),
    );
    let sequences = CnnMetaModel::new(
        CnnConfig::for_rank(1)
            .with_input_shape(vec![100, 4])
            .with_input_name("sequences")
            .with_blocks(2)
            .with_top(FfnnConfig::default().with_blocks(1).headless()),
    );
    MmnnMetaModel::new(vec![vectors.into(), sequences.into()], FfnnMetaModel::new(FfnnConfig::default().with_blocks(1))).into()
}

#[test]
fn meta_model_round_trips_through_a_file() {
    let mut meta_model = MetaModelGraph::new(multi_modal()).unwrap();
    let space = meta_model.space().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mmnn.json");
    meta_model.save(&path).unwrap();
    let mut restored: MetaModelGraph = MetaModelGraph::load(&path).unwrap();

    assert_eq!(restored.space().unwrap(), space);
    assert_eq!(restored.inputs(), meta_model.inputs());
    for id in restored.graph().ids() {
        assert!(restored.graph().node(id).unwrap().rendered().is_some());
        assert!(!restored.graph().is_built(id));
    }

    let assignment = sample_space(&space, &mut StdRng::seed_from_u64(3)).unwrap();
    let original = meta_model.build(&assignment).unwrap();
    let rebuilt = restored.build(&assignment).unwrap();
    assert_eq!(original.summary(), rebuilt.summary());
}

#[test]
fn meta_model_description_loads_from_json() {
    let json = serde_json::to_string(&multi_modal()).unwrap();
    assert!(json.contains(r#""type":"mmnn""#));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    std::fs::write(&path, &json).unwrap();
    let model = AnyMetaModel::load(&path).unwrap();
    assert_eq!(model, multi_modal());
    assert_eq!(AnyMetaModel::from_json(&json).unwrap(), model);
}

#[test]
fn invalid_description_is_rejected_on_load() {
    let broken = FfnnMetaModel::new(FfnnConfig::default().with_input_shape(8).with_units(32, 16));
    let json = serde_json::to_string(&AnyMetaModel::from(broken)).unwrap();
    assert!(matches!(
        AnyMetaModel::from_json(&json),
        Err(MetaModelError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        AnyMetaModel::from_json("{\"type\": \"rnn\"}"),
        Err(MetaModelError::Serialization(_))
    ));
}

#[test]
fn saved_graph_with_broken_bounds_is_rejected() {
    let meta_model = MetaModelGraph::new(FfnnMetaModel::new(FfnnConfig::default().with_input_shape(8))).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&meta_model.to_json().unwrap()).unwrap();
    assert!(MetaModelGraph::<AnyMetaModel>::from_json(&saved.to_string()).is_ok());

    let mut broken_model = saved.clone();
    *broken_model.pointer_mut("/model/config/block/dense/units/min").unwrap() = 1000.into();
    assert!(matches!(
        MetaModelGraph::<AnyMetaModel>::from_json(&broken_model.to_string()),
        Err(MetaModelError::InvalidConfiguration { .. })
    ));

    let mut broken_layer = saved;
    *broken_layer.pointer_mut("/graph/nodes/1/layer/DenseRectangular/dense/units/min").unwrap() = 1000.into();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, broken_layer.to_string()).unwrap();
    assert!(matches!(
        MetaModelGraph::<AnyMetaModel>::load(&path),
        Err(MetaModelError::InvalidConfiguration { .. })
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        AnyMetaModel::load(dir.path().join("absent.json")),
        Err(MetaModelError::Io(_))
    ));
}
