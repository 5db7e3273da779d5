//! Pipeline Definition Integration Tests
//!
//! The shipped YAML definition must load, validate, and match the
//! built-in sequence.

use std::path::Path;

use newsreel::core::{Pipeline, Runner, StageCategory};

fn shipped_yaml() -> Pipeline {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("pipelines/shorts.yaml");
    Pipeline::from_file(&path).unwrap()
}

#[test]
fn test_shipped_definition_loads_and_validates() {
    let pipeline = shipped_yaml();
    assert!(pipeline.validate().is_ok());
    assert_eq!(pipeline.name, "shorts");
    assert_eq!(pipeline.stages.len(), 5);
}

#[test]
fn test_shipped_definition_matches_builtin() {
    let yaml = shipped_yaml();
    let builtin = Pipeline::shorts();

    let names: Vec<_> = yaml.stages.iter().map(|s| s.name.as_str()).collect();
    let builtin_names: Vec<_> = builtin.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, builtin_names);

    for (a, b) in yaml.stages.iter().zip(builtin.stages.iter()) {
        assert_eq!(a.category, b.category, "category mismatch in '{}'", a.name);
        assert_eq!(a.inputs, b.inputs, "input mismatch in '{}'", a.name);
        let a_outputs: Vec<_> = a.outputs.iter().map(|o| o.name.as_str()).collect();
        let b_outputs: Vec<_> = b.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(a_outputs, b_outputs, "output mismatch in '{}'", a.name);
    }
}

#[test]
fn test_exit_code_map() {
    let pipeline = Pipeline::shorts();
    let code = |name: &str| pipeline.get_stage(name).unwrap().category.exit_code();

    assert_eq!(code("news"), 1);
    assert_eq!(code("images"), 1);
    assert_eq!(code("video"), 1);
    assert_eq!(code("narrate"), 2);
    assert_eq!(code("publish"), 3);
}

#[test]
fn test_imagery_stage_fans_out() {
    let pipeline = Pipeline::shorts();
    match &pipeline.get_stage("images").unwrap().runner {
        Runner::FanOut { workers, args, .. } => {
            assert!(*workers > 1);
            assert!(args.iter().any(|a| a.contains("{index}")));
        }
        other => panic!("images stage should fan out, got {other:?}"),
    }
    assert_eq!(
        pipeline.get_stage("images").unwrap().category,
        StageCategory::Text
    );
}

#[test]
fn test_narrate_stage_declares_scratch() {
    let pipeline = Pipeline::shorts();
    let narrate = pipeline.get_stage("narrate").unwrap();
    assert!(!narrate.scratch.is_empty());
    // Final output is a declared artifact, never scratch
    for scratch in &narrate.scratch {
        for output in &narrate.outputs {
            assert_ne!(scratch, &output.path);
        }
    }
}
