use crate::experiment::{Param, ParameterConfiguration};
use std::collections::HashSet;

#[test]
fn numbers_compare_across_representations() {
    assert_eq!(Param::Int(1), Param::Float(1.0));
    assert_eq!(Param::Float(0.0), Param::Float(-0.0));
    assert_ne!(Param::Int(1), Param::Float(1.5));
    assert_ne!(Param::from("1"), Param::Int(1));
    assert_ne!(Param::from("a"), Param::from("b"));
}

#[test]
fn equal_values_hash_alike() {
    let values = [
        Param::Int(2),
        Param::Float(2.0),
        Param::from("2"),
        Param::Float(f64::NAN),
        Param::Float(f64::NAN),
    ]
    .into_iter()
    .collect::<HashSet<_>>();

    assert_eq!(values.len(), 3);
    assert!(values.contains(&Param::Float(2.0)));
    assert!(values.contains(&Param::from("2")));
}

#[test]
fn configurations_with_mixed_number_types_are_the_same() {
    let recorded = ParameterConfiguration::new()
        .with("radius", Param::Int(1))
        .with("initial_strategy", "vertices");
    let wanted = ParameterConfiguration::new()
        .with("radius", 1.0)
        .with("initial_strategy", "vertices");

    assert_eq!(recorded, wanted);
    assert_eq!(
        [recorded, wanted].into_iter().collect::<HashSet<_>>().len(),
        1
    );
}
