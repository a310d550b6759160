use std::collections::HashSet;
use std::io::Write;

use rand::rngs::StdRng;
use rand::SeedableRng;

use ppi_model::dataset::{
    build_pair_dataset, load_positive_pairs, stratified_split, unique_identifiers,
    InteractionPair, Label,
};
use ppi_model::error::PpiError;

fn canonical(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

#[test]
fn negatives_avoid_positives_in_both_orientations() {
    let positives = vec![
        InteractionPair::positive("P1", "P2"),
        InteractionPair::positive("P2", "P3"),
        InteractionPair::positive("P4", "P5"),
        InteractionPair::positive("P5", "P6"),
    ];
    let universe = unique_identifiers(&positives);
    assert_eq!(universe.len(), 6);

    let mut rng = StdRng::seed_from_u64(42);
    let dataset = build_pair_dataset(&positives, 1.0, &universe, &mut rng).unwrap();

    let negatives: Vec<&InteractionPair> = dataset
        .iter()
        .filter(|p| p.label == Label::Negative)
        .collect();
    assert_eq!(negatives.len(), 4);

    let positive_keys: HashSet<(String, String)> = positives
        .iter()
        .map(|p| canonical(&p.protein_a, &p.protein_b))
        .collect();
    let mut negative_keys = HashSet::new();
    for pair in &negatives {
        assert_ne!(pair.protein_a, pair.protein_b, "no self-pairs");
        let key = canonical(&pair.protein_a, &pair.protein_b);
        assert!(
            !positive_keys.contains(&key),
            "negative {:?} collides with a positive",
            key
        );
        assert!(negative_keys.insert(key), "duplicate negative emitted");
        assert!(pair.interaction_type.is_none());
    }
}

#[test]
fn exhausted_negative_space_fails() {
    // With two identifiers the only candidate pair is the positive itself.
    let positives = vec![InteractionPair::positive("P1", "P2")];
    let universe = unique_identifiers(&positives);
    let mut rng = StdRng::seed_from_u64(1);

    let err = build_pair_dataset(&positives, 1.0, &universe, &mut rng).unwrap_err();
    assert!(matches!(
        err,
        PpiError::InsufficientNegativeSpace { requested: 1, .. }
    ));
}

#[test]
fn zero_ratio_yields_positives_only() {
    let positives = vec![InteractionPair::positive("P1", "P2")];
    let universe = unique_identifiers(&positives);
    let mut rng = StdRng::seed_from_u64(1);

    let dataset = build_pair_dataset(&positives, 0.0, &universe, &mut rng).unwrap();
    assert_eq!(dataset.len(), 1);
    assert!(dataset.iter().all(|p| p.label == Label::Positive));
}

#[test]
fn stratified_split_preserves_class_ratio() {
    let mut items: Vec<(usize, bool)> = Vec::new();
    for i in 0..80 {
        items.push((i, true));
    }
    for i in 80..160 {
        items.push((i, false));
    }

    let mut rng = StdRng::seed_from_u64(9);
    let (train, validation) = stratified_split(items, |item| item.1, 0.25, &mut rng);

    assert_eq!(train.len(), 120);
    assert_eq!(validation.len(), 40);
    assert_eq!(validation.iter().filter(|i| i.1).count(), 20);
    assert_eq!(train.iter().filter(|i| i.1).count(), 60);
}

#[test]
fn stratified_split_is_a_partition() {
    let items: Vec<usize> = (0..31).collect();
    let mut rng = StdRng::seed_from_u64(3);
    let (train, validation) = stratified_split(items, |i| i % 2 == 0, 0.2, &mut rng);

    let mut all: Vec<usize> = train.into_iter().chain(validation).collect();
    all.sort_unstable();
    assert_eq!(all, (0..31).collect::<Vec<_>>());
}

#[test]
fn loads_positive_pairs_from_tsv() {
    let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
    writeln!(file, "Uniprot_A\tUniprot_B\tInteraction_Type").unwrap();
    writeln!(file, "P1\tP2\tbinding").unwrap();
    writeln!(file, "P3\tP4\t").unwrap();
    file.flush().unwrap();

    let pairs = load_positive_pairs(file.path()).unwrap();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].protein_a, "P1");
    assert_eq!(pairs[0].interaction_type.as_deref(), Some("binding"));
    assert_eq!(pairs[1].interaction_type, None);
    assert!(pairs.iter().all(|p| p.label == Label::Positive));
}

#[test]
fn loads_positive_pairs_from_csv() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "protein_a,protein_b").unwrap();
    writeln!(file, "P1,P2").unwrap();
    file.flush().unwrap();

    let pairs = load_positive_pairs(file.path()).unwrap();
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].protein_b, "P2");
}
