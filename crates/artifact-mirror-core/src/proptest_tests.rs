//! Property-based tests for artifact-mirror-core types.
//!
//! These tests use proptest to check the accumulator and fingerprint
//! invariants across many randomly generated inputs.

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::{fingerprint, Artifact, ArtifactAccumulator, DoNotMirror, Repository};

/// Strategy for generating source references with at least two segments.
fn source_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9-]{1,12}/[a-z][a-z0-9-]{1,12}",
        "(quay\\.io|ghcr\\.io|registry\\.k8s\\.io)/[a-z][a-z0-9-]{1,12}/[a-z][a-z0-9-]{1,12}",
    ]
}

/// Strategy for generating tags.
fn tag_strategy() -> impl Strategy<Value = String> {
    "v[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}"
}

fn tags_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(tag_strategy(), 0..8)
}

/// Strategy for generating artifacts.
fn artifact_strategy() -> impl Strategy<Value = Artifact> {
    (source_strategy(), tags_strategy())
        .prop_filter_map("valid source", |(source, tags)| Artifact::new(source, tags).ok())
}

proptest! {
    #[test]
    fn tag_difference_of_subset_is_none(
        source in source_strategy(),
        tags in prop::collection::vec(tag_strategy(), 1..8),
        take in 0usize..8,
    ) {
        let existing = Artifact::new(source.clone(), tags.clone()).unwrap();
        let subset = Artifact::new(source, tags.into_iter().take(take).collect()).unwrap();

        let mut accumulator = ArtifactAccumulator::new();
        accumulator.add(existing);
        prop_assert!(accumulator.tag_difference(&subset).is_none());
    }

    #[test]
    fn add_difference_then_difference_is_none(
        existing in artifact_strategy(),
        extra in tags_strategy(),
    ) {
        let mut incoming_tags = existing.tags().to_vec();
        incoming_tags.extend(extra);
        let incoming = existing.clone().with_tags(incoming_tags);

        let mut accumulator = ArtifactAccumulator::new();
        accumulator.add(existing);
        if let Some(difference) = accumulator.tag_difference(&incoming) {
            prop_assert!(!difference.tags().is_empty());
            accumulator.add(difference);
        }
        prop_assert!(accumulator.tag_difference(&incoming).is_none());
    }

    #[test]
    fn accumulated_tags_are_union_of_inputs(
        source in source_strategy(),
        batches in prop::collection::vec(tags_strategy(), 1..5),
    ) {
        let mut accumulator = ArtifactAccumulator::new();
        let mut expected = BTreeSet::new();
        for tags in batches {
            expected.extend(tags.iter().cloned());
            accumulator.add(Artifact::new(source.clone(), tags).unwrap());
        }

        prop_assert_eq!(accumulator.len(), 1);
        let merged: BTreeSet<String> = accumulator.artifacts()[0].tags().iter().cloned().collect();
        prop_assert_eq!(merged, expected);
    }

    #[test]
    fn fingerprint_ignores_ordering(
        mut artifacts in prop::collection::vec(artifact_strategy(), 1..6),
    ) {
        let expected = fingerprint(&artifacts);
        artifacts.reverse();
        for artifact in &mut artifacts {
            let mut tags = artifact.tags().to_vec();
            tags.reverse();
            *artifact = artifact.clone().with_tags(tags);
        }
        prop_assert_eq!(fingerprint(&artifacts), expected);
    }

    #[test]
    fn fingerprint_has_fixed_length(artifacts in prop::collection::vec(artifact_strategy(), 0..4)) {
        prop_assert_eq!(fingerprint(&artifacts).len(), 8);
    }

    #[test]
    fn all_tags_excluded_yields_no_directives(
        artifact in artifact_strategy(),
        repository_count in 1usize..4,
    ) {
        let artifact = artifact.with_do_not_mirror(DoNotMirror::AllTags);
        let repositories: Vec<Repository> = (0..repository_count)
            .map(|i| Repository::new(format!("registry{i}.example/mirror")).with_default_target(true))
            .collect();
        prop_assert!(artifact.to_sync_directives(&repositories).is_empty());
    }
}
