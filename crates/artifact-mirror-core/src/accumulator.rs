//! Identity-keyed artifact accumulator.
//!
//! The accumulator merges artifacts by [`ArtifactKey`] and answers which of
//! an artifact's tags are not yet known. Re-running a reconciliation against
//! unchanged upstream state therefore yields no new tags.

use std::collections::BTreeMap;

use crate::artifact::{Artifact, ArtifactKey};

/// Merges artifacts by identity, unioning their tags.
#[derive(Debug, Clone, Default)]
pub struct ArtifactAccumulator {
    artifacts: BTreeMap<ArtifactKey, Artifact>,
}

impl ArtifactAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact.
    ///
    /// An artifact with an unseen identity is inserted as-is. Otherwise its
    /// tags are appended to the existing entry, skipping tags already
    /// present and keeping first-seen order.
    pub fn add(&mut self, artifact: Artifact) {
        match self.artifacts.get_mut(&artifact.key()) {
            Some(existing) => {
                for tag in artifact.tags() {
                    existing.add_tag(tag.clone());
                }
            }
            None => {
                self.artifacts.insert(artifact.key(), artifact);
            }
        }
    }

    /// Adds every artifact in `artifacts`.
    pub fn add_all(&mut self, artifacts: impl IntoIterator<Item = Artifact>) {
        for artifact in artifacts {
            self.add(artifact);
        }
    }

    /// Returns an artifact holding only the tags of `artifact` that the
    /// accumulator does not already have for its identity.
    ///
    /// Returns `None` when there is nothing new. Tags the accumulator has
    /// but `artifact` lacks do not matter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use artifact_mirror_core::{Artifact, ArtifactAccumulator};
    ///
    /// let mut accumulator = ArtifactAccumulator::new();
    /// accumulator.add(Artifact::new("rancher/app", vec!["v1".into(), "v2".into()])?);
    ///
    /// let known = Artifact::new("rancher/app", vec!["v1".into()])?;
    /// assert!(accumulator.tag_difference(&known).is_none());
    /// # Ok::<(), artifact_mirror_core::Error>(())
    /// ```
    #[must_use]
    pub fn tag_difference(&self, artifact: &Artifact) -> Option<Artifact> {
        let new_tags: Vec<String> = match self.artifacts.get(&artifact.key()) {
            Some(existing) => artifact
                .tags()
                .iter()
                .filter(|tag| !existing.tags().contains(tag))
                .cloned()
                .collect(),
            None => artifact.tags().to_vec(),
        };

        let mut difference = artifact.clone().with_tags(Vec::new());
        for tag in new_tags {
            difference.add_tag(tag);
        }
        if difference.tags().is_empty() {
            None
        } else {
            Some(difference)
        }
    }

    /// Returns true if an artifact with the same identity has been added.
    #[must_use]
    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.artifacts.contains_key(&artifact.key())
    }

    /// Returns the merged artifact for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// Returns the merged artifacts ordered by identity.
    #[must_use]
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.values().cloned().collect()
    }

    /// Returns the number of distinct identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if nothing has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl FromIterator<Artifact> for ArtifactAccumulator {
    fn from_iter<T: IntoIterator<Item = Artifact>>(iter: T) -> Self {
        let mut accumulator = Self::new();
        accumulator.add_all(iter);
        accumulator
    }
}
