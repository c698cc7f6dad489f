//! Order-independent change-set fingerprint.

use data_encoding::BASE32;
use sha2::{Digest, Sha256};

use crate::artifact::Artifact;

/// Number of characters kept from the encoded digest.
pub const FINGERPRINT_LEN: usize = 8;

/// Hashes a set of artifacts into a short lowercase identifier.
///
/// Tags are sorted within each artifact and artifacts are sorted by
/// identity before hashing, so neither ordering affects the result.
///
/// # Examples
///
/// ```rust
/// use artifact_mirror_core::{fingerprint, Artifact};
///
/// let a = Artifact::new("rancher/app", vec!["v2".into(), "v1".into()])?;
/// let b = Artifact::new("rancher/app", vec!["v1".into(), "v2".into()])?;
/// assert_eq!(fingerprint(&[a]), fingerprint(&[b]));
/// # Ok::<(), artifact_mirror_core::Error>(())
/// ```
#[must_use]
pub fn fingerprint(artifacts: &[Artifact]) -> String {
    let mut sorted: Vec<Artifact> = artifacts.to_vec();
    for artifact in &mut sorted {
        artifact.sort_tags();
    }
    sorted.sort_by_key(Artifact::key);

    let mut hasher = Sha256::new();
    for artifact in &sorted {
        for reference in artifact.full_references() {
            hasher.update(reference.as_bytes());
        }
    }
    let digest = hasher.finalize();

    let mut encoded = BASE32.encode(&digest).to_lowercase();
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(source: &str, tags: &[&str]) -> Artifact {
        Artifact::new(source, tags.iter().map(ToString::to_string).collect()).unwrap()
    }

    #[test]
    fn test_fingerprint_shape() {
        let hash = fingerprint(&[artifact("library/ubuntu", &["22.04"])]);
        assert_eq!(hash.len(), FINGERPRINT_LEN);
        assert!(hash
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c)));
    }

    #[test]
    fn test_fingerprint_matches_known_digest() {
        // sha256("library/ubuntu:22.04") base32-encoded, lowercased.
        let digest = Sha256::digest(b"library/ubuntu:22.04");
        let expected = BASE32.encode(&digest).to_lowercase()[..8].to_string();
        assert_eq!(
            fingerprint(&[artifact("library/ubuntu", &["22.04"])]),
            expected
        );
    }

    #[test]
    fn test_fingerprint_ignores_artifact_order() {
        let a = artifact("rancher/a", &["v1"]);
        let b = artifact("rancher/b", &["v1"]);
        assert_eq!(
            fingerprint(&[a.clone(), b.clone()]),
            fingerprint(&[b, a])
        );
    }

    #[test]
    fn test_fingerprint_ignores_tag_order() {
        assert_eq!(
            fingerprint(&[artifact("rancher/a", &["x", "y"])]),
            fingerprint(&[artifact("rancher/a", &["y", "x"])])
        );
    }

    #[test]
    fn test_fingerprint_changes_with_tags() {
        assert_ne!(
            fingerprint(&[artifact("rancher/a", &["a", "b"])]),
            fingerprint(&[artifact("rancher/a", &["a", "b", "c"])])
        );
    }
}
