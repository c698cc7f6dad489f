//! Version selection over tag lists.
//!
//! Three pure operations, all without I/O:
//! - regex filtering and capture-group extraction,
//! - semver range constraints,
//! - reduction of a tag list to its highest version.
//!
//! Tags are parsed leniently: a leading `v` is dropped and missing minor or
//! patch components are taken as zero, so `v1.2` parses as `1.2.0`.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use semver::{Version, VersionReq};

use crate::error::RegistryError;

/// Parses a tag as a semantic version.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidVersion`] if the tag is not a version.
///
/// # Examples
///
/// ```
/// use artifact_mirror_registry::version::parse_version;
///
/// assert_eq!(parse_version("v1.2")?.to_string(), "1.2.0");
/// assert_eq!(parse_version("1.2.3-rc.1")?.to_string(), "1.2.3-rc.1");
/// assert!(parse_version("latest").is_err());
/// # Ok::<(), artifact_mirror_registry::RegistryError>(())
/// ```
pub fn parse_version(tag: &str) -> Result<Version, RegistryError> {
    let invalid = |message: String| RegistryError::InvalidVersion {
        version: tag.to_string(),
        message,
    };

    let trimmed = tag.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid("expected MAJOR[.MINOR[.PATCH]]".to_string()));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| invalid(e.to_string()))
}

/// A semver range such as `>=1.2, <2` or `~1.4 || ^2.0`.
///
/// Alternatives are separated by `||`. Within an alternative, comparators
/// may be separated by commas or whitespace. A bare version means an exact
/// match, `A - B` is the inclusive range `>=A, <=B`, and `!=X` excludes
/// versions from an otherwise matching alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    source: String,
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Alternative {
    range: VersionReq,
    excluded: Vec<VersionReq>,
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        self.range.matches(version) && !self.excluded.iter().any(|req| req.matches(version))
    }
}

impl VersionConstraint {
    /// Parses a constraint.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidVersion`] if any alternative is not
    /// a valid range.
    pub fn parse(input: &str) -> Result<Self, RegistryError> {
        let invalid = |message: String| RegistryError::InvalidVersion {
            version: input.to_string(),
            message,
        };
        let alternatives = input
            .split("||")
            .map(|alternative| -> Result<Alternative, RegistryError> {
                let (range, excluded) = normalize_alternative(alternative);
                Ok(Alternative {
                    range: VersionReq::parse(&range).map_err(|e| invalid(e.to_string()))?,
                    excluded: excluded
                        .iter()
                        .map(|version| exclusion(version).map_err(|e| invalid(e.to_string())))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: input.to_string(),
            alternatives,
        })
    }

    /// Returns true if `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alternative| alternative.matches(version))
    }

    /// Returns the constraint as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for VersionConstraint {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

const OPERATORS: [&str; 8] = [">=", "<=", ">", "<", "=", "~", "^", "!="];

/// Splits an alternative into a `semver` range and the versions it excludes.
fn normalize_alternative(alternative: &str) -> (String, Vec<String>) {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut comparators: Vec<String> = Vec::new();
    let mut excluded: Vec<String> = Vec::new();
    let mut pending_operator = String::new();
    let mut index = 0;
    while index < tokens.len() {
        let token = tokens[index];
        index += 1;
        if OPERATORS.contains(&token) {
            pending_operator = token.to_string();
            continue;
        }
        if pending_operator.is_empty() && tokens.get(index) == Some(&"-") {
            if let Some(upper) = tokens.get(index + 1) {
                comparators.push(normalize_comparator(&format!(">={token}")));
                comparators.push(normalize_comparator(&format!("<={upper}")));
                index += 2;
                continue;
            }
        }
        let combined = format!("{pending_operator}{token}");
        pending_operator.clear();
        match combined.strip_prefix("!=") {
            Some(version) => excluded.push(version.to_string()),
            None => comparators.push(normalize_comparator(&combined)),
        }
    }

    let range = if comparators.is_empty() {
        "*".to_string()
    } else {
        comparators.join(", ")
    };
    (range, excluded)
}

/// Builds the requirement matching an excluded version. Wildcards exclude
/// every version they cover; anything else excludes exactly one version.
fn exclusion(version: &str) -> Result<VersionReq, String> {
    let comparator = normalize_comparator(version);
    if comparator.starts_with('=') {
        let exact = parse_version(version).map_err(|e| e.to_string())?;
        VersionReq::parse(&format!("={exact}")).map_err(|e| e.to_string())
    } else {
        VersionReq::parse(&comparator).map_err(|e| e.to_string())
    }
}

fn normalize_comparator(comparator: &str) -> String {
    let split = comparator
        .find(|c: char| c.is_ascii_alphanumeric() || c == '*')
        .unwrap_or(comparator.len());
    let (operator, version) = comparator.split_at(split);
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    let is_wildcard = version
        .split('.')
        .any(|part| part == "*" || part.eq_ignore_ascii_case("x"));
    if operator.is_empty() && !is_wildcard {
        format!("={version}")
    } else {
        format!("{operator}{version}")
    }
}

/// Keeps the tags matching `filter`. `None` keeps everything.
#[must_use]
pub fn filter_tags(tags: &[String], filter: Option<&Regex>) -> Vec<String> {
    match filter {
        Some(filter) => tags.iter().filter(|t| filter.is_match(t)).cloned().collect(),
        None => tags.to_vec(),
    }
}

/// Extracts the version part of a tag with `regex`.
///
/// Returns `None` when the tag does not match. The first capture group is
/// used when the expression has one, the whole match otherwise. Without an
/// expression the tag itself is returned.
///
/// # Examples
///
/// ```
/// use artifact_mirror_registry::version::extract_version;
/// use regex::Regex;
///
/// let regex = Regex::new(r"^chart-(\d+\.\d+\.\d+)$").unwrap();
/// assert_eq!(extract_version("chart-1.2.3", Some(&regex)).as_deref(), Some("1.2.3"));
/// assert_eq!(extract_version("app-1.2.3", Some(&regex)), None);
/// ```
#[must_use]
pub fn extract_version(tag: &str, regex: Option<&Regex>) -> Option<String> {
    let Some(regex) = regex else {
        return Some(tag.to_string());
    };
    let captures = regex.captures(tag)?;
    let extracted = if captures.len() > 1 {
        captures.get(1).map_or("", |m| m.as_str())
    } else {
        captures.get(0).map_or("", |m| m.as_str())
    };
    if extracted.is_empty() {
        None
    } else {
        Some(extracted.to_string())
    }
}

/// Returns true if `tag` parses and satisfies `constraint`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidVersion`] if `tag` is not a version.
pub fn satisfies(tag: &str, constraint: &VersionConstraint) -> Result<bool, RegistryError> {
    Ok(constraint.matches(&parse_version(tag)?))
}

/// Keeps the tags that parse as versions and satisfy `constraint`,
/// silently discarding the rest.
#[must_use]
pub fn filter_by_constraint(tags: &[String], constraint: &VersionConstraint) -> Vec<String> {
    tags.iter()
        .filter(|tag| satisfies(tag, constraint).unwrap_or(false))
        .cloned()
        .collect()
}

/// Returns the tag with the highest version, as originally written.
///
/// The tag keeps its original spelling, so `v1.10` comes back as `v1.10`
/// rather than the normalised `1.10.0`.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidVersion`] if any tag does not parse;
/// unparsable tags are never skipped here. Returns
/// [`RegistryError::NoTagsFound`] for an empty list.
///
/// # Examples
///
/// ```
/// use artifact_mirror_registry::version::latest;
///
/// let tags = vec!["v1.9.0".to_string(), "v1.10.0".to_string(), "v1.2.0".to_string()];
/// assert_eq!(latest(&tags)?, "v1.10.0");
/// # Ok::<(), artifact_mirror_registry::RegistryError>(())
/// ```
pub fn latest(tags: &[String]) -> Result<String, RegistryError> {
    let mut versions = tags
        .iter()
        .map(|tag| parse_version(tag).map(|version| (version, tag)))
        .collect::<Result<Vec<_>, _>>()?;
    versions.sort_by(|a, b| a.0.cmp(&b.0));
    versions
        .pop()
        .map(|(_, tag)| tag.clone())
        .ok_or_else(|| RegistryError::NoTagsFound {
            repository: String::new(),
            filter: None,
        })
}
