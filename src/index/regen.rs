// ABOUTME: Regeneration Detector: decides whether a stored index is stale
// ABOUTME: Structural failures short-circuit; mismatch checks past that point accumulate every reason

use std::path::Path;

use crate::config::resolver::ConfigFingerprints;
use crate::constants::INDEX_FORMAT_VERSION;

use super::model::{BuildMetadata, EmbeddingProviderTag};

/// The build flags a caller wants the stored index to match.
#[derive(Debug, Clone)]
pub struct DesiredBuildFlags {
    /// The CLI's own version, compared against the version that produced the index.
    pub gateway_version: String,
    /// Embedding provider the caller wants, or `None` for a lexical-only index.
    pub embedding_provider: Option<EmbeddingProviderTag>,
    /// Server names the caller wants excluded.
    pub excluded_servers: Vec<String>,
}

/// The result of checking a stored index against desired flags and current
/// config fingerprints.
#[derive(Debug, Clone)]
pub struct RegenerationDecision {
    /// Whether the index should be rebuilt.
    pub should_regenerate: bool,
    /// Ordered, human-readable reasons; the first is the one that decided it.
    pub reasons: Vec<String>,
}

impl RegenerationDecision {
    fn regenerate(reason: impl Into<String>) -> Self {
        Self {
            should_regenerate: true,
            reasons: vec![reason.into()],
        }
    }

    fn regenerate_all(reasons: Vec<String>) -> Self {
        Self {
            should_regenerate: true,
            reasons,
        }
    }

    fn fresh() -> Self {
        Self {
            should_regenerate: false,
            reasons: vec!["up to date".to_owned()],
        }
    }
}

/// Decide whether the index at `path` needs rebuilding, given the flags the
/// caller wants and the config fingerprints at the moment of the check.
///
/// Missing file, corrupt JSON, absent build metadata, and unparseable build
/// metadata each short-circuit with a single reason, since none leaves enough
/// to compare further. Past that point every applicable mismatch — format
/// version, gateway version, build-flag, and per-scope fingerprint drift — is
/// collected, so `reasons` names everything that changed, not just the first.
#[must_use]
pub fn check(
    path: &Path,
    desired: &DesiredBuildFlags,
    current_fingerprints: &ConfigFingerprints,
) -> RegenerationDecision {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return RegenerationDecision::regenerate("index file is missing"),
    };

    let raw: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return RegenerationDecision::regenerate("index file is not valid JSON"),
    };

    let Some(metadata_value) = raw.get("metadata") else {
        return RegenerationDecision::regenerate("index file has no build metadata");
    };

    let metadata: BuildMetadata = match serde_json::from_value(metadata_value.clone()) {
        Ok(metadata) => metadata,
        Err(_) => return RegenerationDecision::regenerate("build metadata is unparseable"),
    };

    let mut reasons = Vec::new();

    if major_version(&metadata.format_version) != major_version(INDEX_FORMAT_VERSION) {
        reasons.push(format!(
            "index format version {} is incompatible with {INDEX_FORMAT_VERSION}",
            metadata.format_version
        ));
    }

    if metadata.gateway_version != desired.gateway_version {
        reasons.push(format!(
            "gateway version changed from {} to {}",
            metadata.gateway_version, desired.gateway_version
        ));
    }

    if metadata.embedding_provider != desired.embedding_provider {
        reasons.push(format!(
            "embedding provider changed from {:?} to {:?}",
            metadata.embedding_provider, desired.embedding_provider
        ));
    }

    let mut stored_excluded = metadata.excluded_servers.clone();
    stored_excluded.sort();
    let mut desired_excluded = desired.excluded_servers.clone();
    desired_excluded.sort();
    if stored_excluded != desired_excluded {
        reasons.push("excluded server list changed".to_owned());
    }

    reasons.extend(fingerprint_drift_reasons(&metadata.config_fingerprints, current_fingerprints));

    if reasons.is_empty() {
        RegenerationDecision::fresh()
    } else {
        RegenerationDecision::regenerate_all(reasons)
    }
}

fn fingerprint_drift_reasons(
    stored: &ConfigFingerprints,
    current: &ConfigFingerprints,
) -> Vec<String> {
    let mut reasons = Vec::new();
    for (label, before, after) in [
        ("user", &stored.user, &current.user),
        ("project", &stored.project, &current.project),
        ("local", &stored.local, &current.local),
    ] {
        match (before.exists, after.exists) {
            (false, true) => reasons.push(format!("{label} config was added")),
            (true, false) => reasons.push(format!("{label} config was removed")),
            (true, true) if before.hash != after.hash => {
                reasons.push(format!("{label} config content changed"))
            }
            _ => {}
        }
    }
    reasons
}

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::IndexScope;
    use crate::config::resolver::ConfigFingerprint;

    fn metadata(format_version: &str) -> BuildMetadata {
        BuildMetadata {
            format_version: format_version.to_owned(),
            gateway_version: "0.1.0".into(),
            scope: IndexScope::Project,
            embedding_provider: None,
            excluded_servers: vec![],
            config_fingerprints: ConfigFingerprints::default(),
            built_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn write_index(dir: &Path, metadata: BuildMetadata) -> std::path::PathBuf {
        let path = dir.join("index.json");
        let index = super::super::model::PersistedIndex::empty(metadata);
        std::fs::write(&path, serde_json::to_vec(&index).unwrap()).unwrap();
        path
    }

    #[test]
    fn missing_file_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let decision = check(
            &dir.path().join("nope.json"),
            &DesiredBuildFlags {
                gateway_version: "0.1.0".into(),
                embedding_provider: None,
                excluded_servers: vec![],
            },
            &ConfigFingerprints::default(),
        );
        assert!(decision.should_regenerate);
        assert!(decision.reasons[0].contains("missing"));
    }

    #[test]
    fn corrupt_file_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "{not json").unwrap();
        let decision = check(
            &path,
            &DesiredBuildFlags {
                gateway_version: "0.1.0".into(),
                embedding_provider: None,
                excluded_servers: vec![],
            },
            &ConfigFingerprints::default(),
        );
        assert!(decision.should_regenerate);
        assert!(decision.reasons[0].contains("not valid JSON"));
    }

    #[test]
    fn version_mismatch_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), metadata("2.0.0"));
        let decision = check(
            &path,
            &DesiredBuildFlags {
                gateway_version: "0.1.0".into(),
                embedding_provider: None,
                excluded_servers: vec![],
            },
            &ConfigFingerprints::default(),
        );
        assert!(decision.should_regenerate);
        assert!(decision.reasons[0].contains("incompatible"));
    }

    #[test]
    fn dtype_change_regenerates_with_named_reason() {
        let dir = tempfile::tempdir().unwrap();
        let mut stored = metadata(INDEX_FORMAT_VERSION);
        stored.embedding_provider = Some(EmbeddingProviderTag {
            location: "local".into(),
            model: "general-purpose".into(),
            dtype: Some("fp32".into()),
        });
        let path = write_index(dir.path(), stored);

        let desired = DesiredBuildFlags {
            gateway_version: "0.1.0".into(),
            embedding_provider: Some(EmbeddingProviderTag {
                location: "local".into(),
                model: "general-purpose".into(),
                dtype: Some("q8".into()),
            }),
            excluded_servers: vec![],
        };
        let decision = check(&path, &desired, &ConfigFingerprints::default());
        assert!(decision.should_regenerate);
        assert!(decision.reasons[0].contains("embedding provider changed"));
    }

    #[test]
    fn excluded_server_order_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let mut stored = metadata(INDEX_FORMAT_VERSION);
        stored.excluded_servers = vec!["b".into(), "a".into()];
        let path = write_index(dir.path(), stored);

        let desired = DesiredBuildFlags {
            gateway_version: "0.1.0".into(),
            embedding_provider: None,
            excluded_servers: vec!["a".into(), "b".into()],
        };
        let decision = check(&path, &desired, &ConfigFingerprints::default());
        assert!(!decision.should_regenerate);
    }

    #[test]
    fn fingerprint_content_change_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let stored_fp = ConfigFingerprints {
            project: ConfigFingerprint {
                exists: true,
                hash: Some("aaa".into()),
            },
            ..Default::default()
        };
        let mut stored = metadata(INDEX_FORMAT_VERSION);
        stored.config_fingerprints = stored_fp;
        let path = write_index(dir.path(), stored);

        let current_fp = ConfigFingerprints {
            project: ConfigFingerprint {
                exists: true,
                hash: Some("bbb".into()),
            },
            ..Default::default()
        };
        let decision = check(
            &path,
            &DesiredBuildFlags {
                gateway_version: "0.1.0".into(),
                embedding_provider: None,
                excluded_servers: vec![],
            },
            &current_fp,
        );
        assert!(decision.should_regenerate);
        assert!(decision.reasons[0].contains("project config content changed"));
    }

    #[test]
    fn gateway_version_mismatch_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), metadata(INDEX_FORMAT_VERSION));
        let decision = check(
            &path,
            &DesiredBuildFlags {
                gateway_version: "0.2.0".into(),
                embedding_provider: None,
                excluded_servers: vec![],
            },
            &ConfigFingerprints::default(),
        );
        assert!(decision.should_regenerate);
        assert!(decision.reasons[0].contains("gateway version changed"));
    }

    #[test]
    fn multiple_mismatches_are_all_collected() {
        let dir = tempfile::tempdir().unwrap();
        let mut stored = metadata(INDEX_FORMAT_VERSION);
        stored.excluded_servers = vec!["a".into()];
        let path = write_index(dir.path(), stored);

        let desired = DesiredBuildFlags {
            gateway_version: "0.2.0".into(),
            embedding_provider: None,
            excluded_servers: vec!["b".into()],
        };
        let decision = check(&path, &desired, &ConfigFingerprints::default());
        assert!(decision.should_regenerate);
        assert!(decision.reasons.iter().any(|r| r.contains("gateway version changed")));
        assert!(decision.reasons.iter().any(|r| r.contains("excluded server list changed")));
        assert_eq!(decision.reasons.len(), 2);
    }

    #[test]
    fn unchanged_index_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), metadata(INDEX_FORMAT_VERSION));
        let decision = check(
            &path,
            &DesiredBuildFlags {
                gateway_version: "0.1.0".into(),
                embedding_provider: None,
                excluded_servers: vec![],
            },
            &ConfigFingerprints::default(),
        );
        assert!(!decision.should_regenerate);
    }
}
