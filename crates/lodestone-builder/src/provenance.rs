//! SLSA-style provenance types for docker-pinned builds.
//!
//! The [`BuildDefinition`] produced here is consumed by an external signing
//! component that wraps it, together with the [`Subject`] list, into an
//! in-toto statement and envelope. This crate only assembles the structures.
//!
//! See: <https://slsa.dev/spec/v1.0/provenance>

use std::collections::BTreeMap;

use serde::Serialize;

/// Key of the source repository artifact in [`ParameterCollection::artifacts`].
pub const SOURCE_KEY: &str = "source";
/// Key of the builder image artifact in [`ParameterCollection::artifacts`].
pub const BUILDER_IMAGE_KEY: &str = "builderImage";
/// Key of the build config file path in [`ParameterCollection::values`].
pub const CONFIG_FILE_KEY: &str = "configFile";
/// Key of the artifact path pattern in [`ParameterCollection::values`].
pub const ARTIFACT_PATH_KEY: &str = "artifactPath";
/// Key of the JSON-encoded command array in [`ParameterCollection::values`].
pub const COMMAND_KEY: &str = "command";

/// A named input to the build and its content digests.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReference {
    /// URI identifying the artifact.
    pub uri: String,
    /// Digest algorithm → hex value.
    pub digest: BTreeMap<String, String>,
}

/// External parameters of the build.
#[derive(Debug, Serialize)]
pub struct ParameterCollection {
    /// Input artifacts, keyed by [`SOURCE_KEY`] and [`BUILDER_IMAGE_KEY`].
    pub artifacts: BTreeMap<String, ArtifactReference>,
    /// Scalar parameters, keyed by the `*_KEY` constants above.
    pub values: BTreeMap<String, String>,
}

/// The provenance-bearing structure tying source, builder image, and
/// command together.
///
/// `systemParameters` and `resolvedDependencies` are reserved for future
/// extension and deliberately not serialized at all.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDefinition {
    /// Always [`BuildDefinition::BUILD_TYPE`].
    pub build_type: &'static str,
    /// External parameters of the build.
    pub external_parameters: ParameterCollection,
}

impl BuildDefinition {
    /// The docker-based build type URI.
    pub const BUILD_TYPE: &str = "https://slsa.dev/docker-build";
}

/// A built artifact identified by name and content digest.
#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    /// Base filename of the artifact.
    pub name: String,
    /// Digest algorithm → hex value.
    pub digest: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_definition_serializes_with_camel_case_keys() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            SOURCE_KEY.to_owned(),
            ArtifactReference {
                uri: "https://example.com/repo".to_owned(),
                digest: BTreeMap::from([("sha1".to_owned(), "abc123".to_owned())]),
            },
        );

        let bd = BuildDefinition {
            build_type: BuildDefinition::BUILD_TYPE,
            external_parameters: ParameterCollection {
                artifacts,
                values: BTreeMap::from([(CONFIG_FILE_KEY.to_owned(), "build.toml".to_owned())]),
            },
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&bd).expect("serialize"))
                .expect("round-trip");
        assert_eq!(json["buildType"], "https://slsa.dev/docker-build");
        assert_eq!(
            json["externalParameters"]["artifacts"]["source"]["digest"]["sha1"],
            "abc123"
        );
        assert_eq!(
            json["externalParameters"]["values"]["configFile"],
            "build.toml"
        );
        // Reserved fields must be absent, not null.
        assert!(json.get("systemParameters").is_none());
        assert!(json.get("resolvedDependencies").is_none());
    }

    #[test]
    fn subject_serializes_digest_map() {
        let subject = Subject {
            name: "artifact.tar".to_owned(),
            digest: BTreeMap::from([("sha256".to_owned(), "00ff".to_owned())]),
        };
        let json = serde_json::to_string(&subject).expect("serialize");
        assert_eq!(json, r#"{"name":"artifact.tar","digest":{"sha256":"00ff"}}"#);
    }
}
