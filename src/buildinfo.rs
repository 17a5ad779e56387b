//! Build metadata published by CI: properties, modules and the artifacts a
//! release promotes.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Module property listing the artifacts a release publishes
pub const ARTIFACTS_TO_PUBLISH_PROPERTY: &str = "artifactsToPublish";
/// Build property carrying the same list when modules do not
pub const ARTIFACTS_TO_PUBLISH_ENV: &str = "buildInfo.env.ARTIFACTS_TO_PUBLISH";

const SUITABLE_EXTENSIONS: [&str; 2] = ["jar", "nupkg"];
const EXCLUDED_CLASSIFIERS: [&str; 3] = ["-sources", "-javadoc", "-tests"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(rename = "buildInfo", default)]
    pub build_info: BuildInfoBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInfoBody {
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(default)]
    pub modules: Vec<BuildModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildModule {
    /// `group:artifact:version`
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(default)]
    pub artifacts: Vec<ModuleArtifact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleArtifact {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One entry of an artifacts-to-publish list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub extension: String,
    pub classifier: Option<String>,
    /// Exact file name, when known from the build modules
    pub file_name: Option<String>,
}

impl ArtifactCoordinate {
    /// Parse `group:artifact:ext`, `group:artifact:version:ext` or
    /// `group:artifact:version:ext:classifier`. The 3-part form takes `default_version`.
    pub fn parse(value: &str, default_version: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split(':').map(str::trim).collect();
        let (version, extension, classifier) = match parts.as_slice() {
            [_, _, extension] => (default_version, *extension, None),
            [_, _, version, extension] => (*version, *extension, None),
            [_, _, version, extension, classifier, ..] => (*version, *extension, Some(*classifier)),
            _ => {
                warn!("Artifact string has too few parts: {}", value);
                return None;
            }
        };

        if parts[0].is_empty() || parts[1].is_empty() || extension.is_empty() {
            warn!("Incomplete artifact string: {}", value);
            return None;
        }

        Some(Self {
            group_id: parts[0].to_string(),
            artifact_id: parts[1].to_string(),
            version: version.to_string(),
            extension: extension.to_string(),
            classifier: classifier.filter(|classifier| !classifier.is_empty()).map(str::to_string),
            file_name: None,
        })
    }

    /// `{artifact}-{version}[-{classifier}].{ext}` unless the exact name is known
    pub fn file_name(&self) -> String {
        if let Some(file_name) = &self.file_name {
            return file_name.clone();
        }
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.extension),
        }
    }

    /// Maven repository layout: `group/path/artifact/version/file`
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.file_name()
        )
    }
}

/// Split a comma separated artifacts-to-publish list, skipping unparseable entries
pub fn parse_artifacts_to_publish(value: &str, default_version: &str) -> Vec<ArtifactCoordinate> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| ArtifactCoordinate::parse(entry, default_version))
        .collect()
}

impl BuildInfo {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse build info")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read build info: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid build info: {}", path.display()))
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.build_info.properties.get(name).map(String::as_str)
    }

    /// Property of the first module
    pub fn module_property(&self, name: &str) -> Option<&str> {
        self.build_info
            .modules
            .first()
            .and_then(|module| module.properties.get(name))
            .map(String::as_str)
    }

    /// Version segment of the first module id
    pub fn version(&self) -> Option<&str> {
        self.build_info
            .modules
            .first()
            .and_then(|module| module.id.rsplit(':').next())
            .filter(|version| !version.is_empty())
    }

    pub fn artifacts_to_publish(&self) -> Option<&str> {
        let artifacts = self
            .module_property(ARTIFACTS_TO_PUBLISH_PROPERTY)
            .or_else(|| self.property(ARTIFACTS_TO_PUBLISH_ENV))
            .filter(|artifacts| !artifacts.trim().is_empty());
        if artifacts.is_none() {
            info!("No artifacts to publish");
        }
        artifacts
    }

    /// First module artifact worth inspecting when no publish list exists:
    /// a `.jar` or `.nupkg` that is not a sources, javadoc or tests archive
    pub fn first_suitable_artifact(&self) -> Option<ArtifactCoordinate> {
        for module in &self.build_info.modules {
            let id: Vec<&str> = module.id.split(':').collect();
            let [group_id, artifact_id, version] = id.as_slice() else {
                debug!("Skipping module with unexpected id: {}", module.id);
                continue;
            };

            for artifact in &module.artifacts {
                let Some((stem, extension)) = artifact.name.rsplit_once('.') else {
                    continue;
                };
                let extension = extension.to_ascii_lowercase();
                if !SUITABLE_EXTENSIONS.contains(&extension.as_str()) {
                    continue;
                }
                if EXCLUDED_CLASSIFIERS.iter().any(|suffix| stem.ends_with(suffix)) {
                    continue;
                }
                return Some(ArtifactCoordinate {
                    group_id: group_id.to_string(),
                    artifact_id: artifact_id.to_string(),
                    version: version.to_string(),
                    extension,
                    classifier: None,
                    file_name: Some(artifact.name.clone()),
                });
            }
        }
        None
    }

    /// Artifacts named by the publish list, or the first suitable module artifact
    pub fn artifacts_for_inspection(&self, default_version: &str) -> Vec<ArtifactCoordinate> {
        if let Some(artifacts) = self.artifacts_to_publish() {
            return parse_artifacts_to_publish(artifacts, default_version);
        }
        warn!("No artifacts to publish found in build info, trying to find suitable artifact...");
        match self.first_suitable_artifact() {
            Some(artifact) => {
                info!("Found suitable fallback artifact: {}", artifact.file_name());
                vec![artifact]
            }
            None => {
                warn!("No suitable artifacts found in build info");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_INFO: &str = r#"{
        "buildInfo": {
            "properties": {"buildInfo.env.ARTIFACTS_TO_PUBLISH": "ignored:when:module:has:one"},
            "modules": [{
                "id": "org.sonarsource.java:sonar-java-plugin:7.1.0.1234",
                "properties": {
                    "artifactsToPublish": "org.sonarsource.java:sonar-java-plugin:jar,org.sonarsource.java:sonar-java-plugin:7.1.0.1234:zip:linux"
                },
                "artifacts": [
                    {"name": "sonar-java-plugin-7.1.0.1234-sources.jar", "type": "jar"},
                    {"name": "sonar-java-plugin-7.1.0.1234.pom", "type": "pom"},
                    {"name": "sonar-java-plugin-7.1.0.1234.jar", "type": "jar"}
                ]
            }]
        }
    }"#;

    #[test]
    fn test_properties_and_version() {
        let build_info = BuildInfo::from_json(BUILD_INFO).unwrap();
        assert_eq!(build_info.version(), Some("7.1.0.1234"));
        assert_eq!(build_info.property("missing"), None);
    }

    #[test]
    fn test_artifacts_to_publish() {
        let build_info = BuildInfo::from_json(BUILD_INFO).unwrap();
        let artifacts = build_info.artifacts_for_inspection("7.1.0.1234");
        let names: Vec<String> = artifacts.iter().map(ArtifactCoordinate::file_name).collect();
        assert_eq!(
            names,
            vec!["sonar-java-plugin-7.1.0.1234.jar", "sonar-java-plugin-7.1.0.1234-linux.zip"]
        );
        assert_eq!(
            artifacts[0].repository_path(),
            "org/sonarsource/java/sonar-java-plugin/7.1.0.1234/sonar-java-plugin-7.1.0.1234.jar"
        );
    }

    #[test]
    fn test_env_property_fallback() {
        let build_info = BuildInfo::from_json(
            r#"{"buildInfo": {"properties": {"buildInfo.env.ARTIFACTS_TO_PUBLISH": "com.sonarsource.x:x-plugin:jar"}}}"#,
        )
        .unwrap();
        assert_eq!(build_info.artifacts_to_publish(), Some("com.sonarsource.x:x-plugin:jar"));
        assert_eq!(build_info.version(), None);
    }

    #[test]
    fn test_first_suitable_artifact() {
        let mut build_info = BuildInfo::from_json(BUILD_INFO).unwrap();
        build_info.build_info.modules[0].properties.clear();
        build_info.build_info.properties.clear();

        let artifacts = build_info.artifacts_for_inspection("ignored");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].file_name(), "sonar-java-plugin-7.1.0.1234.jar");
        assert_eq!(artifacts[0].extension, "jar");
    }

    #[test]
    fn test_parse_artifact_coordinates() {
        assert!(ArtifactCoordinate::parse("only:two", "1.0").is_none());
        assert!(ArtifactCoordinate::parse(":x:jar", "1.0").is_none());

        let parsed = parse_artifacts_to_publish(" a.b:c:jar , , a.b:d:2.0:nupkg ", "1.0.0.1");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].file_name(), "c-1.0.0.1.jar");
        assert_eq!(parsed[1].file_name(), "d-2.0.nupkg");
    }
}
