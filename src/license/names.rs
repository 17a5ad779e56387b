use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Names shorter than this never take part in fuzzy matching
pub const MIN_FUZZY_LENGTH: usize = 3;

const LICENSE_FILE_EXTENSIONS: [&str; 4] = ["txt", "md", "html", "htm"];

static LICENSE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[-_.]licen[cs]es?$").expect("license suffix pattern is valid"));

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[-_](?:apache[-_]?)?v?\d+(?:\.\d+)*$").expect("version token pattern is valid")
});

/// Dependency name encoded in a third-party license file name.
///
/// `guava-LICENSE.txt`, `jsr305_license.html`, `asm_apache_v2.txt` and
/// `jackson-core-2.15.2.txt` give `guava`, `jsr305`, `asm` and `jackson-core`.
pub fn extract_dependency_name_from_filename(file_name: &str) -> String {
    let mut name = strip_license_extension(file_name.trim()).to_string();

    loop {
        let without_suffix = LICENSE_SUFFIX.replace(&name, "");
        let stripped = VERSION_TOKEN.replace(&without_suffix, "").trim().to_string();
        if stripped.is_empty() || stripped == name {
            break;
        }
        name = stripped;
    }

    name
}

fn strip_license_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, extension))
            if !stem.is_empty() && LICENSE_FILE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) =>
        {
            stem
        }
        _ => file_name,
    }
}

/// Canonical form shared by SBOM coordinates and file-derived names
pub fn normalize_for_comparison(name: &str) -> String {
    name.replace(':', ".").trim().to_lowercase()
}

fn artifact_id(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn long_enough(name: &str) -> bool {
    name.chars().count() >= MIN_FUZZY_LENGTH
}

fn exact_artifact_id(artifact: &str, license: &str) -> bool {
    license == artifact
}

fn containment(artifact: &str, license: &str) -> bool {
    license.contains(artifact) || artifact.contains(license)
}

fn shared_dash_component(artifact: &str, license: &str) -> bool {
    let components: Vec<&str> = artifact.split('-').filter(|part| long_enough(part)).collect();
    license
        .split('-')
        .filter(|part| long_enough(part))
        .any(|part| components.contains(&part))
}

/// Pair SBOM names with license names they did not match exactly.
///
/// Both sides are walked in sorted order and each tier is tried across all
/// remaining license names before the next one, so the result only depends
/// on the input sets. A license name is used at most once.
pub fn find_fuzzy_matches(sca_names: &BTreeSet<String>, license_names: &BTreeSet<String>) -> Vec<(String, String)> {
    let tiers: [fn(&str, &str) -> bool; 3] = [exact_artifact_id, containment, shared_dash_component];

    let mut consumed: BTreeSet<&str> = sca_names
        .intersection(license_names)
        .map(String::as_str)
        .collect();
    let mut matches = Vec::new();

    for sca in sca_names.iter().filter(|name| !license_names.contains(*name)) {
        let artifact = artifact_id(sca);
        if !long_enough(artifact) {
            continue;
        }

        let found = tiers.iter().find_map(|tier| {
            license_names
                .iter()
                .filter(|license| !consumed.contains(license.as_str()) && long_enough(license.as_str()))
                .find(|license| tier(artifact, license.as_str()))
        });

        if let Some(license) = found {
            consumed.insert(license.as_str());
            matches.push((sca.clone(), license.clone()));
        }
    }

    matches
}
