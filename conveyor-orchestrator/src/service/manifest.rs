//! Deployment manifest handling
//!
//! Image substitution is a constrained templating contract: the manifest
//! must contain the mapped image reference exactly once as a whole token.

use serde::Deserialize;

use super::EngineError;

pub const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// Kinds whose names become health-check targets
const WORKLOAD_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet"];

fn is_image_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '/' | '@')
}

/// Replaces the single bounded occurrence of `image` with `replacement`.
///
/// A match inside a longer reference (e.g. `app:v1` within `app:v10`) does
/// not count. Zero or several matches are rejected.
pub fn substitute_image(
    manifest: &str,
    image: &str,
    replacement: &str,
) -> Result<String, EngineError> {
    if image.is_empty() {
        return Err(EngineError::Manifest("image reference is empty".to_string()));
    }

    let matches: Vec<usize> = manifest
        .match_indices(image)
        .map(|(pos, _)| pos)
        .filter(|pos| {
            let before = manifest[..*pos].chars().next_back();
            let after = manifest[pos + image.len()..].chars().next();
            !before.is_some_and(is_image_char) && !after.is_some_and(is_image_char)
        })
        .collect();

    match matches.as_slice() {
        [pos] => {
            let mut rendered = String::with_capacity(manifest.len() + replacement.len());
            rendered.push_str(&manifest[..*pos]);
            rendered.push_str(replacement);
            rendered.push_str(&manifest[pos + image.len()..]);
            Ok(rendered)
        }
        [] => Err(EngineError::Manifest(format!(
            "image {} does not occur in the manifest",
            image
        ))),
        many => Err(EngineError::Manifest(format!(
            "image {} occurs {} times in the manifest, expected exactly once",
            image,
            many.len()
        ))),
    }
}

/// Names of the workload resources declared in a (multi-document) manifest
pub fn resource_names(manifest: &str) -> Result<Vec<String>, EngineError> {
    let mut names = Vec::new();

    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| EngineError::Manifest(format!("invalid manifest: {}", e)))?;

        let kind = value.get("kind").and_then(serde_yaml::Value::as_str);
        if !kind.is_some_and(|kind| WORKLOAD_KINDS.contains(&kind)) {
            continue;
        }

        if let Some(name) = value
            .get("metadata")
            .and_then(|metadata| metadata.get("name"))
            .and_then(serde_yaml::Value::as_str)
        {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Concatenates rendered manifests into one document stream
pub fn join_manifests<S: AsRef<str>>(manifests: &[S]) -> String {
    manifests
        .iter()
        .map(|manifest| manifest.as_ref().trim_matches('\n'))
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
