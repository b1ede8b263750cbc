// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::Path;

use crate::TranspileError;

/// The full set of files a build emits, keyed by distribution-relative path.
/// Assembly is pure: the same inputs produce byte-identical content, and
/// every collection is sorted before rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestSet {
    files: BTreeMap<String, String>,
}

impl ManifestSet {
    pub fn new() -> ManifestSet {
        Self::default()
    }

    /// Line-oriented manifest: entries sorted ascending, LF-terminated.
    pub fn put_lines(&mut self, name: &str, mut entries: Vec<String>) {
        entries.retain(|e| !e.trim().is_empty());
        entries.sort();
        entries.dedup();

        let mut content = entries.join("\n");
        content.push('\n');
        self.files.insert(name.to_string(), content);
    }

    /// `key=value` manifest: entries sorted by key.
    pub fn put_key_values(&mut self, name: &str, mut entries: Vec<(String, String)>) {
        entries.sort();
        entries.dedup();

        let mut content = String::new();
        for (key, value) in entries {
            content.push_str(&key);
            content.push('=');
            content.push_str(&value);
            content.push('\n');
        }
        self.files.insert(name.to_string(), content);
    }

    /// Properties manifest: keys escaped so separators survive round-trips.
    pub fn put_properties(&mut self, name: &str, mut entries: Vec<(String, String)>) {
        entries.sort();
        entries.dedup();

        let mut content = String::new();
        for (key, value) in entries {
            content.push_str(&escape_property_key(&key));
            content.push('=');
            content.push_str(&value);
            content.push('\n');
        }
        self.files.insert(name.to_string(), content);
    }

    pub fn put_raw(&mut self, name: &str, content: String) {
        self.files.insert(name.to_string(), content);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn write_to(&self, root: &Path) -> Result<(), TranspileError> {
        for (name, content) in &self.files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| TranspileError::Write {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
            std::fs::write(&path, content).map_err(|source| TranspileError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}

fn escape_property_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            ':' => out.push_str("\\:"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_lines_are_sorted_and_lf_terminated() {
        let mut manifests = ManifestSet::new();
        manifests.put_lines(
            "oal-metrics-classes.txt",
            vec!["b.B".into(), "a.A".into(), "".into(), "a.A".into()],
        );

        assert_eq!(
            Some("a.A\nb.B\n"),
            manifests.get("oal-metrics-classes.txt")
        );
    }

    #[test]
    fn test_property_keys_escape_separators() {
        let mut manifests = ManifestSet::new();
        manifests.put_properties(
            "mal-filter-expressions.properties",
            vec![(
                "{ tags -> tags.a == 'b' }".to_string(),
                "mal.rt.filter.MalFilter_0".to_string(),
            )],
        );

        assert_eq!(
            Some("{ tags -> tags.a \\=\\= 'b' }=mal.rt.filter.MalFilter_0\n"),
            manifests.get("mal-filter-expressions.properties")
        );
    }

    #[test]
    fn test_assembly_is_pure() {
        let build = || {
            let mut manifests = ManifestSet::new();
            manifests.put_lines("a.txt", vec!["z".into(), "y".into()]);
            manifests.put_key_values("b.txt", vec![("k".into(), "v=1".into())]);
            manifests
        };

        assert_eq!(build(), build());
        assert_eq!(Some("k=v=1\n"), build().get("b.txt"));
    }
}
