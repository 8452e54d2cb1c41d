//! Ruleset loading from a directory tree.
//!
//! The root (or a direct subdirectory) holds `ruleset.{yaml,yml,json,toml}`.
//! Every other file below the root's subdirectories holds feature
//! definitions, one or more per file. `__defaults__.*` files supply default
//! keys for their directory and everything beneath it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::defs::FeatureDef;
use crate::error::{RulesError, RulesErrorExt};
use crate::ruleset::{BadDefinition, Ruleset};

const RULESET_STEM: &str = "ruleset";
const DEFAULTS_STEM: &str = "__defaults__";
const NON_UNIQUE_ID: &str = "NonUniqueId";
const TYPE_ERROR: &str = "TypeError";
const VALIDATION_ERROR: &str = "ValidationError";

/// Loads a ruleset, collecting broken definitions into `bad_defs`.
///
/// # Errors
/// Fails only when the ruleset file itself is missing or unreadable.
pub fn load_ruleset(path: impl AsRef<Path>) -> Result<Ruleset, RulesError> {
    Loader::new(false).load(path.as_ref())
}

/// Loads a ruleset, failing at the first broken definition.
///
/// # Errors
/// [`RulesError::BadDefinition`] for any definition that would otherwise
/// land in `bad_defs`.
pub fn load_ruleset_strict(path: impl AsRef<Path>) -> Result<Ruleset, RulesError> {
    Loader::new(true).load(path.as_ref())
}

/// Restores a ruleset serialized to JSON.
///
/// # Errors
/// [`RulesError::Json`] when the input is not a serialized ruleset.
pub fn deserialize_ruleset(json: &str) -> Result<Ruleset, RulesError> {
    serde_json::from_str(json).context("Deserializing ruleset")
}

struct Loader {
    strict: bool,
    bad_defs: Vec<BadDefinition>,
}

impl Loader {
    const fn new(strict: bool) -> Self {
        Self { strict, bad_defs: Vec::new() }
    }

    #[instrument(skip(self), fields(strict = self.strict))]
    fn load(mut self, root: &Path) -> Result<Ruleset, RulesError> {
        let ruleset_path =
            find_ruleset(root).ok_or_else(|| RulesError::RulesetNotFound { path: root.display().to_string() })?;
        let document = parse_raw(&ruleset_path)?.into_iter().next().ok_or_else(|| RulesError::RulesetNotFound {
            path: ruleset_path.display().to_string(),
        })?;
        let mut ruleset = Ruleset::deserialize(document).context(format!("Parsing {}", ruleset_path.display()))?;

        for dir in subdirs(root)? {
            for def in self.parse_directory(&dir, &Map::new())? {
                let existing = match ruleset.features.get(&def.id) {
                    Some(prior) => Some(prior.def_path.clone().unwrap_or_else(|| "ruleset".into())),
                    None => ruleset.attribute(&def.id).map(|a| format!("attribute {}", a.id)),
                };
                if let Some(existing) = existing {
                    let message = format!("Non-unique ID {}. Existing: {existing}", def.id);
                    let data = serde_json::to_value(&def).ok();
                    self.reject(BadDefinition {
                        path: def.def_path.clone().unwrap_or_default(),
                        data,
                        raw_data: None,
                        exception_type: NON_UNIQUE_ID.into(),
                        exception_message: message,
                    })?;
                    continue;
                }
                ruleset.features.insert(def.id.clone(), def);
            }
        }

        let broken: Vec<(String, String)> = ruleset
            .features
            .values()
            .filter_map(|def| ruleset.post_validate(def).err().map(|message| (def.id.clone(), message)))
            .collect();
        for (id, message) in broken {
            let def = ruleset.features.shift_remove(&id);
            self.reject(BadDefinition {
                path: def.and_then(|d| d.def_path).unwrap_or_default(),
                data: None,
                raw_data: None,
                exception_type: VALIDATION_ERROR.into(),
                exception_message: message,
            })?;
        }

        ruleset.bad_defs.append(&mut self.bad_defs);
        info!(
            ruleset = %ruleset.id,
            version = %ruleset.version,
            features = ruleset.features.len(),
            bad_defs = ruleset.bad_defs.len(),
            "Ruleset loaded"
        );
        Ok(ruleset)
    }

    fn reject(&mut self, bad: BadDefinition) -> Result<(), RulesError> {
        warn!(path = %bad.path, kind = %bad.exception_type, "{}", bad.exception_message);
        if self.strict {
            return Err(RulesError::BadDefinition { path: bad.path, message: bad.exception_message });
        }
        self.bad_defs.push(bad);
        Ok(())
    }

    fn parse_directory(&mut self, dir: &Path, inherited: &Map<String, Value>) -> Result<Vec<FeatureDef>, RulesError> {
        let mut defaults = inherited.clone();
        let files = files(dir)?;
        for path in files.iter().filter(|p| stem(p) == DEFAULTS_STEM) {
            for document in parse_raw(path)? {
                if let Value::Object(map) = document {
                    defaults.extend(map);
                }
            }
        }

        let mut defs = Vec::new();
        for path in files.iter().filter(|p| !stem(p).starts_with(['_', '.']) && stem(p) != RULESET_STEM) {
            defs.extend(self.parse_file(path, &defaults)?);
        }
        for sub in subdirs(dir)? {
            defs.extend(self.parse_directory(&sub, &defaults)?);
        }
        Ok(defs)
    }

    fn parse_file(&mut self, path: &Path, defaults: &Map<String, Value>) -> Result<Vec<FeatureDef>, RulesError> {
        let documents = match parse_raw(path) {
            Ok(documents) => documents,
            Err(e) => {
                self.reject(BadDefinition {
                    path: path.display().to_string(),
                    data: None,
                    raw_data: None,
                    exception_type: VALIDATION_ERROR.into(),
                    exception_message: e.to_string(),
                })?;
                return Ok(Vec::new());
            }
        };
        debug!(path = %path.display(), documents = documents.len(), "Parsing definitions");

        let mut defaults = defaults.clone();
        let mut defs = Vec::new();
        let mut count = 0;
        for raw in documents.into_iter().flat_map(flatten) {
            let mut raw = match raw {
                Value::Object(map) => map,
                other => {
                    self.reject(BadDefinition {
                        path: path.display().to_string(),
                        data: None,
                        raw_data: Some(other),
                        exception_type: TYPE_ERROR.into(),
                        exception_message: "Definition must be a mapping".into(),
                    })?;
                    continue;
                }
            };
            if !raw.contains_key("id") {
                let id = if count == 0 { stem(path).to_owned() } else { format!("{}[{count}]", stem(path)) };
                raw.insert("id".into(), Value::String(id));
            }
            if raw.get("id").and_then(Value::as_str) == Some(DEFAULTS_STEM) {
                raw.remove("id");
                defaults.extend(raw);
                continue;
            }
            count += 1;

            let mut data = defaults.clone();
            data.extend(raw.clone());
            data.insert("def_path".into(), Value::String(path.display().to_string()));
            let result = if data.get("type").is_some_and(|t| !t.is_null()) {
                FeatureDef::deserialize(Value::Object(data.clone())).map_err(|e| (VALIDATION_ERROR, e.to_string()))
            } else {
                Err((TYPE_ERROR, "Type key not specified for this entry (e.g., `type: \"skill\"`)".to_owned()))
            };
            match result {
                Ok(def) => defs.push(def),
                Err((kind, message)) => self.reject(BadDefinition {
                    path: path.display().to_string(),
                    data: Some(Value::Object(data)),
                    raw_data: Some(Value::Object(raw)),
                    exception_type: kind.into(),
                    exception_message: message,
                })?,
            }
        }
        Ok(defs)
    }
}

/// A document holding a list contributes each of its entries.
fn flatten(document: Value) -> Vec<Value> {
    match document {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn stem(path: &Path) -> &str {
    path.file_stem().and_then(OsStr::to_str).unwrap_or_default()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(OsStr::to_str).is_some_and(|n| n.starts_with('.'))
}

fn entries(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>, RulesError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.context(format!("Reading {}", dir.display()))?;
        let file_type = entry.file_type();
        if (want_dirs && file_type.is_dir() || !want_dirs && file_type.is_file()) && !is_hidden(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn files(dir: &Path) -> Result<Vec<PathBuf>, RulesError> {
    entries(dir, false)
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, RulesError> {
    entries(dir, true)
}

fn is_supported(path: &Path) -> bool {
    matches!(path.extension().and_then(OsStr::to_str), Some("yaml" | "yml" | "json" | "toml"))
}

/// `ruleset.*` in the root, else in a direct subdirectory.
fn find_ruleset(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file() && stem(e.path()) == RULESET_STEM && is_supported(e.path()))
        .min_by_key(walkdir::DirEntry::depth)
        .map(walkdir::DirEntry::into_path)
}

/// Documents of a definition file; unknown extensions yield none.
fn parse_raw(path: &Path) -> Result<Vec<Value>, RulesError> {
    if !is_supported(path) {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path).context(format!("Reading {}", path.display()))?;
    let context = || format!("Parsing {}", path.display());
    match path.extension().and_then(OsStr::to_str) {
        Some("json") => Ok(vec![serde_json::from_str(&text).context(context())?]),
        Some("toml") => Ok(vec![toml::from_str(&text).context(context())?]),
        _ => serde_yaml::Deserializer::from_str(&text)
            .map(|document| Value::deserialize(document).context(context()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(root: &Path, name: &str, body: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ruleset.yaml", "{id: test, name: Test, version: '1.0', xp_table: {0: 2}}");
        dir
    }

    #[test]
    fn missing_ruleset_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_ruleset(dir.path()), Err(RulesError::RulesetNotFound { .. })));
    }

    #[test]
    fn ruleset_in_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "meta/ruleset.json", r#"{"id": "nested", "name": "Nested", "xp_table": {"0": 2}}"#);
        let ruleset = load_ruleset(dir.path()).unwrap();
        assert_eq!(ruleset.id, "nested");
        assert!(ruleset.bad_defs.is_empty());
    }

    #[test]
    fn defaults_and_implicit_ids() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ruleset.toml", "id = \"t\"\nname = \"T\"\n[xp_table]\n0 = 2\n");
        write(dir.path(), "skills/__defaults__.yaml", "{type: skill, cost: 1}");
        write(dir.path(), "skills/climb.yaml", "name: Climb\n---\nname: Swim\n---\n{id: __defaults__, cost: 2}\n---\nname: Dive\n");
        write(dir.path(), "skills/deep/list.yaml", "[{id: a, name: A}, {id: b, name: B, cost: 3}]");
        write(dir.path(), "skills/_notes.yaml", "{id: ignored, name: I}");
        write(dir.path(), "skills/readme.md", "not a definition");

        let ruleset = load_ruleset(dir.path()).unwrap();
        assert!(ruleset.bad_defs.is_empty(), "{:?}", ruleset.bad_defs);
        let ids: Vec<&str> = ruleset.features.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["climb", "climb[1]", "climb[2]", "a", "b"]);
        assert!(matches!(ruleset.features["climb[2]"].cost, Some(crate::defs::CostDef::Flat(2))));
        assert!(matches!(ruleset.features["b"].cost, Some(crate::defs::CostDef::Flat(3))));
        assert!(ruleset.features["a"].def_path.as_deref().unwrap().ends_with("list.yaml"));
    }

    #[test]
    fn bad_definitions_are_collected() {
        let dir = tree();
        write(dir.path(), "features/good.yaml", "{id: lore, name: Lore, type: skill, cost: 1}");
        write(dir.path(), "features/dupe.yaml", "{id: lore, name: Lore Again, type: skill, cost: 1}");
        write(dir.path(), "features/untyped.yaml", "{id: mystery, name: Mystery}");
        write(dir.path(), "features/orphan.yaml", "{id: orphan, name: Orphan, type: perk, cost: 1, parent: nobody}");
        write(dir.path(), "features/attr.yaml", "{id: cp, name: CP, type: perk, cost: 1}");

        let ruleset = load_ruleset(dir.path()).unwrap();
        assert_eq!(ruleset.features.keys().collect::<Vec<_>>(), vec!["lore"]);
        let kinds: Vec<&str> = ruleset.bad_defs.iter().map(|b| b.exception_type.as_str()).collect();
        assert_eq!(kinds.iter().filter(|k| **k == NON_UNIQUE_ID).count(), 2);
        assert!(kinds.contains(&TYPE_ERROR));
        assert!(kinds.contains(&VALIDATION_ERROR));

        let err = load_ruleset_strict(dir.path()).unwrap_err();
        assert!(matches!(err, RulesError::BadDefinition { .. }));
    }

    #[test]
    fn serialized_ruleset_round_trips() {
        let dir = tree();
        write(dir.path(), "features/lore.yaml", "{id: lore, name: Lore, type: skill, cost: 1, option: {freeform: true}}");
        let ruleset = load_ruleset(dir.path()).unwrap();
        let json = serde_json::to_string(&ruleset).unwrap();
        assert_eq!(deserialize_ruleset(&json).unwrap(), ruleset);
    }
}
