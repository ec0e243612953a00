//! Insight packs: externally generated JSON findings, read-only here.

pub mod loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use loader::{DEFAULT_PACK_MEMO_CAPACITY, PackLoad, PackLoader};

pub const PACK_EXTENSION: &str = "json";
pub const MAX_PACK_COLUMNS: usize = 3;

/// One table row; keys keep the order they have in the pack file.
pub type PackTableRow = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct PackTable {
    pub name: String,
    pub rows: Vec<PackTableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InsightPack {
    /// Ordered findings, one sentence each.
    #[serde(default)]
    pub bullets: Vec<String>,

    /// Named scalar KPIs.
    #[serde(default)]
    pub kpis: Map<String, Value>,

    /// Named tables, each an ordered list of row objects.
    #[serde(default, with = "ordered_tables")]
    #[schemars(with = "BTreeMap<String, Vec<PackTableRow>>")]
    pub tables: Vec<PackTable>,
}

impl InsightPack {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty() && self.kpis.is_empty() && self.tables.is_empty()
    }
}

/// `tables` is a JSON object on the wire; file order is kept in memory.
mod ordered_tables {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::{Map, Value};

    use super::{PackTable, PackTableRow};

    pub fn serialize<S>(tables: &[PackTable], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(tables.len()))?;
        for table in tables {
            map.serialize_entry(&table.name, &table.rows)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<PackTable>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::<String, Value>::deserialize(deserializer)?
            .into_iter()
            .map(|(name, rows)| -> Result<PackTable, D::Error> {
                let rows = serde_json::from_value::<Vec<PackTableRow>>(rows).map_err(|error| {
                    serde::de::Error::custom(format!("table `{name}`: {error}"))
                })?;
                Ok(PackTable { name, rows })
            })
            .collect()
    }
}

/// Builds a pack from a parsed JSON document. `null` fields read as empty.
pub fn pack_from_value(value: Value) -> Result<InsightPack> {
    let Value::Object(mut fields) = value else {
        bail!("pack root must be a JSON object");
    };
    fields.retain(|_, field| !field.is_null());
    serde_json::from_value(Value::Object(fields))
        .context("pack does not match the insight pack layout")
}

#[must_use]
pub fn pack_json_schema() -> Value {
    let schema = schemars::schema_for!(InsightPack);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated insight pack schema: {error}");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackFile {
    pub label: String,
    pub path: PathBuf,
}

/// Lists `*.json` packs sorted by path, creating `dir` when it is missing.
pub fn discover_packs(dir: &Path) -> Result<Vec<PackFile>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create packs directory: {}", dir.display()))?;

    let mut packs = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list packs directory: {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to read packs directory entry: {}", dir.display()))?
            .path();
        if !path.is_file()
            || path.extension().and_then(|extension| extension.to_str()) != Some(PACK_EXTENSION)
        {
            continue;
        }
        let Some(label) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        packs.push(PackFile {
            label: label.to_string(),
            path,
        });
    }
    packs.sort_by(|left, right| left.path.cmp(&right.path));
    Ok(packs)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackSelection {
    pub chosen: Vec<PackFile>,
    pub unknown_labels: Vec<String>,
    pub columns: usize,
}

impl PackSelection {
    /// Column a chosen pack is laid out in.
    #[must_use]
    pub fn column_of(&self, index: usize) -> usize {
        index % self.columns
    }
}

/// Resolves requested labels against the discovered packs. With no request
/// the first pack is shown.
#[must_use]
pub fn select_packs(available: &[PackFile], requested: &[String]) -> PackSelection {
    let mut chosen = Vec::new();
    let mut unknown_labels = Vec::new();

    if requested.is_empty() {
        chosen.extend(available.first().cloned());
    } else {
        for label in requested {
            match available.iter().find(|pack| &pack.label == label) {
                Some(pack) if !chosen.contains(pack) => chosen.push(pack.clone()),
                Some(_) => {}
                None => unknown_labels.push(label.clone()),
            }
        }
    }

    let columns = chosen.len().clamp(1, MAX_PACK_COLUMNS);
    PackSelection {
        chosen,
        unknown_labels,
        columns,
    }
}
