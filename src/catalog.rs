// 📚 Catalog Store - Partitioned sources merged into one ordered collection
//
// Each partition (group) is fetched independently, possibly concurrently.
// The merged catalog always follows the order in which labels were
// requested, never the order in which fetches complete.

use crate::error::LoadError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// FIXED ENUMERATIONS
// ============================================================================

/// Partition labels, in display/load order
pub const GROUPS: [&str; 4] = ["Bakuten", "MFB", "Burst", "X"];

/// Combat-role facet values
pub const TYPES: [&str; 4] = ["Attaque", "Défense", "Endurance", "Équilibre"];

/// Spin-direction facet values
pub const ROTATIONS: [&str; 3] = ["Droite", "Gauche", "Double"];

// ============================================================================
// RAW RECORDS (loader output)
// ============================================================================

/// RawEntry - one record as it comes out of a partition source
///
/// Every field is optional here; validation happens when the record is
/// turned into a `CatalogEntry`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub rotation: Option<String>,

    /// String or number; `poids` in the legacy data files
    #[serde(default, alias = "poids")]
    pub weight: Option<serde_json::Value>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default, rename = "moreInfoUrl")]
    pub more_info_url: Option<String>,
}

/// CSV rows carry every column as text
#[derive(Debug, Deserialize)]
struct CsvRecord {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    rotation: Option<String>,
    #[serde(alias = "poids")]
    weight: Option<String>,
    description: Option<String>,
    image: Option<String>,
    #[serde(rename = "moreInfoUrl")]
    more_info_url: Option<String>,
}

impl From<CsvRecord> for RawEntry {
    fn from(record: CsvRecord) -> Self {
        RawEntry {
            name: record.name,
            kind: record.kind,
            rotation: record.rotation,
            weight: record.weight.map(serde_json::Value::String),
            description: record.description,
            image: record.image.filter(|s| !s.is_empty()),
            more_info_url: record.more_info_url.filter(|s| !s.is_empty()),
        }
    }
}

// ============================================================================
// WEIGHT COERCION
// ============================================================================

/// Coerce a raw weight to a number.
///
/// Lossy on purpose: anything unparseable becomes 0 instead of failing the
/// load. Numbers and strings both follow `parseInt`: only the integer
/// part counts, so `20.5` and `"20.5g"` both read as 20.
pub fn coerce_weight(raw: Option<&serde_json::Value>) -> f64 {
    let parsed = match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).map(f64::trunc),
        Some(serde_json::Value::String(s)) => parse_int_prefix(s),
        _ => None,
    };

    match parsed {
        Some(weight) => weight,
        None => {
            if let Some(value) = raw {
                debug!(?value, "Malformed weight, defaulting to 0");
            }
            0.0
        }
    }
}

fn parse_int_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    digits[..end].parse::<f64>().ok().map(|v| sign * v)
}

// ============================================================================
// CATALOG ENTRY
// ============================================================================

/// CatalogEntry - one collectible item, immutable once loaded
///
/// `name` is the identity key used by ownership records and navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,

    /// Partition the entry was loaded from
    pub group: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub rotation: String,

    pub weight: f64,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(
        default,
        rename = "moreInfoUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub more_info_url: Option<String>,
}

impl CatalogEntry {
    /// Create an entry with the facet fields set
    pub fn new(name: &str, group: &str, kind: &str, rotation: &str, weight: f64) -> Self {
        CatalogEntry {
            name: name.to_string(),
            group: group.to_string(),
            kind: kind.to_string(),
            rotation: rotation.to_string(),
            weight,
            description: String::new(),
            image: None,
            more_info_url: None,
        }
    }

    /// Builder pattern: add description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Builder pattern: add image reference
    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    /// Builder pattern: add "more info" link
    pub fn with_more_info_url(mut self, url: &str) -> Self {
        self.more_info_url = Some(url.to_string());
        self
    }

    /// Tag a raw record with its partition label.
    ///
    /// Returns `None` when the record has no usable name.
    pub fn from_raw(raw: RawEntry, group: &str) -> Option<Self> {
        let name = raw.name.filter(|n| !n.trim().is_empty())?;
        let weight = coerce_weight(raw.weight.as_ref());

        Some(CatalogEntry {
            name,
            group: group.to_string(),
            kind: raw.kind.unwrap_or_default(),
            rotation: raw.rotation.unwrap_or_default(),
            weight,
            description: raw.description.unwrap_or_default(),
            image: raw.image,
            more_info_url: raw.more_info_url,
        })
    }
}

// ============================================================================
// PARTITION LOADER (I/O seam)
// ============================================================================

/// PartitionLoader - fetches the raw records of one partition
///
/// Implementations own all I/O and (de)serialization; the store only
/// sees already-decoded records.
#[async_trait]
pub trait PartitionLoader: Send + Sync {
    async fn load_partition(&self, label: &str) -> Result<Vec<RawEntry>>;
}

/// Reads `<data_dir>/<label>.json`, falling back to `<label>.csv`
///
/// File stems are the lowercased label (`MFB` → `mfb.json`).
pub struct DirectoryLoader {
    data_dir: PathBuf,
}

impl DirectoryLoader {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        DirectoryLoader {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl PartitionLoader for DirectoryLoader {
    async fn load_partition(&self, label: &str) -> Result<Vec<RawEntry>> {
        let stem = label.to_lowercase();
        let json_path = self.data_dir.join(format!("{}.json", stem));

        let has_json = tokio::fs::try_exists(&json_path)
            .await
            .with_context(|| format!("Failed to check {:?}", json_path))?;
        if has_json {
            let content = tokio::fs::read_to_string(&json_path)
                .await
                .with_context(|| format!("Failed to read {:?}", json_path))?;
            let records: Vec<RawEntry> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", json_path))?;
            return Ok(records);
        }

        let csv_path = self.data_dir.join(format!("{}.csv", stem));
        let content = tokio::fs::read_to_string(&csv_path)
            .await
            .with_context(|| format!("No data file for partition (tried {:?} and {:?})", json_path, csv_path))?;
        parse_csv(&content).with_context(|| format!("Failed to parse {:?}", csv_path))
    }
}

/// Parse a CSV partition with a header row
pub fn parse_csv(content: &str) -> Result<Vec<RawEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: CsvRecord = result.context("Failed to deserialize CSV record")?;
        records.push(record.into());
    }

    Ok(records)
}

// ============================================================================
// CATALOG STORE
// ============================================================================

/// CatalogStore - the merged, read-only catalog
///
/// Counts are derived from `entries` on demand, never stored.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl CatalogStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from ready-made entries, enforcing name uniqueness
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, LoadError> {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            if let Some(&first) = index.get(&entry.name) {
                return Err(LoadError::DuplicateName {
                    name: entry.name.clone(),
                    first: entries[first].group.clone(),
                    second: entry.group.clone(),
                });
            }
            index.insert(entry.name.clone(), position);
        }

        Ok(CatalogStore { entries, index })
    }

    /// Tag and concatenate partitions in the order given
    pub fn from_partitions(partitions: Vec<(String, Vec<RawEntry>)>) -> Result<Self, LoadError> {
        let mut entries = Vec::new();

        for (label, raws) in partitions {
            let before = entries.len();
            for (i, raw) in raws.into_iter().enumerate() {
                let entry = CatalogEntry::from_raw(raw, &label).ok_or_else(|| {
                    LoadError::MissingName {
                        partition: label.clone(),
                        index: i,
                    }
                })?;
                entries.push(entry);
            }
            debug!(partition = %label, count = entries.len() - before, "Partition merged");
        }

        Self::from_entries(entries)
    }

    /// Fetch every partition concurrently and merge them.
    ///
    /// Any failing partition aborts the whole load.
    pub async fn load<L, S>(loader: &L, labels: &[S]) -> Result<Self, LoadError>
    where
        L: PartitionLoader + ?Sized,
        S: AsRef<str>,
    {
        Self::load_with_timeout(loader, labels, None).await
    }

    /// Same as `load`, with an optional limit on each partition fetch
    pub async fn load_with_timeout<L, S>(
        loader: &L,
        labels: &[S],
        timeout: Option<Duration>,
    ) -> Result<Self, LoadError>
    where
        L: PartitionLoader + ?Sized,
        S: AsRef<str>,
    {
        let fetches = labels.iter().map(|label| {
            let label = label.as_ref();
            async move {
                let fetch = loader.load_partition(label);
                let result = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, fetch).await {
                        Ok(result) => result.map_err(|e| LoadError::partition(label, format!("{:#}", e))),
                        Err(_) => Err(LoadError::Timeout {
                            partition: label.to_string(),
                            seconds: limit.as_secs(),
                        }),
                    },
                    None => fetch
                        .await
                        .map_err(|e| LoadError::partition(label, format!("{:#}", e))),
                };
                (label.to_string(), result)
            }
        });

        // Join barrier: results come back in request order
        let results = join_all(fetches).await;

        let mut partitions = Vec::with_capacity(results.len());
        for (label, result) in results {
            partitions.push((label, result?));
        }

        let store = Self::from_partitions(partitions)?;
        info!(
            entries = store.len(),
            partitions = labels.len(),
            "Catalog loaded"
        );
        Ok(store)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Position of an entry in catalog order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn count_in_group(&self, group: &str) -> usize {
        self.entries.iter().filter(|e| e.group == group).count()
    }

    /// Distinct groups in first-seen order
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !groups.contains(&entry.group.as_str()) {
                groups.push(&entry.group);
            }
        }
        groups
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(name: &str) -> RawEntry {
        RawEntry {
            name: Some(name.to_string()),
            kind: Some("Attaque".to_string()),
            rotation: Some("Droite".to_string()),
            weight: Some(json!("35")),
            ..Default::default()
        }
    }

    /// Loader whose partitions complete in reverse request order
    struct SlowFirstLoader;

    #[async_trait]
    impl PartitionLoader for SlowFirstLoader {
        async fn load_partition(&self, label: &str) -> Result<Vec<RawEntry>> {
            let delay = match label {
                "G1" => 30,
                "G2" => 10,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![raw(&format!("{}-a", label)), raw(&format!("{}-b", label))])
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl PartitionLoader for FailingLoader {
        async fn load_partition(&self, label: &str) -> Result<Vec<RawEntry>> {
            if label == "Broken" {
                anyhow::bail!("connection reset");
            }
            Ok(vec![raw(&format!("{}-a", label))])
        }
    }

    struct NeverLoader;

    #[async_trait]
    impl PartitionLoader for NeverLoader {
        async fn load_partition(&self, _label: &str) -> Result<Vec<RawEntry>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    #[test]
    fn test_coerce_weight() {
        assert_eq!(coerce_weight(Some(&json!(38))), 38.0);
        assert_eq!(coerce_weight(Some(&json!(20.0001))), 20.0);
        assert_eq!(coerce_weight(Some(&json!(-7.9))), -7.0);
        assert_eq!(coerce_weight(Some(&json!("45"))), 45.0);
        assert_eq!(coerce_weight(Some(&json!("  32.5g"))), 32.0);
        assert_eq!(coerce_weight(Some(&json!("-7"))), -7.0);
        assert_eq!(coerce_weight(Some(&json!("heavy"))), 0.0);
        assert_eq!(coerce_weight(Some(&json!(""))), 0.0);
        assert_eq!(coerce_weight(Some(&json!(null))), 0.0);
        assert_eq!(coerce_weight(Some(&json!(true))), 0.0);
        assert_eq!(coerce_weight(None), 0.0);
    }

    #[test]
    fn test_coerce_weight_same_bucket_for_string_and_number() {
        use crate::filter::WeightBucket;

        for (text, number) in [(json!("20.5"), json!(20.5)), (json!("40.9"), json!(40.9)), (json!("60"), json!(60.0))] {
            let from_text = coerce_weight(Some(&text));
            let from_number = coerce_weight(Some(&number));
            assert_eq!(from_text, from_number);
            assert_eq!(WeightBucket::for_weight(from_text), WeightBucket::for_weight(from_number));
        }
        assert_eq!(WeightBucket::for_weight(coerce_weight(Some(&json!(20.5)))), WeightBucket::UpTo20);
    }

    #[test]
    fn test_raw_entry_accepts_poids_alias() {
        let parsed: Vec<RawEntry> = serde_json::from_str(
            r#"[{"name": "Pegasus", "type": "Attaque", "rotation": "Droite", "poids": "40",
                 "description": "Storm", "moreInfoUrl": "https://example.org/pegasus"}]"#,
        )
        .unwrap();

        let entry = CatalogEntry::from_raw(parsed[0].clone(), "MFB").unwrap();
        assert_eq!(entry.group, "MFB");
        assert_eq!(entry.kind, "Attaque");
        assert_eq!(entry.weight, 40.0);
        assert_eq!(entry.more_info_url.as_deref(), Some("https://example.org/pegasus"));
        assert_eq!(entry.image, None);
    }

    #[test]
    fn test_from_raw_rejects_blank_name() {
        let mut record = raw("x");
        record.name = Some("   ".to_string());
        assert!(CatalogEntry::from_raw(record, "X").is_none());
        assert!(CatalogEntry::from_raw(RawEntry::default(), "X").is_none());
    }

    #[test]
    fn test_from_partitions_preserves_order_and_tags_group() {
        let store = CatalogStore::from_partitions(vec![
            ("G1".to_string(), vec![raw("a"), raw("b"), raw("c")]),
            ("G2".to_string(), vec![raw("d"), raw("e")]),
        ])
        .unwrap();

        let names: Vec<&str> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(store.count_in_group("G1"), 3);
        assert_eq!(store.count_in_group("G2"), 2);
        assert_eq!(store.count_in_group("G3"), 0);
        assert_eq!(store.groups(), vec!["G1", "G2"]);
        assert_eq!(store.get("d").unwrap().group, "G2");
        assert_eq!(store.index_of("c"), Some(2));
    }

    #[test]
    fn test_missing_name_is_load_error() {
        let result = CatalogStore::from_partitions(vec![(
            "G1".to_string(),
            vec![raw("a"), RawEntry::default()],
        )]);

        match result {
            Err(LoadError::MissingName { partition, index }) => {
                assert_eq!(partition, "G1");
                assert_eq!(index, 1);
            }
            other => panic!("expected MissingName, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_name_is_load_error() {
        let result = CatalogStore::from_partitions(vec![
            ("G1".to_string(), vec![raw("Dranzer")]),
            ("G2".to_string(), vec![raw("Dranzer")]),
        ]);

        assert!(matches!(
            result,
            Err(LoadError::DuplicateName { ref first, ref second, .. }) if first == "G1" && second == "G2"
        ));
    }

    #[tokio::test]
    async fn test_load_order_follows_request_not_completion() {
        let labels = ["G1", "G2", "G3"];
        let store = CatalogStore::load(&SlowFirstLoader, &labels).await.unwrap();

        let names: Vec<&str> = store.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["G1-a", "G1-b", "G2-a", "G2-b", "G3-a", "G3-b"]
        );
    }

    #[tokio::test]
    async fn test_single_partition_failure_aborts_load() {
        let labels = ["Ok", "Broken", "AlsoOk"];
        let result = CatalogStore::load(&FailingLoader, &labels).await;

        match result {
            Err(LoadError::Partition { partition, message }) => {
                assert_eq!(partition, "Broken");
                assert!(message.contains("connection reset"));
            }
            other => panic!("expected Partition error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_timeout() {
        let result =
            CatalogStore::load_with_timeout(&NeverLoader, &["X"], Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(LoadError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_directory_loader_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("burst.json"),
            r#"[{"name": "Valtryek", "type": "Attaque", "rotation": "Droite", "poids": 52}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("x.csv"),
            "name,type,rotation,poids,description,image,moreInfoUrl\n\
             Dran Sword,Attaque,Droite,33,Blade,,\n\
             Hells Scythe,Équilibre,Droite,abc,,,\n",
        )
        .unwrap();

        let loader = DirectoryLoader::new(dir.path());
        let store = CatalogStore::load(&loader, &["Burst", "X"]).await.unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("Valtryek").unwrap().weight, 52.0);
        assert_eq!(store.get("Dran Sword").unwrap().group, "X");
        assert_eq!(store.get("Dran Sword").unwrap().description, "Blade");
        assert_eq!(store.get("Hells Scythe").unwrap().weight, 0.0);
        assert_eq!(store.get("Hells Scythe").unwrap().image, None);
    }

    #[tokio::test]
    async fn test_directory_loader_missing_partition() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DirectoryLoader::new(dir.path());
        let result = CatalogStore::load(&loader, &["Bakuten"]).await;
        assert!(matches!(result, Err(LoadError::Partition { .. })));
    }

    #[tokio::test]
    async fn test_directory_loader_surfaces_lookup_errors() {
        // A data dir that is a plain file makes the .json lookup fail with
        // ENOTDIR rather than "not found"
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("data");
        std::fs::write(&not_a_dir, "").unwrap();

        let loader = DirectoryLoader::new(&not_a_dir);
        let err = loader.load_partition("Bakuten").await.unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Failed to check"), "{}", message);
        assert!(!message.contains("No data file"), "{}", message);
    }
}
