//! Records and the per-page record extractor.

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use super::field::extract_field;
use crate::config::ExtractionSchema;
use crate::driver::PageDriver;
use crate::errors::Result;

/// One extracted item: field names mapped to optional values, in insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty record with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Sets a field, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Value of a field; `None` when the field is absent or null.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Whether the record carries the field, null or not.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Field values in order.
    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields.iter().map(|(_, value)| value.as_deref())
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether every field is null.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_none())
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Ordered, append-only accumulation of records for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    records: Vec<Record>,
}

impl ResultSet {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends records, keeping their order.
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read access to the records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the set.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Maps every item element of the current page state to a [`Record`].
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    schema: ExtractionSchema,
}

impl RecordExtractor {
    /// Creates an extractor for `schema`.
    #[must_use]
    pub fn new(schema: ExtractionSchema) -> Self {
        Self { schema }
    }

    /// The schema applied to every item.
    #[must_use]
    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    /// Extracts one record per element matching the item selector, in
    /// document order. Items whose fields are all missing still produce a
    /// record.
    pub async fn extract(&self, driver: &dyn PageDriver) -> Result<Vec<Record>> {
        let items = driver
            .query_selector_all(None, &self.schema.item_selector)
            .await?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let mut record = Record::with_capacity(self.schema.fields.len());
            for (name, spec) in &self.schema.fields {
                let value = extract_field(driver, item, spec).await?;
                record.insert(name.clone(), value);
            }
            records.push(record);
        }

        debug!(
            item_selector = %self.schema.item_selector,
            records = records.len(),
            "Extracted page"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;
    use crate::driver::{HtmlPageDriver, StaticFetcher};
    use pretty_assertions::assert_eq;

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (*k, v.map(ToString::to_string)))
            .collect()
    }

    #[test]
    fn test_record_insert_replaces_in_place() {
        let mut rec = Record::new();
        rec.insert("a", Some("1".to_string()));
        rec.insert("b", None);
        rec.insert("a", Some("2".to_string()));

        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(rec.get("a"), Some("2"));
        assert_eq!(rec.get("b"), None);
        assert!(rec.contains_key("b"));
        assert!(!rec.contains_key("c"));
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn test_record_serializes_in_order_with_nulls() {
        let rec = record(&[("zeta", Some("z")), ("alpha", None)]);
        assert_eq!(
            serde_json::to_string(&rec).unwrap(),
            r#"{"zeta":"z","alpha":null}"#
        );
    }

    #[test]
    fn test_result_set_appends() {
        let mut set = ResultSet::new();
        assert!(set.is_empty());
        set.extend(vec![record(&[("n", Some("1"))])]);
        set.extend(vec![record(&[("n", Some("2"))]), record(&[("n", Some("3"))])]);

        let values: Vec<_> = set.records().iter().map(|r| r.get("n")).collect();
        assert_eq!(values, vec![Some("1"), Some("2"), Some("3")]);
        assert_eq!(set.into_records().len(), 3);
    }

    #[tokio::test]
    async fn test_extract_one_record_per_item() {
        let driver = HtmlPageDriver::new(StaticFetcher::new());
        driver.load_html(
            "https://site.test/",
            r#"
            <ul>
              <li class="item"><h1>  Acme Corp </h1><a class="mail" href="mailto:info@acme.com">m</a></li>
              <li class="item"><h1>Globex</h1></li>
              <li class="item"><span>nothing useful</span></li>
            </ul>
            "#,
        );
        let schema = ExtractionSchema::new("li.item")
            .with_field("name", "h1")
            .with_field("email", FieldSpec::attribute("a.mail", "href"));

        let records = RecordExtractor::new(schema).extract(&driver).await.unwrap();

        assert_eq!(
            records,
            vec![
                record(&[("email", Some("info@acme.com")), ("name", Some("Acme Corp"))]),
                record(&[("email", None), ("name", Some("Globex"))]),
                record(&[("email", None), ("name", None)]),
            ]
        );
        assert!(records[2].is_blank());
    }

    #[tokio::test]
    async fn test_no_items_no_records() {
        let driver = HtmlPageDriver::new(StaticFetcher::new());
        driver.load_html("https://site.test/", "<p>empty</p>");
        let records = RecordExtractor::new(ExtractionSchema::new(".item").with_field("x", "b"))
            .extract(&driver)
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
