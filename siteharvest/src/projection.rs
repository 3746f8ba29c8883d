//! Schema projection: reshaping records to the output column set.

use crate::extract::Record;

/// Projects one record onto `columns`: exactly those keys, in that order,
/// with absent fields as `None`. Fields outside `columns` are dropped.
#[must_use]
pub fn project_record<S: AsRef<str>>(record: &Record, columns: &[S]) -> Record {
    columns
        .iter()
        .map(|column| {
            let column = column.as_ref();
            (column, record.get(column).map(ToString::to_string))
        })
        .collect()
}

/// Projects every record onto `columns`, keeping record order.
#[must_use]
pub fn project<S: AsRef<str>>(records: &[Record], columns: &[S]) -> Vec<Record> {
    records
        .iter()
        .map(|record| project_record(record, columns))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionSchema, FieldSpec};
    use crate::driver::{HtmlPageDriver, StaticFetcher};
    use crate::extract::RecordExtractor;
    use pretty_assertions::assert_eq;

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (*k, v.map(ToString::to_string)))
            .collect()
    }

    #[test]
    fn test_projection_orders_fills_and_drops() {
        let source = vec![record(&[
            ("website", Some("https://acme.com")),
            ("name", Some("Acme")),
            ("internal_id", Some("42")),
        ])];

        let projected = project(&source, &["name", "phone", "website"]);

        assert_eq!(
            projected,
            vec![record(&[
                ("name", Some("Acme")),
                ("phone", None),
                ("website", Some("https://acme.com")),
            ])]
        );
    }

    #[test]
    fn test_projection_is_idempotent() {
        let source = vec![
            record(&[("b", Some("1")), ("x", Some("drop"))]),
            record(&[("a", Some("2"))]),
        ];
        let columns = ["a", "b", "c"];

        let once = project(&source, &columns);
        let twice = project(&once, &columns);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_projection_with_no_columns() {
        let projected = project(&[record(&[("a", Some("1"))])], &[] as &[&str]);
        assert_eq!(projected.len(), 1);
        assert!(projected[0].is_empty());
    }

    #[tokio::test]
    async fn test_acme_scenario() {
        let driver = HtmlPageDriver::new(StaticFetcher::new());
        driver.load_html(
            "https://directory.test/",
            r#"<div class="item"><h1>  Acme Corp </h1><a class="mail" href="mailto:info@acme.com">mail</a></div>"#,
        );
        let schema = ExtractionSchema::new(".item")
            .with_field("name", "h1")
            .with_field("email", FieldSpec::attribute("a.mail", "href"));

        let records = RecordExtractor::new(schema).extract(&driver).await.unwrap();
        let projected = project(&records, &["name", "email", "phone"]);

        assert_eq!(
            projected,
            vec![record(&[
                ("name", Some("Acme Corp")),
                ("email", Some("info@acme.com")),
                ("phone", None),
            ])]
        );
        assert_eq!(
            serde_json::to_string(&projected[0]).unwrap(),
            r#"{"name":"Acme Corp","email":"info@acme.com","phone":null}"#
        );
    }
}
