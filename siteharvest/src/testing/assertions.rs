//! Test assertions for extracted and projected records.

use crate::extract::Record;

/// Values of `column` across `records`, in order.
#[must_use]
pub fn column_values<'a>(records: &'a [Record], column: &str) -> Vec<Option<&'a str>> {
    records.iter().map(|record| record.get(column)).collect()
}

/// Asserts that every record has exactly `columns`, in that order.
pub fn assert_columns(records: &[Record], columns: &[&str]) {
    for (index, record) in records.iter().enumerate() {
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(
            keys, columns,
            "Record {index} has columns {keys:?}, expected {columns:?}"
        );
    }
}

/// Asserts the values of `column` across `records`.
pub fn assert_column_values(records: &[Record], column: &str, expected: &[Option<&str>]) {
    let actual = column_values(records, column);
    assert_eq!(
        actual, expected,
        "Unexpected values for column '{column}'"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Record> {
        vec![
            [("a", Some("1".to_string())), ("b", None)].into_iter().collect(),
            [("a", None), ("b", Some("2".to_string()))].into_iter().collect(),
        ]
    }

    #[test]
    fn test_column_values() {
        assert_eq!(column_values(&sample(), "a"), vec![Some("1"), None]);
        assert_eq!(column_values(&sample(), "missing"), vec![None, None]);
    }

    #[test]
    fn test_assert_columns_passes() {
        assert_columns(&sample(), &["a", "b"]);
        assert_column_values(&sample(), "b", &[None, Some("2")]);
    }

    #[test]
    #[should_panic(expected = "expected [\"b\", \"a\"]")]
    fn test_assert_columns_checks_order() {
        assert_columns(&sample(), &["b", "a"]);
    }
}
