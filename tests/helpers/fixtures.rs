/// Record fixtures
///
/// Users keyed by `user_id`, with a numeric `visits` column and a text
/// `payload` column that is sometimes missing.
use dynamo_bulk::{
    ColumnKind, Error, KeyColumn, KeySpec, Record, RecordSource, Schema, Value, VecSource,
};

pub fn user_schema() -> Schema {
    Schema::default()
        .with_column("user_id", ColumnKind::Text)
        .with_column("visits", ColumnKind::Number)
        .with_column("payload", ColumnKind::Text)
}

pub fn user_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let payload = (i % 3 != 0).then(|| Value::text(format!("note {i}")));
            Record::new(vec![
                Some(Value::text(format!("user-{i:04}"))),
                Some(Value::number(i * 10)),
                payload,
            ])
        })
        .collect()
}

pub fn user_source(n: usize) -> VecSource {
    VecSource::new(user_schema(), user_records(n))
}

/// Source whose record at `missing` has no `user_id`
pub fn keyed_source(n: usize, missing: usize) -> VecSource {
    let mut records = user_records(n);
    records[missing] = Record::new(vec![None, Some(Value::number(1)), None]);
    VecSource::new(user_schema(), records)
}

pub fn key_spec() -> KeySpec {
    KeySpec::hash(KeyColumn::new("user_id"))
}

/// Source yielding `good` user records, then a read failure
#[derive(Debug)]
pub struct FailingSource {
    schema: Schema,
    records: std::vec::IntoIter<Record>,
    good: usize,
    failed: bool,
}

impl FailingSource {
    pub fn new(good: usize) -> Self {
        Self {
            schema: user_schema(),
            records: user_records(good).into_iter(),
            good,
            failed: false,
        }
    }
}

impl Iterator for FailingSource {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.records.next() {
            Some(record) => Some(Ok(record)),
            None if !self.failed => {
                self.failed = true;
                Some(Err(Error::Source {
                    record: self.good,
                    reason: "unexpected end of file".to_string(),
                }))
            }
            None => None,
        }
    }
}

impl RecordSource for FailingSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}
