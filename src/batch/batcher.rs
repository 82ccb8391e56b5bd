use super::Batch;
use crate::error::Error;
use crate::record::Record;

/// Item limit of a single `BatchWriteItem` request
pub const MAX_BATCH: usize = 25;

/// Check that `batch_size` is within `1..=MAX_BATCH`
pub fn validate_batch_size(batch_size: usize) -> Result<(), Error> {
    if batch_size == 0 || batch_size > MAX_BATCH {
        return Err(Error::Configuration(format!(
            "batch size must be between 1 and {MAX_BATCH}, got {batch_size}"
        )));
    }
    Ok(())
}

/// Lazily groups records into batches of at most `batch_size`
///
/// Order is preserved and only the last batch may be shorter. A record source
/// error is yielded once, after which the batcher is exhausted. Records
/// already read into the batch being filled when the error arrives are
/// dropped: a failed read never sends a partial batch, so everything from the
/// first record of that batch onward is left unapplied.
#[derive(Debug)]
pub struct Batcher<I> {
    records: I,
    batch_size: usize,
    next_index: usize,
    next_record: usize,
    done: bool,
}

impl<I> Batcher<I>
where
    I: Iterator<Item = Result<Record, Error>>,
{
    /// Create a batcher. The size is validated here, before any record is read
    pub fn new(records: I, batch_size: usize) -> Result<Self, Error> {
        validate_batch_size(batch_size)?;

        Ok(Self {
            records,
            batch_size,
            next_index: 0,
            next_record: 0,
            done: false,
        })
    }
}

impl<I> Iterator for Batcher<I>
where
    I: Iterator<Item = Result<Record, Error>>,
{
    type Item = Result<Batch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.records.next() {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if records.is_empty() {
            return None;
        }

        let batch = Batch {
            index: self.next_index,
            first_record: self.next_record,
            records,
        };
        self.next_index += 1;
        self.next_record += batch.len();

        Some(Ok(batch))
    }
}
