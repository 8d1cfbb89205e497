use std::io::Write;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ErrorKind, Result};

/// A node or way after shaping: flat tag fields plus the nested `created`,
/// `address`, `pos` and `node_refs` fields, ready to be written to a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapedRecord {
    fields: Map<String, Value>,
}

impl ShapedRecord {
    pub fn from_fields(fields: Map<String, Value>) -> ShapedRecord {
        ShapedRecord { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }
}

/// Destination for shaped records. Errors returned by a sink are never swallowed.
pub trait RecordSink {
    fn accept(&mut self, record: ShapedRecord) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<ShapedRecord> {
    fn accept(&mut self, record: ShapedRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Writes one JSON document per record. Pretty output spans several lines per
/// record and is meant for reading, not for reloading.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W, pretty: bool) -> JsonLinesSink<W> {
        JsonLinesSink { writer, pretty }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn accept(&mut self, record: ShapedRecord) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &record)?;
        } else {
            serde_json::to_writer(&mut self.writer, &record)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}

/// Pushes every record into `sink` and returns how many were accepted.
///
/// With `strict` unset, elements that could not be shaped because they lack a
/// required attribute are logged and skipped. Any other error, including every
/// error raised by the sink itself, aborts the run.
pub fn drain_records<I, S>(records: I, sink: &mut S, strict: bool) -> Result<usize>
where
    I: IntoIterator<Item = Result<ShapedRecord>>,
    S: RecordSink + ?Sized,
{
    let mut accepted = 0;
    let mut skipped = 0;
    for record in records {
        match record {
            Ok(record) => {
                sink.accept(record)?;
                accepted += 1;
            },
            Err(err) if !strict && err.kind == ErrorKind::MissingRequiredAttribute => {
                warn!(err = err.message.as_str(); "Skipping element that cannot be shaped");
                skipped += 1;
            },
            Err(err) => return Err(err),
        }
    }
    sink.finish()?;
    if skipped > 0 {
        warn!(skipped = skipped, accepted = accepted; "Some elements were skipped");
    }
    Ok(accepted)
}

/// Sink that rejects everything, for checking that failures propagate.
#[cfg(test)]
pub struct FailingSink;

#[cfg(test)]
impl RecordSink for FailingSink {
    fn accept(&mut self, _record: ShapedRecord) -> Result<()> {
        Err(crate::errors::Error::new(ErrorKind::Sink, "collection is read-only"))
    }
}
