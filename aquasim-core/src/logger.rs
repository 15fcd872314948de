use crate::error::SimError;
use crate::events::{EventEnvelope, EventPublisher, Topic};
use csv::Writer;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    batch_number: &'a str,
    day_number: u32,
    date: String,
    topic: String,
    payload_json: String,
}

/// Appends every event of a run to one CSV file, with the payload kept as a
/// JSON column. Doubles as an `EventPublisher` so the orchestrator can wire
/// it in as the outbound hook.
pub struct EventCsvLogger {
    writer: Mutex<Writer<fs::File>>,
}

impl EventCsvLogger {
    pub fn new(path: &Path) -> Result<Self, SimError> {
        let writer = Writer::from_path(path)
            .map_err(|e| SimError::CsvError(path.display().to_string(), e))?;
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn log_envelope(&self, envelope: &EventEnvelope) -> Result<(), SimError> {
        let payload_json = serde_json::to_string(&envelope.payload)?;
        let topic = envelope
            .payload
            .topic()
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|| "internal".to_string());
        let row = EventRow {
            batch_number: &envelope.batch_number,
            day_number: envelope.day_number,
            date: envelope.date.to_string(),
            topic,
            payload_json,
        };
        let mut writer = self.writer.lock();
        writer
            .serialize(row)
            .map_err(|e| SimError::CsvError("event log".to_string(), e))?;
        Ok(())
    }

    pub fn log_all(&self, envelopes: &[EventEnvelope]) -> Result<(), SimError> {
        for envelope in envelopes {
            self.log_envelope(envelope)?;
        }
        self.flush()
    }
}

impl EventPublisher for EventCsvLogger {
    fn publish(&self, _topic: Topic, envelope: &EventEnvelope) -> Result<(), SimError> {
        self.log_envelope(envelope)
    }

    fn flush(&self) -> Result<(), SimError> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| SimError::FileIO("event log".to_string(), e))
    }
}
