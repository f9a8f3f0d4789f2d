use anyhow::{bail, Context, Result};
use std::io::Read;

use crate::data::Frame;

/// Read a labeled Frame from CSV. The first record supplies the headers.
pub fn read_frame<R: Read>(reader: R) -> Result<Frame> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.context("failed to parse CSV record")?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    if rows.is_empty() {
        bail!("CSV input must contain at least one data row");
    }

    Frame::new(headers, rows)
}

pub fn read_frame_from_stdin() -> Result<Frame> {
    read_frame(std::io::stdin().lock())
}
