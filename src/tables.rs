//! Tab-separated input and output tables.

use crate::error::{ErrorCode, ResolveError, ResolveResult};
use crate::gene::{GeneId, ProbeId, Resolution};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::warn;

/// One row of a probe-to-candidate table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeRow {
    pub probe_id: ProbeId,
    pub ensembl_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRow {
    pub probe_id: ProbeId,
    pub ensembl_id: Option<GeneId>,
}

impl ResolvedRow {
    pub fn new(probe_id: ProbeId, resolution: &Resolution) -> Self {
        Self {
            probe_id,
            ensembl_id: resolution.gene().cloned(),
        }
    }
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

pub(crate) fn open_table_reader(path: &Path) -> ResolveResult<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| {
        ResolveError::new(
            ErrorCode::Io,
            format!("Could not open table '{}': {e}", path.display()),
        )
    })?;
    if is_gzip_path(path) {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub(crate) fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader)
}

/// Header names must match exactly. A missing optional column would read as `None`.
pub(crate) fn require_columns<R: Read>(
    rdr: &mut csv::Reader<R>,
    columns: &[&str],
) -> ResolveResult<()> {
    let headers = rdr.headers()?;
    let missing = columns
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .copied()
        .collect::<Vec<_>>();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ResolveError::invalid_input(format!(
            "Table is missing column(s): {}",
            missing.join(", ")
        )))
    }
}

/// Reads probe rows in file order. Rows without a gene id are kept with
/// `ensembl_id: None` and logged, so the probe still shows up in the output.
pub fn read_probe_rows<R: Read>(reader: R) -> ResolveResult<Vec<ProbeRow>> {
    let mut rdr = tsv_reader(reader);
    require_columns(&mut rdr, &["probe_id", "ensembl_id"])?;
    let mut rows = Vec::new();
    for (line, record) in rdr.deserialize::<ProbeRow>().enumerate() {
        let mut row = record?;
        row.ensembl_id = row
            .ensembl_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if row.ensembl_id.is_none() {
            warn!(probe_id = %row.probe_id, line = line + 2, "probe row without gene id");
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_probe_rows_from_path(path: &Path) -> ResolveResult<Vec<ProbeRow>> {
    read_probe_rows(open_table_reader(path)?).map_err(|e| {
        ResolveError::new(e.code, format!("Could not read '{}': {}", path.display(), e.message))
    })
}

pub fn write_resolved<W: std::io::Write>(writer: W, rows: &[ResolvedRow]) -> ResolveResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(["probe_id", "ensembl_id"])?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_resolved_to_path(path: &Path, rows: &[ResolvedRow]) -> ResolveResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ResolveError::new(
                    ErrorCode::Io,
                    format!("Could not create output directory for '{}': {e}", path.display()),
                )
            })?;
        }
    }
    let file = File::create(path)?;
    write_resolved(file, rows)
}
