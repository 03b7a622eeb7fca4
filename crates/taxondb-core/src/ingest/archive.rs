use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::config::IngestConfig;
use crate::models::{NameRecord, NodeRecord};

use super::dump::{parse_names, parse_nodes};
use super::error::IngestError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Node and name rows extracted from one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxDump {
    pub nodes: Vec<NodeRecord>,
    pub names: Vec<NameRecord>,
}

/// Reads the node and name members out of a taxdump tarball.
///
/// Gzip compression is detected from the leading bytes, so a plain tar works
/// too. Members are matched by file name regardless of directory.
pub fn read_taxdump(bytes: &[u8], config: &IngestConfig) -> Result<TaxDump, IngestError> {
    let reader: Box<dyn Read + '_> = if bytes.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };

    let mut nodes = None;
    let mut names = None;
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let member = entry
            .path()?
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        match member.as_deref() {
            Some(m) if m == config.nodes_file => {
                debug!("Reading {} from archive", m);
                nodes = Some(parse_nodes(BufReader::new(&mut entry), &config.nodes_file)?);
            }
            Some(m) if m == config.names_file => {
                debug!("Reading {} from archive", m);
                names = Some(parse_names(
                    BufReader::new(&mut entry),
                    &config.names_file,
                    &config.name_class,
                )?);
            }
            _ => {}
        }

        if nodes.is_some() && names.is_some() {
            break;
        }
    }

    Ok(TaxDump {
        nodes: nodes.ok_or_else(|| missing_member(&config.nodes_file))?,
        names: names.ok_or_else(|| missing_member(&config.names_file))?,
    })
}

/// Reads a taxdump archive from disk.
pub fn read_taxdump_file(
    path: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<TaxDump, IngestError> {
    let bytes = std::fs::read(path)?;
    read_taxdump(&bytes, config)
}

fn missing_member(file: &str) -> IngestError {
    IngestError::parse(file, 0, "member not found in archive")
}
