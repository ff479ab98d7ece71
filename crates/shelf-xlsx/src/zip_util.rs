use std::io::{Read, Seek};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::read::ReadError;

/// Maximum uncompressed size permitted for a single ZIP part inflated into memory.
///
/// Guards against ZIP bombs and forged `uncompressed_size` metadata.
pub(crate) const MAX_ZIP_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Compares OPC part names, tolerating leading separators, backslashes and ASCII case.
pub(crate) fn part_names_equivalent(a: &str, b: &str) -> bool {
    fn normalize(name: &str) -> String {
        name.trim_start_matches(['/', '\\'])
            .replace('\\', "/")
            .to_ascii_lowercase()
    }
    normalize(a) == normalize(b)
}

/// Resolves a relationship `Target` against the part that owns the relationship.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => {
            let base = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
            format!("{base}/{target}")
        }
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Reads a part by name, returning `None` when it is absent.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, ReadError> {
    let index = match archive.index_for_name(name) {
        Some(index) => index,
        None => {
            let found = archive
                .file_names()
                .find(|candidate| part_names_equivalent(candidate, name))
                .map(str::to_owned);
            match found.and_then(|found| archive.index_for_name(&found)) {
                Some(index) => index,
                None => return Ok(None),
            }
        }
    };

    let file = match archive.by_index(index) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if file.is_dir() {
        return Ok(None);
    }
    if file.size() > MAX_ZIP_PART_BYTES {
        return Err(ReadError::PartTooLarge {
            part: name.to_string(),
            size: file.size(),
        });
    }

    let mut buf = Vec::with_capacity(file.size() as usize);
    // The declared size can lie; cap what we actually inflate.
    let read = file.take(MAX_ZIP_PART_BYTES + 1).read_to_end(&mut buf)?;
    if read as u64 > MAX_ZIP_PART_BYTES {
        return Err(ReadError::PartTooLarge {
            part: name.to_string(),
            size: read as u64,
        });
    }
    Ok(Some(buf))
}
