use std::fs;
use std::io;
use std::path::Path;

/// Decide whether `source` has to be (re)converted into `destination`.
///
/// A missing destination always needs conversion. Otherwise the source must be
/// strictly newer; identical modification times count as up to date.
pub fn needs_conversion(source: &Path, destination: &Path) -> io::Result<bool> {
    let dst_modified = match fs::metadata(destination) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let src_modified = fs::metadata(source)?.modified()?;
    Ok(src_modified > dst_modified)
}
