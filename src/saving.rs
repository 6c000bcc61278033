use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write `value` to `path` as a gzip-compressed bincode snapshot.
///
/// The snapshot is written to a sibling temp file first and renamed into
/// place, so a crash mid-write leaves the previous snapshot intact.
pub fn save_snapshot<T: Serialize>(value: &T, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, value).map_err(std::io::Error::other)?;

        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?.flush()?;
    }
    std::fs::rename(&tmp, path)
}

/// Read a snapshot written by [`save_snapshot`].
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> std::io::Result<T> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
