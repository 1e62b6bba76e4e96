use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::record::SheetRecord;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup is not a valid sheet snapshot: {0}")]
    Format(#[from] serde_json::Error),
}

/// Writes a gzip-compressed JSON snapshot of `record`.
pub fn save_record(record: &SheetRecord, path: &Path) -> Result<(), BackupError> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serde_json::to_writer(&mut writer, record)?;
    writer.flush()?;
    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

pub fn load_record(path: &Path) -> Result<SheetRecord, BackupError> {
    let file = File::open(path)?;
    let reader = BufReader::new(GzDecoder::new(file));
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellAddress, CellValue};
    use crate::record::{RecordId, SheetData};
    use crate::view::SheetView;

    #[test]
    fn snapshot_survives_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.sheet.gz");
        let mut data = SheetData::blank(100);
        data.active_sheet = SheetView::Shipping;
        data.master_data = data
            .master_data
            .set_cell(SheetView::Shipping, CellAddress::new(3, 1), CellValue::text("P-77"))
            .unwrap();
        data.shipping_data.contract_number = "C-9".into();
        let record = SheetRecord {
            id: RecordId::from("r-1"),
            title: "Order".into(),
            data,
            created_at: "2025-01-01T00:00:00.000Z".into(),
            updated_at: "2025-01-02T00:00:00.000Z".into(),
        };

        save_record(&record, &path).unwrap();
        assert_eq!(load_record(&path).unwrap(), record);
    }

    #[test]
    fn garbage_is_a_format_or_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gz");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(load_record(&path).is_err());
        assert!(matches!(load_record(&dir.path().join("missing.gz")), Err(BackupError::Io(_))));
    }
}
