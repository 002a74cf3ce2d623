use std::io::Write;

use crate::models::AuditRecord;

/// Serializes records with the canonical header set, readable by the loader.
pub fn write_csv<W: Write>(records: &[AuditRecord], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_csv_bytes(records: &[AuditRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    Ok(buffer)
}
