use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_optional_datetime, parse_datetime, row_error},
    models::{Device, DeviceStatusUpdate, NewDevice},
};

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    let started_at_raw: Option<String> = row.get(4)?;
    let created_at_raw: String = row.get(9)?;

    let started_at =
        parse_optional_datetime(started_at_raw, "started_at").map_err(row_error)?;
    let created_at = parse_datetime(&created_at_raw, "created_at").map_err(row_error)?;

    Ok(Device {
        device_id: row.get(0)?,
        serial_number: row.get(1)?,
        name: row.get(2)?,
        crop_kind: row.get(3)?,
        started_at,
        one_liner: row.get(5)?,
        growth_level: row.get(6)?,
        risk_score: row.get(7)?,
        expected_harvest_date: row.get(8)?,
        created_at,
    })
}

const DEVICE_COLUMNS: &str = "device_id, serial_number, name, crop_kind, started_at, \
     one_liner, growth_level, risk_score, expected_harvest_date, created_at";

impl Database {
    pub async fn insert_device(&self, device: &NewDevice) -> Result<i64> {
        let record = device.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO devices (serial_number, name, crop_kind, started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.serial_number,
                    record.name,
                    record.crop_kind,
                    record.started_at.map(|dt| dt.to_rfc3339()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert device")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_device(&self, device_id: i64) -> Result<Option<Device>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices WHERE device_id = ?1"
            ))?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(device_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn get_device_by_serial(&self, serial: &str) -> Result<Option<Device>> {
        let serial = serial.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices WHERE serial_number = ?1"
            ))?;
            let mut rows = stmt.query(params![serial])?;
            match rows.next()? {
                Some(row) => Ok(Some(device_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Overwrite the single latest-photo slot. Runs on every capture,
    /// regardless of classification.
    pub async fn update_latest_photo(&self, device_id: i64, image: Vec<u8>) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE devices SET last_photo = ?1 WHERE device_id = ?2",
                params![image, device_id],
            )
            .with_context(|| "failed to update latest photo")?;
            Ok(())
        })
        .await
    }

    /// Cached latest-photo bytes, backing the image retrieval endpoint.
    pub async fn latest_photo_bytes(&self, device_id: i64) -> Result<Option<Vec<u8>>> {
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare("SELECT last_photo FROM devices WHERE device_id = ?1")?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => Ok(row.get::<_, Option<Vec<u8>>>(0)?),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn update_device_status(
        &self,
        device_id: i64,
        update: &DeviceStatusUpdate,
    ) -> Result<()> {
        let update = update.clone();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE devices
                 SET one_liner = ?1,
                     growth_level = ?2,
                     risk_score = ?3,
                     expected_harvest_date = ?4
                 WHERE device_id = ?5",
                params![
                    update.one_liner,
                    update.growth_level,
                    update.risk_score,
                    update.expected_harvest_date,
                    device_id,
                ],
            )
            .with_context(|| "failed to update device status")?;
            Ok(())
        })
        .await
    }
}
