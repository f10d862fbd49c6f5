use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, row_error},
    models::GrowthPhoto,
};

impl Database {
    pub async fn insert_growth_photo(&self, photo: &GrowthPhoto) -> Result<i64> {
        let record = photo.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO growth_photos (device_id, image_data, recorded_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.device_id,
                    record.image_data,
                    record.recorded_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert growth photo")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Full photo history for a device, oldest first.
    pub async fn photos_for_device(&self, device_id: i64) -> Result<Vec<GrowthPhoto>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT photo_id, device_id, image_data, recorded_at
                 FROM growth_photos
                 WHERE device_id = ?1
                 ORDER BY recorded_at ASC",
            )?;

            let photos_iter = stmt.query_map(params![device_id], |row| {
                let recorded_at_raw: String = row.get(3)?;
                Ok(GrowthPhoto {
                    photo_id: row.get(0)?,
                    device_id: row.get(1)?,
                    image_data: row.get(2)?,
                    recorded_at: parse_datetime(&recorded_at_raw, "recorded_at")
                        .map_err(row_error)?,
                })
            })?;

            let mut photos = Vec::new();
            for photo in photos_iter {
                photos.push(photo?);
            }
            Ok(photos)
        })
        .await
    }

    pub async fn photo_count(&self, device_id: i64) -> Result<i64> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM growth_photos WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }
}
