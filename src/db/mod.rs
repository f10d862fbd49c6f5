mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    CropAnalysis, Device, DeviceStatusUpdate, GrowthPhoto, HarvestJournal, JournalContent,
    JournalEntry, NewDevice, SensorReading, WaterAnalysis, WeeklyReport,
};
