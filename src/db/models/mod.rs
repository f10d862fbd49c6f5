mod analysis;
mod device;
mod photo;
mod reading;
mod report;

pub use analysis::{CropAnalysis, WaterAnalysis};
pub use device::{Device, DeviceStatusUpdate, NewDevice};
pub use photo::GrowthPhoto;
pub use reading::SensorReading;
pub use report::{HarvestJournal, JournalContent, JournalEntry, WeeklyReport};
