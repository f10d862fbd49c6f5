mod crop_analyses;
mod devices;
mod photos;
mod reports;
mod sensor_readings;
mod water_analyses;
