use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::error::PipelineError;

/// Context forwarded to the external vision-analysis service alongside
/// the capture image.
#[derive(Debug, Clone)]
pub struct CropDispatch {
    pub device_id: i64,
    pub image: Vec<u8>,
    pub days_grown: i64,
    pub avg_temp: f64,
    pub avg_humidity: f64,
    pub total_lux: f64,
    pub water_ph: f64,
}

/// At-most-once, best-effort dispatch toward the vision service. No
/// retry: a failed dispatch means the cycle silently does not complete
/// until an external trigger re-captures.
#[async_trait]
pub trait AnalysisDispatch: Send + Sync {
    async fn dispatch_crop(&self, request: CropDispatch) -> Result<(), PipelineError>;
}

pub struct HttpAnalysisClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AnalysisDispatch for HttpAnalysisClient {
    async fn dispatch_crop(&self, request: CropDispatch) -> Result<(), PipelineError> {
        let image_part = Part::bytes(request.image)
            .file_name("capture.jpg")
            .mime_str("image/jpeg")
            .map_err(|err| PipelineError::ExternalService(err.to_string()))?;

        let form = Form::new()
            .part("image", image_part)
            .text("device_id", request.device_id.to_string())
            .text("days_grown", request.days_grown.to_string())
            .text("avg_temp", request.avg_temp.to_string())
            .text("avg_hum", request.avg_humidity.to_string())
            .text("total_lux", request.total_lux.to_string())
            .text("water_ph", request.water_ph.to_string());

        let url = format!("{}/analyze/crop", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| PipelineError::ExternalService(err.to_string()))?;

        response
            .error_for_status()
            .map_err(|err| PipelineError::ExternalService(err.to_string()))?;

        Ok(())
    }
}
