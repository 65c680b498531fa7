// Repository trait for road discovery
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("road directory request failed: {0}")]
    Request(String),
    #[error("road directory returned status {0}")]
    Status(u16),
    #[error("road directory response malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RoadDirectory: Send + Sync {
    /// Names of every road that currently has a camera and telemetry feed
    async fn list_road_names(&self) -> Result<Vec<String>, DirectoryError>;
}
