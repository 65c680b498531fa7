// Road service - Use case for deciding which roads to monitor
use crate::application::road_directory::RoadDirectory;
use crate::domain::road::{RoadId, dedup_roads};
use std::sync::Arc;

#[derive(Clone)]
pub struct RoadService {
    directory: Arc<dyn RoadDirectory>,
    fallback: Vec<RoadId>,
}

impl RoadService {
    pub fn new(directory: Arc<dyn RoadDirectory>, fallback: Vec<String>) -> Self {
        Self {
            directory,
            fallback: fallback.into_iter().map(RoadId::from).collect(),
        }
    }

    /// Roads from the directory, or the demo list when the directory is unavailable.
    pub async fn list_roads(&self) -> Vec<RoadId> {
        match self.directory.list_road_names().await {
            Ok(names) => {
                let roads: Vec<RoadId> = names
                    .into_iter()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .map(RoadId::from)
                    .collect();
                dedup_roads(&roads)
            }
            Err(e) => {
                tracing::warn!(error = %e, fallback = self.fallback.len(), "road discovery failed, using demo roads");
                self.fallback.clone()
            }
        }
    }
}
