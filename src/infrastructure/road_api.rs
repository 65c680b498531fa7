// HTTP road directory implementation
use crate::application::road_directory::{DirectoryError, RoadDirectory};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct HttpRoadDirectory {
    url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RoadNamesResponse {
    #[serde(default)]
    road_names: Vec<String>,
}

impl HttpRoadDirectory {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RoadDirectory for HttpRoadDirectory {
    async fn list_road_names(&self) -> Result<Vec<String>, DirectoryError> {
        tracing::debug!("Fetching road names from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status().as_u16()));
        }

        let data = response
            .json::<RoadNamesResponse>()
            .await
            .map_err(|e| DirectoryError::Malformed(e.to_string()))?;

        tracing::debug!("Found {} roads", data.road_names.len());
        Ok(data.road_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_road_names_is_empty() {
        let data: RoadNamesResponse = serde_json::from_str("{}").unwrap();
        assert!(data.road_names.is_empty());

        let data: RoadNamesResponse =
            serde_json::from_str(r#"{"road_names":["Văn Phú","Văn Quán"]}"#).unwrap();
        assert_eq!(data.road_names, vec!["Văn Phú", "Văn Quán"]);
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_request_error() {
        let directory = HttpRoadDirectory::new("http://127.0.0.1:9/road_names".to_string());
        let result = directory.list_road_names().await;
        assert!(matches!(result, Err(DirectoryError::Request(_))));
    }
}
