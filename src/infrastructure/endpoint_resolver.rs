// Endpoint resolver backed by configured URL templates
use crate::application::stream_transport::{Endpoint, EndpointResolver, ResolveError};
use crate::domain::road::{RoadId, StreamKind};
use crate::infrastructure::config::{StreamSettings, prepare_template};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TemplateResolver {
    telemetry_url: String,
    frame_url: String,
}

impl TemplateResolver {
    pub fn new(telemetry_url: String, frame_url: String) -> Self {
        Self {
            telemetry_url,
            frame_url,
        }
    }

    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self::new(settings.telemetry_url.clone(), settings.frame_url.clone())
    }
}

impl EndpointResolver for TemplateResolver {
    fn resolve(&self, road: &RoadId, kind: StreamKind) -> Result<Endpoint, ResolveError> {
        let template = match kind {
            StreamKind::Telemetry => &self.telemetry_url,
            StreamKind::Frame => &self.frame_url,
        };
        if template.trim().is_empty() {
            return Err(ResolveError::Missing(kind));
        }

        let mut vars = HashMap::new();
        vars.insert("road".to_string(), urlencoding::encode(road.as_str()).into_owned());
        let url = prepare_template(template, &vars);

        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ResolveError::NotPushCapable(url));
        }
        Ok(Endpoint { url })
    }
}
