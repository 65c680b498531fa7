// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod endpoint_resolver;
pub mod message_codec;
pub mod road_api;
pub mod ws_transport;
