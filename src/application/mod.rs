// Application layer - Use cases and the live stream core
pub mod backoff;
pub mod connection_manager;
pub mod frame_assets;
pub mod history_aggregator;
pub mod orchestrator;
pub mod road_directory;
pub mod road_service;
pub mod stream_transport;

#[cfg(test)]
pub mod testing;
