// Domain layer - Pure business logic and entities
pub mod congestion;
pub mod history;
pub mod road;
pub mod stats;
pub mod telemetry;
