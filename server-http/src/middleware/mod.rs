pub mod request_metrics;

pub use request_metrics::track_metrics;
