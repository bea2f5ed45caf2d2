pub mod latency;
pub mod live;
