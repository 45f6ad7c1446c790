//! Resource limits for the serving layer

pub mod limits;

pub use limits::{
    ConnectionError, ConnectionGuard, ConnectionMetrics, ConnectionTracker, RequestLimits,
    SizeError, SizeValidator,
};
