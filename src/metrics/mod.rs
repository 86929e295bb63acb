pub mod emitter;
pub mod sample;

pub use emitter::{default_host_tag, EmitError, MetricSink, UdpEmitter};
pub use sample::{FieldValue, MetricSample};
