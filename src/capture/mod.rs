pub mod aggregator;
pub mod record;

pub use aggregator::{compact, FlowAggregate, FlowKey, FlowMap};
pub use record::{compact_protocols, is_local_ip, parse_line, stamp_line, CaptureRecord, ClassifiedPacket};
