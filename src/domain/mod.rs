// Domain layer: data model, run report and ports. No I/O here.

pub mod model;
pub mod ports;
pub mod report;
