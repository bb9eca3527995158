// HTTP handlers, one module per resource.

pub mod images;
pub mod jobs;
pub mod status;
