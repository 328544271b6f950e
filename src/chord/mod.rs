pub mod chroma;
pub mod matcher;
pub mod pipeline;
pub mod sync;
pub mod templates;
