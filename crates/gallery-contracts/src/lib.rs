pub mod bag;
pub mod events;
pub mod graph;
pub mod result;
pub mod trace;

pub use bag::{CanonicalField, MetadataBag};
pub use events::{EventLog, GalleryEvent};
pub use graph::{GenerationGraph, InputValue, Link, NodeRecord};
pub use result::ExtractionResult;
pub use trace::ExtractionTrace;
