//! Prompt extraction from image metadata.
//!
//! [`PromptExtractor`] reads a container, decodes the EXIF slots that tools
//! abuse for prompts, classifies every source into a [`MetadataBag`] and
//! picks the best prompt text. The gallery helpers and [`host::process`]
//! sit on top for directory browsing.
//!
//! [`MetadataBag`]: gallery_contracts::MetadataBag

pub mod classifier;
pub mod container;
pub mod decoder;
pub mod extractor;
pub mod gallery;
pub mod host;
pub mod positive;
pub mod resolver;
pub mod tiff;

pub use container::{ContainerError, ContainerMetadata, ContainerReader, FileContainerReader};
pub use extractor::{extract, PromptExtractor, NO_METADATA_MESSAGE, WORKFLOW_ONLY_MESSAGE};
pub use gallery::{
    list_images, make_thumbnail, select_image, thumbnail_or_original, DEFAULT_THUMBNAIL_SIZE,
};
pub use host::{process, HostRequest, HostResponse};
pub use resolver::{resolve, Resolved};
