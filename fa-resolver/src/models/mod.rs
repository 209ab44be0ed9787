//! Data models for the annotation resolver

pub mod annotation;
pub mod link;

pub use annotation::{Annotation, AnnotationData, AnnotationDocument, AnnotationSet};
pub use link::ClassifiedLink;
