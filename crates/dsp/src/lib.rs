// PCM transforms applied between decoder and sink

pub mod downmix;
pub mod stretch;

pub use downmix::downmix_stereo_in_place;
pub use stretch::{StretchFactory, TimeStretch, Varispeed, VarispeedFactory};
