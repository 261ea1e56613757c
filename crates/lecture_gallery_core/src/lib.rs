pub mod domain;
pub mod ports;

pub use domain::{
    CurrentUser, EncodedImage, FacingMode, Frame, NewPhoto, PhotoFilter, PhotoRecord,
    StreamConstraints, Subject, SUBJECTS,
};
pub use ports::{
    CaptureDevice, ConfirmationPrompt, IdentityService, MediaStream, PhotoFeed, PhotoStore,
    PortError, PortResult,
};
