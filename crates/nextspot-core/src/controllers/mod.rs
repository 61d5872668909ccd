pub mod session_controller;


pub use session_controller::{
    ConfigOutcome, GatedAction, STREAM_FAULT_MESSAGE, SendOutcome, SendRejection,
    SessionController, SessionEvent, SessionSnapshot, StreamStatus, UploadReport,
};
