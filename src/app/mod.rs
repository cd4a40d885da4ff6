pub mod cancel;
pub mod capture;
pub mod controller;
pub mod display;

pub use cancel::CancelToken;
pub use controller::PipelineController;
