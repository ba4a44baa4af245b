pub mod audit;
pub mod extraction;
pub mod gemini;
pub mod ingest;
pub mod permissions;
pub mod review;
pub mod secrets;
pub mod state;
pub mod validation;
