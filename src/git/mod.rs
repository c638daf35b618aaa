mod remote;
mod service;

pub use service::GitCloneService;
