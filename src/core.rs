pub mod reassembler;
pub mod route;
pub mod service;
pub mod session;
pub mod source;
pub mod stream;
pub mod upstream;
