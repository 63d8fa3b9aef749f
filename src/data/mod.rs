//! Analysis pipeline and record storage.
pub mod fft;
pub mod intensity;
pub mod maintenance;
pub mod replay;
pub mod shindo;
pub mod storage;
pub mod window;
