pub mod beats;
pub mod decode;
pub mod key;
pub mod spectrum;
