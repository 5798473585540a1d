pub mod proxy;
pub mod resource;
pub mod source;
