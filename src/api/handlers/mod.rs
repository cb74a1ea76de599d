pub mod proxy;
pub mod version;
