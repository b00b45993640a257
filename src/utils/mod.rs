pub mod runtime;
pub mod startup_banner;
pub mod timing;
