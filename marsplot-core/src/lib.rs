pub mod axes;
pub mod config;
pub mod context;
pub mod dataset;
pub mod engine;
pub mod evaluate;
pub mod expression;
pub mod figure;
pub mod layout;
pub mod reference;
pub mod render;
pub mod request;
pub mod script;
pub mod template;

pub mod errors;
