pub mod apply;
pub mod check;
pub mod destroy;
pub mod plan;
pub mod read;
