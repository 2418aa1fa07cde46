pub mod authorization;
pub mod product;
pub mod seller;
pub mod supplier;
