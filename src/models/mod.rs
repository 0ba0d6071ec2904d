pub mod location;
pub mod merchant;
pub mod message;
pub mod order;
pub mod product;
pub mod user;
pub mod zone;
