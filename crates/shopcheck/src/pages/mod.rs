//! Page objects.

pub mod repo;
pub mod shop;

pub use repo::RepoPage;
pub use shop::ShoppingPage;
