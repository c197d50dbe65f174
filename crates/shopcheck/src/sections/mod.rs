//! Section objects: one per region of the shop page.

pub mod cart;
pub mod product;
pub mod work_abroad;

pub use cart::{CartProduct, CartSection, QuantityFloor};
pub use product::{Product, ProductSection, SizeSweep};
pub use work_abroad::WorkAbroadSection;
