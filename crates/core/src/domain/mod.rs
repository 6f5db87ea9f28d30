pub mod conversation;
pub mod intent;
pub mod product;
pub mod recommendation;
pub mod ticket;
