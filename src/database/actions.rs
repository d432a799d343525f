//! Operations consumed by the HTTP layer. Every function takes the store
//! last and is generic over the repository traits it needs.
mod catalog;
mod recipes;
mod relations;
mod shopping;
mod short_links;
mod subscriptions;
mod users;

pub use catalog::*;
pub use recipes::*;
pub use relations::*;
pub use shopping::*;
pub use short_links::*;
pub use subscriptions::*;
pub use users::*;
