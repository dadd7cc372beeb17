pub mod article;
pub mod interaction;
pub mod loyalty;
pub mod user;

pub use article::Article;
pub use interaction::{Interaction, InteractionMetadata, InteractionType, NewInteraction};
pub use loyalty::{LoyaltyPointEntry, NewLoyaltyPointEntry, PointAction};
pub use user::User;
