//! Entity module - Contains all SeaORM entity definitions for the marketplace database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cart_item;
pub mod item;
pub mod item_rating;
pub mod message;
pub mod notification;
pub mod payment_transaction;
pub mod receipt;
pub mod security_deposit;
pub mod user;

// Re-export specific types to avoid conflicts
pub use cart_item::{Column as CartItemColumn, Entity as CartItem, Model as CartItemModel};
pub use item::{Column as ItemColumn, Entity as Item, Model as ItemModel};
pub use item_rating::{Column as ItemRatingColumn, Entity as ItemRating, Model as ItemRatingModel};
pub use message::{Column as MessageColumn, Entity as Message, Model as MessageModel};
pub use notification::{
    Column as NotificationColumn, Entity as Notification, Model as NotificationModel,
};
pub use payment_transaction::{
    Column as PaymentTransactionColumn, Entity as PaymentTransaction,
    Model as PaymentTransactionModel,
};
pub use receipt::{Column as ReceiptColumn, Entity as Receipt, Model as ReceiptModel};
pub use security_deposit::{
    Column as SecurityDepositColumn, Entity as SecurityDeposit, Model as SecurityDepositModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
