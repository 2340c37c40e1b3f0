pub mod facility;
pub mod payment;
pub mod subscription;
pub mod user;

pub use facility::*;
pub use payment::*;
pub use subscription::*;
pub use user::*;
