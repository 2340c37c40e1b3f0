pub mod accounts;
pub mod payments;
pub mod plans;
pub mod root;
pub mod webhooks;
