pub mod admin;
pub mod transactions;
pub mod verification;
