pub mod checkout;
pub mod codes;
pub mod deletion;
pub mod dispatch;
pub mod fanout;
pub mod lifecycle;
pub mod orders;
pub mod tracking;
pub mod verification;
