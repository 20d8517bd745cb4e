pub mod customer;
pub mod driver;
pub mod order;
pub mod quote;
pub mod tracking;
