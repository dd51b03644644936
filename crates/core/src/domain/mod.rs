pub mod appointment;
pub mod quote;
pub mod review;
pub mod user;
