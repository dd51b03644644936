pub mod connection;
pub mod migrations;
pub mod repositories;

use std::sync::Arc;

use salonbook_core::lifecycle::BookingPorts;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use repositories::{
    SqlAppointmentRepository, SqlQuoteRepository, SqlReviewRepository, SqlUserRepository,
};

/// Booking ports backed by one SQLite pool.
pub fn sql_ports(pool: &DbPool) -> BookingPorts {
    BookingPorts {
        quotes: Arc::new(SqlQuoteRepository::new(pool.clone())),
        appointments: Arc::new(SqlAppointmentRepository::new(pool.clone())),
        reviews: Arc::new(SqlReviewRepository::new(pool.clone())),
        users: Arc::new(SqlUserRepository::new(pool.clone())),
    }
}
