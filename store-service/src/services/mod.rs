pub mod access;
pub mod catalog;
pub mod database;
pub mod discounts;
pub mod email;
pub mod error;
pub mod geocode;
pub mod inventory;
pub mod jwt;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod scheduler;
pub mod seed;
pub mod site;
pub mod stripe;
pub mod uploads;
pub mod users;

pub use access::AccessRepository;
pub use catalog::ProductRepository;
pub use database::MongoDb;
pub use discounts::DiscountEngine;
pub use email::{EmailProvider, EmailService, LogEmailService, MockEmailService};
pub use error::StoreError;
pub use geocode::Geocoder;
pub use inventory::Inventory;
pub use jwt::JwtService;
pub use orders::OrderRepository;
pub use payments::PaymentEvents;
pub use scheduler::Scheduler;
pub use site::SiteRepository;
pub use stripe::StripeClient;
pub use uploads::UploadStore;
pub use users::UserRepository;
