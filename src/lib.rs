pub mod configuration;
pub mod domain;
pub mod mailchimp_client;
pub mod normalize;
pub mod persistence;
pub mod routes;
pub mod startup;
pub mod sync;
pub mod telemetry;
pub mod utils;
pub mod validation;
