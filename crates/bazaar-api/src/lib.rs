pub mod auth;
pub mod error;
pub mod follows;
pub mod google;
pub mod graphql;
pub mod middleware;
pub mod policy;
pub mod profiles;
pub mod projects;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod subscriptions;
pub mod viewer;
