/*
 * Responsibility
 * - HTTP surface: auth endpoints / protected API / pages
 * - routes() が route table (path + handler + RequiredAttributes)
 */
pub mod dto;
mod extractors;
pub mod handlers;
pub mod policy;
mod routes;

pub use routes::routes;
