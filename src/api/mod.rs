//! HTTP surface for presentation clients

pub mod rest;

pub use rest::RestApi;
