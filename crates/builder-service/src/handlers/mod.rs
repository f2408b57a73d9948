pub mod auth;
pub mod health;
pub mod pages;
pub mod publish;
pub mod serve;
pub mod sites;
