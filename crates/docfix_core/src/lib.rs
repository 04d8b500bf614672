pub mod changelog;
pub mod commands;
pub mod config;
pub mod images;
pub mod pipeline;
pub mod redirect_test;
pub mod redirects;
pub mod rules;
pub mod sitemap;
pub mod walker;
