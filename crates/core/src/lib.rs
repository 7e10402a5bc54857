pub mod config;
pub mod console;
pub mod crud;
pub mod data_access;
pub mod form;
pub mod grid;
pub mod pages;
pub mod report;
pub mod schema;
pub mod sql;
