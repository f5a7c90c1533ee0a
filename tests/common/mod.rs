#![allow(dead_code)]

pub mod file;
pub mod repository;
