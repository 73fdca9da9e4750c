//! Storage services: name rules, payload files and the operation facade.

pub mod object_store;
pub mod storage_service;
pub mod validation;
