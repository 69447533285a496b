//! Amazon Lightsail

pub mod tags;

pub use tags::{key_value_tags, lightsail_tags, update_tags, Tag};
